//! A forgiving JSON parser and linter.
//!
//! [`JsonParser`] accepts strict JSON, JSON5, JSON with comments, and
//! documents with outright syntax errors. Every deviation from strict JSON is
//! classified on a severity ladder ([`ParserState`]):
//!
//! ```text
//! STRICT < OK < NAN_INF < JSONC < JSON5 < BAD < FATAL
//! ```
//!
//! The parser's state is the worst severity seen so far. Deviations more severe
//! than the configured [`LoggerLevel`] are recorded as [`JsonLint`]s and, if
//! `throw_if_logged` is set, abort parsing with a [`JsonParseError`]. FATAL
//! deviations always stop parsing; what comes back is the partial tree.
//!
//! Positions are byte offsets into the UTF-8 source text.
//!
//! # Examples
//!
//! ```
//! use remespath::json_parser::{JsonParser, LoggerLevel, ParserOptions, ParserState};
//!
//! let options = ParserOptions::default()
//!     .with_logger_level(LoggerLevel::Strict)
//!     .with_throw_if_logged(false);
//! let mut parser = JsonParser::new(options);
//! let node = parser.parse("[1, 2,]").unwrap();
//! assert_eq!(node.len(), Some(2));
//! assert_eq!(parser.state(), ParserState::Json5);
//! assert_eq!(parser.lint()[0].message(), "Comma after last element of array");
//! ```

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::value::{Node, Value};

/// Deepest nesting of arrays and objects the parser will descend into.
pub const MAX_RECURSION_DEPTH: usize = 512;

/// How far a document has deviated from strict JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParserState {
    Strict,
    Ok,
    NanInf,
    Jsonc,
    Json5,
    Bad,
    Fatal,
}

impl fmt::Display for ParserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParserState::Strict => "STRICT",
            ParserState::Ok => "OK",
            ParserState::NanInf => "NAN_INF",
            ParserState::Jsonc => "JSONC",
            ParserState::Json5 => "JSON5",
            ParserState::Bad => "BAD",
            ParserState::Fatal => "FATAL",
        };
        write!(f, "{}", name)
    }
}

/// Deviations strictly more severe than this level are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggerLevel {
    Strict,
    Ok,
    #[default]
    NanInf,
    Jsonc,
    Json5,
}

impl LoggerLevel {
    pub fn as_state(self) -> ParserState {
        match self {
            LoggerLevel::Strict => ParserState::Strict,
            LoggerLevel::Ok => ParserState::Ok,
            LoggerLevel::NanInf => ParserState::NanInf,
            LoggerLevel::Jsonc => ParserState::Jsonc,
            LoggerLevel::Json5 => ParserState::Json5,
        }
    }
}

/// Every kind of deviation the parser knows how to recover from (or not).
#[derive(Debug, Clone, PartialEq)]
pub enum LintType {
    // OK
    ControlChar,
    // NAN_INF
    Infinity,
    NaN,
    // JSONC
    JavaScriptComment,
    // JSON5
    Json5WhitespaceChar,
    Json5SingleQuotedString,
    Json5EscapedNewline,
    Json5XEscape,
    Json5EscapedChar(char),
    Json5UnquotedKey,
    Json5NumLeadingPlus,
    Json5HexNum,
    Json5NumLeadingDecimalPoint,
    Json5NumTrailingDecimalPoint,
    Json5CommaAfterLastElementArray,
    Json5CommaAfterLastElementObject,
    // BAD
    UnterminatedMultilineComment,
    PythonComment,
    StringContainsNewline,
    UnterminatedString { start: usize },
    KeyContainsNewline,
    InvalidUnquotedKey { start: usize },
    PythonNan,
    PythonNone,
    PythonInf,
    UnnecessaryLeadingZero,
    SlashFraction,
    NumberInvalidFormat(String),
    TwoConsecutiveCommasArray(i64),
    CommaBeforeFirstElementArray,
    ArrayEndsWithCurlyBrace,
    NoCommaBetweenArrayItems,
    ColonBetweenArrayItems,
    UnterminatedArray,
    TwoConsecutiveCommasObject(i64),
    CommaBeforeFirstPairObject,
    ObjectEndsWithSquareBrace,
    NoCommaBetweenObjectPairs(i64),
    UnterminatedObject,
    ColonBetweenObjectPairs,
    CharWhereColonExpected { found: char, pair: usize },
    NoColonBetweenObjectKeyValue(usize),
    DuplicateKey(String),
    PythonTrue,
    PythonFalse,
    JavaScriptUndefined,
    CharInsteadOfEof(char),
    // FATAL
    ExpectedJavaScriptComment,
    HexadecimalTooShort(usize),
    NulChar,
    UnterminatedKey,
    InvalidStartsWith(char),
    PlusOrMinusAtEof(char),
    HexIntOverflow,
    SecondDecimalPoint,
    NumTrailingExponent,
    MaxRecursionDepth,
    UnexpectedEof,
    NoValidLiteralPossible,
    BadlyLocatedChar(char),
    NoInput,
    OnlyWhitespaceComments,
    JsonLinesNotOneDocPerLine,
}

impl LintType {
    pub fn severity(&self) -> ParserState {
        use LintType::*;
        match self {
            ControlChar => ParserState::Ok,
            Infinity | NaN => ParserState::NanInf,
            JavaScriptComment => ParserState::Jsonc,
            Json5WhitespaceChar
            | Json5SingleQuotedString
            | Json5EscapedNewline
            | Json5XEscape
            | Json5EscapedChar(_)
            | Json5UnquotedKey
            | Json5NumLeadingPlus
            | Json5HexNum
            | Json5NumLeadingDecimalPoint
            | Json5NumTrailingDecimalPoint
            | Json5CommaAfterLastElementArray
            | Json5CommaAfterLastElementObject => ParserState::Json5,
            ExpectedJavaScriptComment
            | HexadecimalTooShort(_)
            | NulChar
            | UnterminatedKey
            | InvalidStartsWith(_)
            | PlusOrMinusAtEof(_)
            | HexIntOverflow
            | SecondDecimalPoint
            | NumTrailingExponent
            | MaxRecursionDepth
            | UnexpectedEof
            | NoValidLiteralPossible
            | BadlyLocatedChar(_)
            | NoInput
            | OnlyWhitespaceComments
            | JsonLinesNotOneDocPerLine => ParserState::Fatal,
            _ => ParserState::Bad,
        }
    }
}

impl fmt::Display for LintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use LintType::*;
        match self {
            ControlChar => write!(f, "Control characters (ASCII code less than 0x20) are disallowed inside strings under the strict JSON specification"),
            Infinity => write!(f, "Infinity is not allowed in the original JSON specification"),
            NaN => write!(f, "NaN is not allowed in the original JSON specification"),
            JavaScriptComment => write!(f, "JavaScript comments are not allowed in the original JSON specification"),
            Json5WhitespaceChar => write!(f, "Whitespace characters other than ' ', '\\t', '\\r', and '\\n' are only allowed in JSON5"),
            Json5SingleQuotedString => write!(f, "Singlequoted strings are only allowed in JSON5"),
            Json5EscapedNewline => write!(f, "Escaped newline characters are only allowed in JSON5"),
            Json5XEscape => write!(f, "\\x escapes are only allowed in JSON5"),
            Json5EscapedChar(c) => write!(f, "Escaped char '{}' is only allowed in JSON5", c),
            Json5UnquotedKey => write!(f, "Unquoted keys are only allowed in JSON5"),
            Json5NumLeadingPlus => write!(f, "Leading + signs in numbers are only allowed in JSON5"),
            Json5HexNum => write!(f, "Hexadecimal numbers are only allowed in JSON5"),
            Json5NumLeadingDecimalPoint => write!(f, "Numbers with a leading decimal point are only allowed in JSON5"),
            Json5NumTrailingDecimalPoint => write!(f, "Numbers with a trailing decimal point are only allowed in JSON5"),
            Json5CommaAfterLastElementArray => write!(f, "Comma after last element of array"),
            Json5CommaAfterLastElementObject => write!(f, "Comma after last key-value pair of object"),
            UnterminatedMultilineComment => write!(f, "Unterminated multi-line comment"),
            PythonComment => write!(f, "Python-style '#' comments are not allowed in any well-accepted JSON specification"),
            StringContainsNewline => write!(f, "String literal contains newline"),
            UnterminatedString { start } => write!(f, "Unterminated string literal starting at position {}", start),
            KeyContainsNewline => write!(f, "Object key contains newline"),
            InvalidUnquotedKey { start } => write!(f, "No valid unquoted key beginning at {}", start),
            PythonNan => write!(f, "nan is not a valid representation of Not a Number in JSON"),
            PythonNone => write!(f, "None is not allowed in any JSON specification"),
            PythonInf => write!(f, "inf is not the correct representation of Infinity in JSON"),
            UnnecessaryLeadingZero => write!(f, "Numbers with an unnecessary leading 0 (like \"01\") are not allowed in any JSON specification"),
            SlashFraction => write!(f, "Fractions of the form 1/3 are not allowed in any JSON specification"),
            NumberInvalidFormat(s) => write!(f, "Number string {:?} had bad format", s),
            TwoConsecutiveCommasArray(n) => write!(f, "Two consecutive commas after element {} of array", n),
            CommaBeforeFirstElementArray => write!(f, "Comma before first value in array"),
            ArrayEndsWithCurlyBrace => write!(f, "Expected ']' at the end of an array, but found '}}'"),
            NoCommaBetweenArrayItems => write!(f, "No comma between array members"),
            ColonBetweenArrayItems => write!(f, "':' (key-value separator) where ',' between array members expected. Maybe you forgot to close the array?"),
            UnterminatedArray => write!(f, "Unterminated array"),
            TwoConsecutiveCommasObject(n) => write!(f, "Two consecutive commas after key-value pair {} of object", n),
            CommaBeforeFirstPairObject => write!(f, "Comma before first value in object"),
            ObjectEndsWithSquareBrace => write!(f, "Expected '}}' at the end of an object, but found ']'"),
            NoCommaBetweenObjectPairs(n) => write!(f, "No comma after key-value pair {} in object", n),
            UnterminatedObject => write!(f, "Unterminated object"),
            ColonBetweenObjectPairs => write!(f, "':' found instead of comma after key-value pair"),
            CharWhereColonExpected { found, pair } => write!(f, "Found '{}' after key {} when colon expected", found, pair),
            NoColonBetweenObjectKeyValue(n) => write!(f, "No ':' between key {} and value {} of object", n, n),
            DuplicateKey(k) => write!(f, "Object has multiple of key \"{}\"", k),
            PythonTrue => write!(f, "True is not allowed in any JSON specification"),
            PythonFalse => write!(f, "False is not allowed in any JSON specification"),
            JavaScriptUndefined => write!(f, "undefined is not allowed in any JSON specification"),
            CharInsteadOfEof(c) => write!(f, "At end of valid JSON document, got {} instead of EOF", char_display(*c)),
            ExpectedJavaScriptComment => write!(f, "Expected JavaScript comment after '/'"),
            HexadecimalTooShort(n) => write!(f, "Could not find valid hexadecimal of length {}", n),
            NulChar => write!(f, "'\\x00' is the null character, which is illegal here"),
            UnterminatedKey => write!(f, "Unterminated object key"),
            InvalidStartsWith(c) => {
                let expected = match c {
                    'n' => "null or nan",
                    'I' => "Infinity",
                    'N' => "NaN or None",
                    'i' => "inf",
                    't' => "true",
                    'f' => "false",
                    'T' => "True",
                    'F' => "False",
                    'u' => "undefined",
                    _ => "a valid literal",
                };
                write!(f, "Expected literal starting with '{}' to be {}", c, expected)
            }
            PlusOrMinusAtEof(c) => write!(f, "'{}' sign at end of document", c),
            HexIntOverflow => write!(f, "Hex number too large for a 64-bit signed integer type"),
            SecondDecimalPoint => write!(f, "Number with a decimal point in the wrong place"),
            NumTrailingExponent => write!(f, "Scientific notation 'e' with no number following"),
            MaxRecursionDepth => write!(f, "Maximum recursion depth ({}) reached", MAX_RECURSION_DEPTH),
            UnexpectedEof => write!(f, "Unexpected end of file"),
            NoValidLiteralPossible => write!(f, "No valid literal possible"),
            BadlyLocatedChar(c) => write!(f, "Badly located character {}", char_display(*c)),
            NoInput => write!(f, "No input"),
            OnlyWhitespaceComments => write!(f, "Input is only whitespace and maybe comments"),
            JsonLinesNotOneDocPerLine => write!(f, "JSON Lines document does not contain exactly one JSON document per line"),
        }
    }
}

fn char_display(c: char) -> String {
    match c {
        '\0' => "'\\x00'".to_string(),
        '\t' => "'\\t'".to_string(),
        '\r' => "'\\r'".to_string(),
        '\n' => "'\\n'".to_string(),
        '\'' => "'\\''".to_string(),
        c => format!("'{}'", c),
    }
}

/// One recorded deviation from strict JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonLint {
    pub lint_type: LintType,
    /// UTF-8 byte offset
    pub position: usize,
    /// Character at `position`, or `'\0'` past the end of input
    pub cur_char: char,
}

impl JsonLint {
    pub fn severity(&self) -> ParserState {
        self.lint_type.severity()
    }

    pub fn message(&self) -> String {
        self.lint_type.to_string()
    }

    /// `{"message": ..., "position": ..., "severity": ...}`
    pub fn to_node(&self) -> Node {
        Node::object_from([
            ("message", Node::from(self.message())),
            ("position", Node::from(self.position as i64)),
            ("severity", Node::from(self.severity().to_string())),
        ])
    }
}

impl fmt::Display for JsonLint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Syntax error (severity = {}) at position {} (char {}): {}",
            self.severity(),
            self.position,
            char_display(self.cur_char),
            self.lint_type
        )
    }
}

/// Raised when a logged deviation must abort parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonParseError {
    pub lint: JsonLint,
}

impl JsonParseError {
    pub fn position(&self) -> usize {
        self.lint.position
    }
}

impl fmt::Display for JsonParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at position {} (char {})",
            self.lint.lint_type,
            self.lint.position,
            char_display(self.lint.cur_char)
        )
    }
}

impl std::error::Error for JsonParseError {}

/// A comment seen while parsing, kept when `remember_comments` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    /// Text between the delimiters, without the trailing newline
    pub content: String,
    pub is_multiline: bool,
    /// Byte offset of the comment's first delimiter character
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParserOptions {
    pub logger_level: LoggerLevel,
    /// Raise on the first logged deviation.
    pub throw_if_logged: bool,
    /// Raise on a FATAL deviation even when `throw_if_logged` is off.
    pub throw_if_fatal: bool,
    /// Turn `YYYY-MM-DD` and `YYYY-MM-DD hh:mm:ss[.fff]` strings into dates.
    pub parse_dates: bool,
    pub remember_comments: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            logger_level: LoggerLevel::NanInf,
            throw_if_logged: true,
            throw_if_fatal: true,
            parse_dates: false,
            remember_comments: false,
        }
    }
}

impl ParserOptions {
    pub fn with_logger_level(mut self, level: LoggerLevel) -> Self {
        self.logger_level = level;
        self
    }

    pub fn with_throw_if_logged(mut self, throw: bool) -> Self {
        self.throw_if_logged = throw;
        self
    }

    pub fn with_throw_if_fatal(mut self, throw: bool) -> Self {
        self.throw_if_fatal = throw;
        self
    }

    pub fn with_parse_dates(mut self, parse: bool) -> Self {
        self.parse_dates = parse;
        self
    }

    pub fn with_remember_comments(mut self, remember: bool) -> Self {
        self.remember_comments = remember;
        self
    }

    /// Accept everything short of FATAL, recording lints without raising.
    pub fn lenient() -> Self {
        ParserOptions::default()
            .with_logger_level(LoggerLevel::Strict)
            .with_throw_if_logged(false)
            .with_throw_if_fatal(false)
    }
}

type ParseResult<T> = Result<T, JsonParseError>;

/// The parser holds a scan cursor, so one instance parses one document at a
/// time. Cloning copies only the options, giving a fresh parser for another
/// thread.
#[derive(Debug)]
pub struct JsonParser {
    options: ParserOptions,
    lint: Vec<JsonLint>,
    comments: Vec<Comment>,
    state: ParserState,
    ii: usize,
}

impl Clone for JsonParser {
    fn clone(&self) -> Self {
        JsonParser::new(self.options.clone())
    }
}

impl Default for JsonParser {
    fn default() -> Self {
        JsonParser::new(ParserOptions::default())
    }
}

fn char_at(inp: &str, pos: usize) -> char {
    if pos >= inp.len() {
        return '\0';
    }
    let mut start = pos;
    while !inp.is_char_boundary(start) {
        start -= 1;
    }
    inp[start..].chars().next().unwrap_or('\0')
}

fn is_json5_whitespace(c: char) -> bool {
    matches!(
        c,
        '\u{2028}'
            | '\u{2029}'
            | '\u{feff}'
            | '\u{a0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200a}'
            | '\u{202f}'
            | '\u{205f}'
            | '\u{3000}'
    )
}

fn is_key_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

fn is_key_continue(c: char) -> bool {
    is_key_start(c) || c.is_alphanumeric() || c == '\u{200c}' || c == '\u{200d}'
}

impl JsonParser {
    pub fn new(options: ParserOptions) -> Self {
        JsonParser {
            options,
            lint: Vec::new(),
            comments: Vec::new(),
            state: ParserState::Strict,
            ii: 0,
        }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn fatal(&self) -> bool {
        self.state == ParserState::Fatal
    }

    /// Deviations recorded by the last parse.
    pub fn lint(&self) -> &[JsonLint] {
        &self.lint
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// Whether the last parse stopped before the end of its input.
    pub fn exited_early(&self) -> bool {
        self.fatal() || (self.options.throw_if_logged && self.state > self.options.logger_level.as_state())
    }

    /// The lint that stopped the last parse, if it stopped early.
    pub fn fatal_error(&self) -> Option<&JsonLint> {
        if self.exited_early() { self.lint.last() } else { None }
    }

    pub fn reset(&mut self) {
        self.lint.clear();
        self.comments.clear();
        self.state = ParserState::Strict;
        self.ii = 0;
    }

    /// Records the deviation and raises if the options demand it.
    /// Returns whether the parser is now in the FATAL state.
    fn handle_error(&mut self, lint_type: LintType, inp: &str, pos: usize) -> ParseResult<bool> {
        let severity = lint_type.severity();
        if self.state < severity {
            self.state = severity;
        }
        let fatal = self.fatal();
        if severity > self.options.logger_level.as_state() {
            let lint = JsonLint {
                lint_type,
                position: pos,
                cur_char: char_at(inp, pos),
            };
            trace!(position = pos, severity = %severity, "{}", lint.lint_type);
            self.lint.push(lint.clone());
            if self.options.throw_if_logged || (fatal && self.options.throw_if_fatal) {
                debug!(position = pos, "aborting parse: {}", lint.lint_type);
                return Err(JsonParseError { lint });
            }
        }
        Ok(fatal)
    }

    // ========================================
    // Whitespace and comments
    // ========================================

    /// End of the line starting at `from`, and the index just past its newline.
    fn line_end(inp: &str, from: usize) -> (usize, usize) {
        let bytes = inp.as_bytes();
        match bytes[from..].iter().position(|&b| b == b'\n') {
            Some(off) => {
                let nl = from + off;
                let end = if nl > from && bytes[nl - 1] == b'\r' { nl - 1 } else { nl };
                (end, nl + 1)
            }
            None => (inp.len(), inp.len()),
        }
    }

    fn remember_comment(&mut self, inp: &str, start: usize, end: usize, is_multiline: bool, position: usize) {
        if self.options.remember_comments {
            self.comments.push(Comment {
                content: inp[start..end.max(start)].to_string(),
                is_multiline,
                position,
            });
        }
    }

    /// Skips whitespace and comments. Returns `false` if parsing should stop.
    fn consume_insignificant_chars(&mut self, inp: &str) -> ParseResult<bool> {
        let bytes = inp.as_bytes();
        while self.ii < bytes.len() {
            match bytes[self.ii] {
                b' ' | b'\t' | b'\r' | b'\n' => self.ii += 1,
                b'/' => {
                    let comment_start = self.ii;
                    self.ii += 1;
                    if self.ii == bytes.len() {
                        self.handle_error(LintType::ExpectedJavaScriptComment, inp, bytes.len() - 1)?;
                        return Ok(false);
                    }
                    self.handle_error(LintType::JavaScriptComment, inp, self.ii)?;
                    match bytes[self.ii] {
                        b'/' => {
                            let content_start = self.ii + 1;
                            let (end, next) = Self::line_end(inp, content_start);
                            self.ii = next;
                            self.remember_comment(inp, content_start, end, false, comment_start);
                        }
                        b'*' => {
                            let content_start = self.ii + 1;
                            match inp[content_start..].find("*/") {
                                Some(off) => {
                                    self.ii = content_start + off + 2;
                                    self.remember_comment(inp, content_start, content_start + off, true, comment_start);
                                }
                                None => {
                                    self.ii = bytes.len();
                                    self.handle_error(LintType::UnterminatedMultilineComment, inp, bytes.len() - 1)?;
                                    self.remember_comment(inp, content_start, bytes.len(), true, comment_start);
                                    return Ok(false);
                                }
                            }
                        }
                        _ => {
                            self.handle_error(LintType::ExpectedJavaScriptComment, inp, self.ii)?;
                            return Ok(false);
                        }
                    }
                }
                b'#' => {
                    let comment_start = self.ii;
                    self.handle_error(LintType::PythonComment, inp, self.ii)?;
                    let (end, next) = Self::line_end(inp, comment_start + 1);
                    self.ii = next;
                    self.remember_comment(inp, comment_start + 1, end, false, comment_start);
                }
                b if b >= 0x80 => {
                    let c = char_at(inp, self.ii);
                    if !is_json5_whitespace(c) {
                        return Ok(true);
                    }
                    self.handle_error(LintType::Json5WhitespaceChar, inp, self.ii)?;
                    self.ii += c.len_utf8();
                }
                _ => return Ok(true),
            }
        }
        Ok(true)
    }

    // ========================================
    // Strings and keys
    // ========================================

    /// Reads `length` hex digits at the cursor, leaving the cursor on the last one.
    fn parse_hex(&mut self, inp: &str, length: usize) -> ParseResult<Option<u32>> {
        let bytes = inp.as_bytes();
        let start = self.ii;
        if start + length >= bytes.len() || !bytes[start..start + length].iter().all(u8::is_ascii_hexdigit) {
            self.handle_error(LintType::HexadecimalTooShort(length), inp, start)?;
            return Ok(None);
        }
        self.ii = start + length - 1;
        Ok(u32::from_str_radix(&inp[start..start + length], 16).ok())
    }

    /// Flags control characters. Returns `true` if the string must end here.
    fn handle_char_errors(&mut self, c: u32, inp: &str, pos: usize) -> ParseResult<bool> {
        match c {
            0 => self.handle_error(LintType::NulChar, inp, pos),
            0x0a => self.handle_error(LintType::StringContainsNewline, inp, pos),
            1..=0x1f => self.handle_error(LintType::ControlChar, inp, pos),
            _ => Ok(false),
        }
    }

    /// Handles the escape sequence whose backslash is at the cursor.
    /// Returns `Ok(None)` if the string must end, otherwise the decoded char if any.
    fn parse_escape(&mut self, inp: &str, quote: u8) -> ParseResult<Option<Option<char>>> {
        let bytes = inp.as_bytes();
        let next = bytes[self.ii + 1];
        let simple = match next {
            b'\\' => Some('\\'),
            b'n' => Some('\n'),
            b'r' => Some('\r'),
            b'b' => Some('\u{08}'),
            b't' => Some('\t'),
            b'f' => Some('\u{0c}'),
            b'/' => Some('/'),
            b'v' => Some('\u{0b}'),
            b'\'' => Some('\''),
            b'"' => Some('"'),
            _ if next == quote => Some(quote as char),
            _ => None,
        };
        if let Some(c) = simple {
            self.ii += 1;
            return Ok(Some(Some(c)));
        }
        match next {
            b'u' => {
                self.ii += 2;
                let Some(mut code) = self.parse_hex(inp, 4)? else {
                    return Ok(None);
                };
                if self.handle_char_errors(code, inp, self.ii)? {
                    return Ok(None);
                }
                if (0xd800..0xdc00).contains(&code)
                    && bytes.get(self.ii + 1) == Some(&b'\\')
                    && bytes.get(self.ii + 2) == Some(&b'u')
                    && let Ok(low) = u32::from_str_radix(inp.get(self.ii + 3..self.ii + 7).unwrap_or(""), 16)
                    && (0xdc00..0xe000).contains(&low)
                {
                    code = 0x10000 + ((code - 0xd800) << 10) + (low - 0xdc00);
                    self.ii += 6;
                }
                Ok(Some(Some(char::from_u32(code).unwrap_or('\u{fffd}'))))
            }
            b'\n' | b'\r' => {
                self.handle_error(LintType::Json5EscapedNewline, inp, self.ii + 1)?;
                self.ii += 1;
                if next == b'\r' && bytes.get(self.ii + 1) == Some(&b'\n') {
                    self.ii += 1;
                }
                Ok(Some(None))
            }
            b'x' => {
                self.ii += 2;
                let Some(code) = self.parse_hex(inp, 2)? else {
                    return Ok(None);
                };
                if self.handle_char_errors(code, inp, self.ii)? {
                    return Ok(None);
                }
                self.handle_error(LintType::Json5XEscape, inp, self.ii)?;
                Ok(Some(char::from_u32(code)))
            }
            _ => {
                // the escaped char itself is read as a normal char next time round
                let c = char_at(inp, self.ii + 1);
                self.handle_error(LintType::Json5EscapedChar(c), inp, self.ii + 1)?;
                Ok(Some(None))
            }
        }
    }

    fn parse_string(&mut self, inp: &str) -> ParseResult<Node> {
        let bytes = inp.as_bytes();
        let start = self.ii;
        let quote = bytes[self.ii];
        self.ii += 1;
        if quote == b'\'' {
            self.handle_error(LintType::Json5SingleQuotedString, inp, self.ii)?;
        }
        let mut sb = String::new();
        loop {
            if self.ii >= bytes.len() {
                self.handle_error(LintType::UnterminatedString { start }, inp, bytes.len() - 1)?;
                break;
            }
            let c = bytes[self.ii];
            if c == quote {
                break;
            } else if c == b'\\' {
                if self.ii + 2 >= bytes.len() {
                    self.handle_error(LintType::UnterminatedString { start }, inp, bytes.len() - 1)?;
                    self.ii += 1;
                    continue;
                }
                match self.parse_escape(inp, quote)? {
                    None => break,
                    Some(Some(ch)) => sb.push(ch),
                    Some(None) => {}
                }
            } else {
                let ch = char_at(inp, self.ii);
                if self.handle_char_errors(ch as u32, inp, self.ii)? {
                    break;
                }
                sb.push(ch);
                self.ii += ch.len_utf8() - 1;
            }
            self.ii += 1;
        }
        self.ii += 1;
        let value = if self.options.parse_dates {
            try_parse_date(&sb).unwrap_or(Value::Str(sb))
        } else {
            Value::Str(sb)
        };
        Ok(Node::new(value, start))
    }

    fn parse_key(&mut self, inp: &str) -> ParseResult<Option<String>> {
        let bytes = inp.as_bytes();
        let quote = bytes[self.ii];
        if quote != b'"' && quote != b'\'' {
            return self.parse_unquoted_key(inp);
        }
        if quote == b'\'' {
            self.handle_error(LintType::Json5SingleQuotedString, inp, self.ii)?;
        }
        self.ii += 1;
        let mut sb = String::new();
        loop {
            if self.ii >= bytes.len() {
                self.handle_error(LintType::UnterminatedKey, inp, bytes.len() - 1)?;
                return Ok(None);
            }
            let c = bytes[self.ii];
            if c == quote {
                break;
            } else if c == b'\\' {
                if self.ii + 2 >= bytes.len() {
                    self.handle_error(LintType::UnterminatedKey, inp, bytes.len() - 1)?;
                    return Ok(None);
                }
                match self.parse_escape(inp, quote)? {
                    None => break,
                    Some(Some(ch)) => sb.push(ch),
                    Some(None) => {}
                }
            } else if c < 0x20 {
                let lint = if c == b'\n' { LintType::KeyContainsNewline } else { LintType::ControlChar };
                self.handle_error(lint, inp, self.ii)?;
                sb.push(c as char);
            } else {
                let ch = char_at(inp, self.ii);
                sb.push(ch);
                self.ii += ch.len_utf8() - 1;
            }
            self.ii += 1;
        }
        self.ii += 1;
        Ok(Some(sb))
    }

    fn parse_unquoted_key(&mut self, inp: &str) -> ParseResult<Option<String>> {
        let bytes = inp.as_bytes();
        let start = self.ii;
        let mut key = String::new();
        while self.ii < bytes.len() {
            if bytes[self.ii] == b'\\'
                && bytes.get(self.ii + 1) == Some(&b'u')
                && let Some(code) = inp.get(self.ii + 2..self.ii + 6).and_then(|h| u32::from_str_radix(h, 16).ok())
            {
                if self.handle_char_errors(code, inp, self.ii)? {
                    return Ok(None);
                }
                key.push(char::from_u32(code).unwrap_or('\u{fffd}'));
                self.ii += 6;
                continue;
            }
            let c = char_at(inp, self.ii);
            let ok = if key.is_empty() { is_key_start(c) } else { is_key_continue(c) };
            if !ok {
                break;
            }
            key.push(c);
            self.ii += c.len_utf8();
        }
        if key.is_empty() {
            self.handle_error(LintType::InvalidUnquotedKey { start }, inp, start)?;
            return Ok(None);
        }
        self.handle_error(LintType::Json5UnquotedKey, inp, start)?;
        Ok(Some(key))
    }

    // ========================================
    // Numbers and literals
    // ========================================

    fn parse_number(&mut self, inp: &str) -> ParseResult<Node> {
        let bytes = inp.as_bytes();
        let start = self.ii;
        let null = Node::new(Value::Null, start);
        let float = |f: f64| Node::new(Value::Float(f), start);
        let mut negative = false;
        let mut c = bytes[self.ii];
        if !c.is_ascii_digit() {
            let rest = &inp[self.ii..];
            if c == b'n' {
                if rest.starts_with("null") {
                    self.ii += 4;
                    return Ok(null);
                }
                if rest.starts_with("nan") {
                    self.handle_error(LintType::PythonNan, inp, self.ii)?;
                    self.ii += 3;
                    return Ok(float(f64::NAN));
                }
                self.handle_error(LintType::InvalidStartsWith('n'), inp, self.ii + 1)?;
                return Ok(null);
            }
            if c == b'-' || c == b'+' {
                if c == b'+' {
                    self.handle_error(LintType::Json5NumLeadingPlus, inp, self.ii)?;
                } else {
                    negative = true;
                }
                self.ii += 1;
                if self.ii >= bytes.len() {
                    self.handle_error(LintType::PlusOrMinusAtEof(c as char), inp, bytes.len() - 1)?;
                    return Ok(null);
                }
            }
            c = bytes[self.ii];
            let rest = &inp[self.ii..];
            let sign = if negative { -1.0 } else { 1.0 };
            match c {
                b'I' => {
                    if rest.starts_with("Infinity") {
                        self.handle_error(LintType::Infinity, inp, self.ii)?;
                        self.ii += 8;
                        return Ok(float(sign * f64::INFINITY));
                    }
                    self.handle_error(LintType::InvalidStartsWith('I'), inp, self.ii + 1)?;
                    return Ok(null);
                }
                b'N' => {
                    if rest.starts_with("NaN") {
                        self.handle_error(LintType::NaN, inp, self.ii)?;
                        self.ii += 3;
                        return Ok(float(f64::NAN));
                    }
                    if rest.starts_with("None") {
                        self.ii += 4;
                        self.handle_error(LintType::PythonNone, inp, self.ii)?;
                        return Ok(null);
                    }
                    self.handle_error(LintType::InvalidStartsWith('N'), inp, self.ii + 1)?;
                    return Ok(null);
                }
                b'i' => {
                    if rest.starts_with("inf") {
                        self.handle_error(LintType::PythonInf, inp, self.ii)?;
                        self.ii += 3;
                        return Ok(float(sign * f64::INFINITY));
                    }
                    self.handle_error(LintType::InvalidStartsWith('i'), inp, self.ii)?;
                    return Ok(null);
                }
                _ => {}
            }
        }
        let digits_start = self.ii;
        if c == b'0' && self.ii + 1 < bytes.len() {
            let next = bytes[self.ii + 1];
            if next == b'x' || next == b'X' {
                self.handle_error(LintType::Json5HexNum, inp, self.ii)?;
                self.ii += 2;
                let hex_start = self.ii;
                while self.ii < bytes.len() && bytes[self.ii].is_ascii_hexdigit() {
                    self.ii += 1;
                }
                return match i64::from_str_radix(&inp[hex_start..self.ii], 16) {
                    Ok(n) => Ok(Node::new(Value::Int(if negative { -n } else { n }), start)),
                    Err(_) => {
                        self.handle_error(LintType::HexIntOverflow, inp, hex_start)?;
                        Ok(null)
                    }
                };
            } else if next.is_ascii_digit() {
                self.handle_error(LintType::UnnecessaryLeadingZero, inp, self.ii)?;
            }
        }

        // 1 = integer part, 3 = plus fraction, +4 = exponent
        let mut parsed = 1u8;
        while self.ii < bytes.len() {
            c = bytes[self.ii];
            if c.is_ascii_digit() {
                self.ii += 1;
            } else if c == b'.' {
                if parsed != 1 {
                    self.handle_error(LintType::SecondDecimalPoint, inp, self.ii)?;
                    break;
                }
                if self.ii == digits_start {
                    self.handle_error(LintType::Json5NumLeadingDecimalPoint, inp, start)?;
                }
                parsed = 3;
                self.ii += 1;
            } else if c == b'e' || c == b'E' {
                if parsed & 4 != 0 {
                    break;
                }
                if self.ii >= 1 && bytes[self.ii - 1] == b'.' {
                    self.handle_error(LintType::Json5NumTrailingDecimalPoint, inp, start)?;
                }
                parsed += 4;
                self.ii += 1;
                if self.ii < bytes.len() {
                    if bytes[self.ii] == b'+' || bytes[self.ii] == b'-' {
                        self.ii += 1;
                    }
                } else {
                    self.handle_error(LintType::NumTrailingExponent, inp, bytes.len() - 1)?;
                    return Ok(null);
                }
            } else if c == b'/' && self.ii + 1 < bytes.len() {
                let next = bytes[self.ii + 1];
                if !(next.is_ascii_digit() || next == b'-' || next == b'.' || next == b'+') {
                    break;
                }
                self.handle_error(LintType::SlashFraction, inp, start)?;
                let numer: f64 = inp[start..self.ii].parse().unwrap_or(f64::NAN);
                self.ii += 1;
                let denom = self.parse_number(inp)?;
                if self.fatal() {
                    return Ok(float(numer));
                }
                return Ok(float(numer / denom.value.as_f64().unwrap_or(f64::NAN)));
            } else {
                break;
            }
        }

        let numstr = &inp[start..self.ii];
        if parsed == 1 {
            match numstr.parse::<i64>() {
                Ok(n) => return Ok(Node::new(Value::Int(n), start)),
                Err(e) if matches!(e.kind(), std::num::IntErrorKind::PosOverflow | std::num::IntErrorKind::NegOverflow) => {}
                Err(_) => {
                    self.handle_error(LintType::NumberInvalidFormat(numstr.to_string()), inp, start)?;
                    return Ok(float(f64::NAN));
                }
            }
        }
        let num = match numstr.parse::<f64>() {
            Ok(n) => n,
            Err(_) => {
                self.handle_error(LintType::NumberInvalidFormat(numstr.to_string()), inp, start)?;
                f64::NAN
            }
        };
        if numstr.ends_with('.') {
            self.handle_error(LintType::Json5NumTrailingDecimalPoint, inp, start)?;
        }
        Ok(float(num))
    }

    fn parse_literal(&mut self, inp: &str) -> ParseResult<Node> {
        let bytes = inp.as_bytes();
        let start = self.ii;
        let null = Node::new(Value::Null, start);
        if self.ii + 4 > bytes.len() {
            self.handle_error(LintType::NoValidLiteralPossible, inp, self.ii)?;
            return Ok(null);
        }
        let rest = &inp[self.ii..];
        let c = bytes[self.ii];
        let (word, value, lint) = match c {
            b't' => ("true", Value::Bool(true), None),
            b'f' => ("false", Value::Bool(false), None),
            b'T' => ("True", Value::Bool(true), Some(LintType::PythonTrue)),
            b'F' => ("False", Value::Bool(false), Some(LintType::PythonFalse)),
            b'u' => ("undefined", Value::Null, Some(LintType::JavaScriptUndefined)),
            _ => {
                let ch = char_at(inp, self.ii);
                self.handle_error(LintType::BadlyLocatedChar(ch), inp, self.ii)?;
                return Ok(null);
            }
        };
        if !rest.starts_with(word) {
            self.handle_error(LintType::InvalidStartsWith(c as char), inp, self.ii + 1)?;
            return Ok(null);
        }
        self.ii += word.len();
        if let Some(lint) = lint {
            self.handle_error(lint, inp, start)?;
        }
        Ok(Node::new(value, start))
    }

    // ========================================
    // Containers
    // ========================================

    fn parse_array(&mut self, inp: &str, depth: usize) -> ParseResult<Node> {
        let bytes = inp.as_bytes();
        let start = self.ii;
        let mut children = Vec::new();
        let mut seen_comma = false;
        self.ii += 1;
        if depth > MAX_RECURSION_DEPTH {
            self.handle_error(LintType::MaxRecursionDepth, inp, self.ii)?;
            return Ok(Node::new(Value::Array(children), start));
        }
        while self.ii < bytes.len() {
            if !self.consume_insignificant_chars(inp)? || self.ii >= bytes.len() {
                break;
            }
            match bytes[self.ii] {
                b',' => {
                    if seen_comma {
                        self.handle_error(LintType::TwoConsecutiveCommasArray(children.len() as i64 - 1), inp, self.ii)?;
                    }
                    seen_comma = true;
                    if children.is_empty() {
                        self.handle_error(LintType::CommaBeforeFirstElementArray, inp, self.ii)?;
                    }
                    self.ii += 1;
                }
                close @ (b']' | b'}') => {
                    if close == b'}' {
                        self.handle_error(LintType::ArrayEndsWithCurlyBrace, inp, self.ii)?;
                    }
                    if seen_comma {
                        self.handle_error(LintType::Json5CommaAfterLastElementArray, inp, self.ii)?;
                    }
                    self.ii += 1;
                    return Ok(Node::new(Value::Array(children), start));
                }
                _ => {
                    if !children.is_empty() && !seen_comma {
                        self.handle_error(LintType::NoCommaBetweenArrayItems, inp, self.ii)?;
                    }
                    seen_comma = false;
                    let before = self.ii;
                    let child = self.parse_something(inp, depth)?;
                    if matches!(child.value, Value::Str(_)) && bytes.get(self.ii) == Some(&b':') {
                        // probably a key in a parent object whose array was never closed
                        self.handle_error(LintType::ColonBetweenArrayItems, inp, self.ii)?;
                        self.ii = before;
                        return Ok(Node::new(Value::Array(children), start));
                    }
                    children.push(child);
                    if self.fatal() {
                        return Ok(Node::new(Value::Array(children), start));
                    }
                }
            }
        }
        if self.ii >= bytes.len() && !self.fatal() {
            self.ii = bytes.len();
            self.handle_error(LintType::UnterminatedArray, inp, bytes.len() - 1)?;
        }
        Ok(Node::new(Value::Array(children), start))
    }

    fn parse_object(&mut self, inp: &str, depth: usize) -> ParseResult<Node> {
        let bytes = inp.as_bytes();
        let start = self.ii;
        let mut children: IndexMap<String, Node> = IndexMap::new();
        let mut seen_comma = false;
        self.ii += 1;
        if depth > MAX_RECURSION_DEPTH {
            self.handle_error(LintType::MaxRecursionDepth, inp, self.ii)?;
            return Ok(Node::new(Value::Object(children), start));
        }
        while self.ii < bytes.len() {
            if !self.consume_insignificant_chars(inp)? || self.ii >= bytes.len() {
                break;
            }
            match bytes[self.ii] {
                b',' => {
                    if seen_comma {
                        self.handle_error(LintType::TwoConsecutiveCommasObject(children.len() as i64 - 1), inp, self.ii)?;
                    }
                    seen_comma = true;
                    if children.is_empty() {
                        self.handle_error(LintType::CommaBeforeFirstPairObject, inp, self.ii)?;
                    }
                    self.ii += 1;
                }
                close @ (b'}' | b']') => {
                    if close == b']' {
                        self.handle_error(LintType::ObjectEndsWithSquareBrace, inp, self.ii)?;
                    }
                    if seen_comma {
                        self.handle_error(LintType::Json5CommaAfterLastElementObject, inp, self.ii)?;
                    }
                    self.ii += 1;
                    return Ok(Node::new(Value::Object(children), start));
                }
                cur => {
                    let pair_count = children.len();
                    if pair_count > 0 && !seen_comma {
                        self.handle_error(LintType::NoCommaBetweenObjectPairs(pair_count as i64 - 1), inp, self.ii)?;
                        if cur == b':' && self.ii + 1 < bytes.len() {
                            self.handle_error(LintType::ColonBetweenObjectPairs, inp, self.ii)?;
                            self.ii += 1;
                            if !self.consume_insignificant_chars(inp)? || self.ii >= bytes.len() {
                                break;
                            }
                        }
                    }
                    let before_key = self.ii;
                    let key = match self.parse_key(inp)? {
                        Some(key) if !self.fatal() => key,
                        _ => return Ok(Node::new(Value::Object(children), start)),
                    };
                    if self.ii >= bytes.len() {
                        break;
                    }
                    if bytes[self.ii] == b':' {
                        self.ii += 1;
                    } else {
                        if !self.consume_insignificant_chars(inp)? || self.ii >= bytes.len() {
                            break;
                        }
                        match bytes[self.ii] {
                            b':' => self.ii += 1,
                            found @ (b',' | b']') => {
                                // maybe this "key" was really a value in a parent array
                                let lint = LintType::CharWhereColonExpected { found: found as char, pair: pair_count };
                                self.handle_error(lint, inp, self.ii)?;
                                self.ii = before_key;
                                return Ok(Node::new(Value::Object(children), start));
                            }
                            _ => {
                                self.handle_error(LintType::NoColonBetweenObjectKeyValue(pair_count), inp, self.ii)?;
                            }
                        }
                    }
                    if !self.consume_insignificant_chars(inp)? || self.ii >= bytes.len() {
                        break;
                    }
                    let value = self.parse_something(inp, depth)?;
                    let duplicate = children.insert(key.clone(), value).is_some();
                    if self.fatal() {
                        return Ok(Node::new(Value::Object(children), start));
                    }
                    if duplicate {
                        self.handle_error(LintType::DuplicateKey(key), inp, self.ii)?;
                    }
                    seen_comma = false;
                }
            }
        }
        if self.ii >= bytes.len() && !self.fatal() {
            self.ii = bytes.len();
            self.handle_error(LintType::UnterminatedObject, inp, bytes.len() - 1)?;
        }
        Ok(Node::new(Value::Object(children), start))
    }

    fn parse_something(&mut self, inp: &str, depth: usize) -> ParseResult<Node> {
        let bytes = inp.as_bytes();
        if self.ii >= bytes.len() {
            self.handle_error(LintType::UnexpectedEof, inp, bytes.len().saturating_sub(1))?;
            return Ok(Node::new(Value::Null, self.ii));
        }
        match bytes[self.ii] {
            b'"' | b'\'' => self.parse_string(inp),
            b'0'..=b'9' | b'-' | b'+' | b'n' | b'I' | b'N' | b'.' | b'i' => self.parse_number(inp),
            b'[' => self.parse_array(inp, depth + 1),
            b'{' => self.parse_object(inp, depth + 1),
            _ => self.parse_literal(inp),
        }
    }

    /// Parse a single JSON document.
    ///
    /// Lints and comments from any previous parse are discarded first.
    pub fn parse(&mut self, inp: &str) -> ParseResult<Node> {
        self.reset();
        if inp.is_empty() {
            self.handle_error(LintType::NoInput, inp, 0)?;
            return Ok(Node::null());
        }
        if !self.consume_insignificant_chars(inp)? {
            return Ok(Node::null());
        }
        if self.ii >= inp.len() {
            self.handle_error(LintType::OnlyWhitespaceComments, inp, inp.len() - 1)?;
            return Ok(Node::null());
        }
        let json = self.parse_something(inp, 0)?;
        if self.fatal() || !self.consume_insignificant_chars(inp)? {
            return Ok(json);
        }
        if self.ii < inp.len() {
            let c = char_at(inp, self.ii);
            self.handle_error(LintType::CharInsteadOfEof(c), inp, self.ii)?;
        }
        debug!(state = %self.state, lints = self.lint.len(), "parsed JSON document");
        Ok(json)
    }

    /// Parse a JSON Lines document into an array with one element per line.
    pub fn parse_json_lines(&mut self, inp: &str) -> ParseResult<Node> {
        self.reset();
        if inp.is_empty() {
            self.handle_error(LintType::NoInput, inp, 0)?;
            return Ok(Node::null());
        }
        if !self.consume_insignificant_chars(inp)? {
            return Ok(Node::null());
        }
        if self.ii >= inp.len() {
            self.handle_error(LintType::OnlyWhitespaceComments, inp, inp.len() - 1)?;
            return Ok(Node::null());
        }
        let bytes = inp.as_bytes();
        let mut children = Vec::new();
        let mut last_ii = 0;
        let mut line_num = 0;
        while self.ii < bytes.len() {
            let json = self.parse_something(inp, 0)?;
            self.consume_insignificant_chars(inp)?;
            children.push(json);
            if self.fatal() {
                break;
            }
            let upto = self.ii.min(bytes.len());
            line_num += bytes[last_ii..upto].iter().filter(|&&b| b == b'\n').count();
            last_ii = upto;
            let at_end = self.ii >= bytes.len();
            if !(line_num == children.len() || (at_end && line_num + 1 == children.len())) {
                let pos = self.ii.min(bytes.len() - 1);
                self.handle_error(LintType::JsonLinesNotOneDocPerLine, inp, pos)?;
                break;
            }
        }
        Ok(Node::new(Value::Array(children), 0))
    }
}

fn try_parse_date(s: &str) -> Option<Value> {
    let b = s.as_bytes();
    if b.len() < 10 || b[4] != b'-' || b[7] != b'-' {
        return None;
    }
    if b.len() == 10 {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Value::Date);
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(Value::DateTime)
}

/// Parse a document with the default options.
pub fn parse_json(inp: &str) -> ParseResult<Node> {
    JsonParser::default().parse(inp)
}

pub fn parse_json_with(inp: &str, options: &ParserOptions) -> ParseResult<Node> {
    JsonParser::new(options.clone()).parse(inp)
}

pub fn parse_json_lines(inp: &str) -> ParseResult<Node> {
    JsonParser::default().parse_json_lines(inp)
}

/// Read the whole of `s` as a number if it is one (JSON syntax plus hex,
/// `Infinity` and `NaN`), otherwise hand back the string.
pub fn try_parse_number(s: &str) -> Value {
    let (negative, body) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    match body {
        "Infinity" => return Value::Float(if negative { f64::NEG_INFINITY } else { f64::INFINITY }),
        "NaN" => return Value::Float(f64::NAN),
        _ => {}
    }
    if let Some(hex) = body.strip_prefix("0x")
        && !hex.is_empty()
        && let Ok(n) = i64::from_str_radix(hex, 16)
    {
        return Value::Int(if negative { -n } else { n });
    }
    let well_formed = !body.is_empty()
        && body.bytes().any(|b| b.is_ascii_digit())
        && body.bytes().all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !well_formed {
        return Value::Str(s.to_string());
    }
    if let Ok(n) = s.parse::<i64>() {
        return Value::Int(n);
    }
    match s.parse::<f64>() {
        Ok(f) => Value::Float(f),
        Err(_) => Value::Str(s.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_parse_number() {
        assert_eq!(try_parse_number("12"), Value::Int(12));
        assert_eq!(try_parse_number("-1.5e3"), Value::Float(-1500.0));
        assert_eq!(try_parse_number("0x1f"), Value::Int(31));
        assert_eq!(try_parse_number("-Infinity"), Value::Float(f64::NEG_INFINITY));
        assert_eq!(try_parse_number("1.2.3"), Value::Str("1.2.3".into()));
        assert_eq!(try_parse_number("abc"), Value::Str("abc".into()));
    }

    #[test]
    fn test_clone_has_fresh_state() {
        let mut parser = JsonParser::new(ParserOptions::lenient());
        parser.parse("[1,,2]").unwrap();
        assert_eq!(parser.state(), ParserState::Bad);
        let copy = parser.clone();
        assert_eq!(copy.state(), ParserState::Strict);
        assert!(copy.lint().is_empty());
        assert_eq!(copy.options(), parser.options());
    }
}
