//! Tokenizer for RemesPath queries.
//!
//! Literal values are fully built here: numbers, backtick strings, `g`
//! regexes and `j` JSON literals all come out as [`Token::Literal`].
//! After tokenizing, brackets are checked for balance so that the parser
//! only ever sees well-nested input.

use std::fmt;

use regex::Regex;

use crate::{
    ast::{BinOp, Token},
    json_parser::{JsonParser, LoggerLevel, ParserOptions},
    value::{Node, Value},
};

/// Deepest bracket nesting accepted in a query.
pub const MAX_QUERY_DEPTH: usize = 512;

/// Syntax error in query text, rendered with a caret under the offending char.
///
/// ```text
/// Syntax error at position 4: Unterminated string literal
/// @.a`b
///    ^
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    /// Char offset into the query
    pub position: usize,
    pub message: String,
    pub query: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Syntax error at position {}: {}\n{}\n{}^",
            self.position,
            self.message,
            self.query,
            " ".repeat(self.position)
        )
    }
}

impl std::error::Error for LexError {}

/// Token with the char offset where it starts.
pub type Spanned = (Token, usize);

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    tokens: Vec<Spanned>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            tokens: Vec::new(),
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek_char(i) == Some(c))
    }

    fn error(&self, position: usize, message: impl Into<String>) -> LexError {
        LexError {
            position,
            message: message.into(),
            query: self.input.iter().collect(),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn previous_ends_operand(&self) -> bool {
        self.tokens.last().is_some_and(|(tok, _)| tok.ends_operand())
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    /// Backtick-delimited text; the opening backtick is the current char.
    ///
    /// Only `` \` `` and `\\` are unescaped, plus `\n`, `\r` and `\t`.
    /// Any other backslash is kept so regex escapes survive untouched.
    fn read_backtick_string(&mut self) -> Result<String, LexError> {
        let start = self.position;
        let mut result = String::new();
        self.advance(); // Consume opening backtick

        while let Some(ch) = self.current_char() {
            match ch {
                '`' => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    self.advance();
                    match self.current_char() {
                        Some('`') => result.push('`'),
                        Some('\\') => result.push('\\'),
                        Some('n') => result.push('\n'),
                        Some('r') => result.push('\r'),
                        Some('t') => result.push('\t'),
                        Some(c) => {
                            result.push('\\');
                            result.push(c);
                        }
                        None => break,
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(self.error(start, "Unterminated string literal"))
    }

    fn read_digits(&mut self, out: &mut String) {
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                out.push(ch);
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let start = self.position;

        if self.starts_with("0x") {
            self.advance();
            self.advance();
            let mut hex = String::new();
            while let Some(ch) = self.current_char() {
                if ch.is_ascii_hexdigit() {
                    hex.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
            return i64::from_str_radix(&hex, 16)
                .map(|n| Token::Literal(Node::new(Value::Int(n), start)))
                .map_err(|_| self.error(start, "Invalid hexadecimal number"));
        }

        let mut number = String::new();
        let mut is_float = false;
        self.read_digits(&mut number);
        if self.current_char() == Some('.') {
            is_float = true;
            number.push('.');
            self.advance();
            self.read_digits(&mut number);
            if self.current_char() == Some('.') && self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) {
                return Err(self.error(self.position, "Number with two decimal points"));
            }
        }
        if matches!(self.current_char(), Some('e' | 'E'))
            && (self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
                || (matches!(self.peek_char(1), Some('+' | '-'))
                    && self.peek_char(2).is_some_and(|c| c.is_ascii_digit())))
        {
            is_float = true;
            number.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.current_char() {
                number.push(sign);
                self.advance();
            }
            self.read_digits(&mut number);
        }

        let value = if is_float {
            number.parse::<f64>().map(Value::Float)
        } else {
            // ints too big for 64 bits become floats
            Ok(number
                .parse::<i64>()
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Float(number.parse::<f64>().unwrap_or(f64::INFINITY))))
        };
        value
            .map(|v| Token::Literal(Node::new(v, start)))
            .map_err(|_| self.error(start, format!("Invalid number '{}'", number)))
    }

    fn read_json_literal(&mut self, start: usize) -> Result<Token, LexError> {
        let text = self.read_backtick_string()?;
        let options = ParserOptions::default()
            .with_logger_level(LoggerLevel::Json5)
            .with_throw_if_logged(false);
        let mut parser = JsonParser::new(options);
        let node = parser
            .parse(&text)
            .map_err(|e| self.error(start, format!("Invalid JSON literal: {}", e)))?;
        if let Some(lint) = parser.fatal_error() {
            return Err(self.error(start, format!("Invalid JSON literal: {}", lint.message())));
        }
        Ok(Token::Literal(Node::new(node.value, start)))
    }

    fn read_regex_literal(&mut self, start: usize) -> Result<Token, LexError> {
        let text = self.read_backtick_string()?;
        let re = Regex::new(&text).map_err(|e| self.error(start, format!("Invalid regex: {}", e)))?;
        Ok(Token::Literal(Node::new(Value::Regex(re), start)))
    }

    fn read_operator(&mut self) -> Option<Token> {
        if self.starts_with("->") {
            self.advance();
            self.advance();
            return Some(Token::Arrow);
        }
        for (symbol, op) in BinOp::BY_SYMBOL {
            if self.starts_with(symbol) {
                for _ in 0..symbol.len() {
                    self.advance();
                }
                return Some(Token::BinOp(op));
            }
        }
        let tok = match self.current_char()? {
            '=' => Token::Assign,
            '!' => Token::Bang,
            '.' => Token::Dot,
            ',' => Token::Comma,
            ':' => Token::Colon,
            ';' => Token::Semicolon,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '@' => Token::At,
            _ => return None,
        };
        self.advance();
        Some(tok)
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        let start = self.position;

        let tok = match self.current_char() {
            None => return Ok(None),
            Some(ch) if ch.is_ascii_digit() => self.read_number()?,
            Some('.')
                if self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) && !self.previous_ends_operand() =>
            {
                self.read_number()?
            }
            Some('`') => {
                let s = self.read_backtick_string()?;
                Token::Literal(Node::new(Value::Str(s), start))
            }
            Some('g') if self.peek_char(1) == Some('`') => {
                self.advance();
                self.read_regex_literal(start)?
            }
            Some('j') if self.peek_char(1) == Some('`') => {
                self.advance();
                self.read_json_literal(start)?
            }
            Some(ch) if ch.is_alphabetic() || ch == '_' || ch == '$' => {
                let ident = self.read_identifier();
                let constant = match ident.as_str() {
                    "null" => Some(Value::Null),
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    "NaN" => Some(Value::Float(f64::NAN)),
                    "Infinity" => Some(Value::Float(f64::INFINITY)),
                    _ => None,
                };
                match constant {
                    Some(v) => Token::Literal(Node::new(v, start)),
                    None => Token::Ident(ident),
                }
            }
            Some(ch) => match self.read_operator() {
                Some(tok) => tok,
                None => return Err(self.error(start, format!("Invalid token '{}'", ch))),
            },
        };
        Ok(Some(tok))
    }

    /// Tokenize the whole query, ending with [`Token::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Spanned>, LexError> {
        loop {
            self.skip_whitespace();
            let start = self.position;
            match self.next_token()? {
                Some(tok) => self.tokens.push((tok, start)),
                None => break,
            }
        }
        self.check_brackets()?;
        let end = self.input.len();
        self.tokens.push((Token::Eof, end));
        Ok(self.tokens)
    }

    fn check_brackets(&self) -> Result<(), LexError> {
        let mut open: Vec<(char, usize)> = Vec::new();
        for (tok, pos) in &self.tokens {
            let (opener, closer) = match tok {
                Token::LParen | Token::LBracket | Token::LBrace => {
                    if open.len() >= MAX_QUERY_DEPTH {
                        return Err(self.error(
                            *pos,
                            format!("Maximum recursion depth ({}) reached", MAX_QUERY_DEPTH),
                        ));
                    }
                    let c = match tok {
                        Token::LParen => '(',
                        Token::LBracket => '[',
                        _ => '{',
                    };
                    open.push((c, *pos));
                    continue;
                }
                Token::RParen => ('(', ')'),
                Token::RBracket => ('[', ']'),
                Token::RBrace => ('{', '}'),
                _ => continue,
            };
            match open.pop() {
                Some((c, _)) if c == opener => {}
                _ => return Err(self.error(*pos, format!("Unmatched '{}'", closer))),
            }
        }
        match open.pop() {
            Some((c, pos)) => Err(self.error(pos, format!("Unclosed '{}'", c))),
            None => Ok(()),
        }
    }
}

/// Tokenize `query`.
pub fn tokenize(query: &str) -> Result<Vec<Spanned>, LexError> {
    Lexer::new(query).tokenize()
}

#[test]
fn test_keywords_stay_identifiers() {
    let toks: Vec<Token> = tokenize("var x = null")
        .unwrap()
        .into_iter()
        .map(|(t, _)| t)
        .collect();
    assert_eq!(
        toks,
        vec![
            Token::Ident("var".to_string()),
            Token::Ident("x".to_string()),
            Token::Assign,
            Token::Literal(Node::null()),
            Token::Eof,
        ]
    );
}

#[test]
fn test_positions() {
    let toks = tokenize("@.a  + 1").unwrap();
    let positions: Vec<usize> = toks.iter().map(|(_, p)| *p).collect();
    assert_eq!(positions, vec![0, 1, 2, 5, 7, 8]);
}
