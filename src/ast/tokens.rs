use std::fmt;

use crate::{ast::BinOp, output::to_json, value::Node};

/// Lexical token of a RemesPath query.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal value
    ///
    /// Numbers, backtick strings, `g` regexes, `j` JSON literals and the
    /// named constants all become literals at lex time.
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 0x1f
    /// .5
    /// `hello`
    /// g`^a+$`
    /// j`{"a": [1, 2]}`
    /// true
    /// NaN
    /// ```
    Literal(Node),

    /// Unquoted identifier
    ///
    /// Resolves to a variable, a function name, a keyword (`var`, `for`,
    /// `end`, `not`) or a plain string depending on where it appears.
    ///
    /// # Examples
    /// ```text
    /// items
    /// _id
    /// $ref
    /// ```
    Ident(String),

    /// Current node (`@`)
    At,

    /// Binary operator
    ///
    /// `*`, `-` and `+` are also the star indexer, spread, and unary signs.
    BinOp(BinOp),

    /// Map projection (`->`)
    Arrow,

    /// Negated indexer (`!`)
    Bang,

    /// Assignment (`=`), used by mutations and declarations
    Assign,

    // Delimiters
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `;`
    Semicolon,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `{`
    LBrace,
    /// `}`
    RBrace,

    /// End of input
    Eof,
}

impl Token {
    /// Whether a token can end an operand, used to disambiguate `.5`.
    pub fn ends_operand(&self) -> bool {
        matches!(
            self,
            Token::Literal(_)
                | Token::Ident(_)
                | Token::At
                | Token::RBracket
                | Token::RParen
                | Token::RBrace
        )
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(self, Token::Ident(s) if s == name)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Literal(node) => write!(f, "{}", to_json(node)),
            Token::Ident(name) => write!(f, "{}", name),
            Token::At => write!(f, "@"),
            Token::BinOp(op) => write!(f, "{}", op.symbol()),
            Token::Arrow => write!(f, "->"),
            Token::Bang => write!(f, "!"),
            Token::Assign => write!(f, "="),
            Token::Dot => write!(f, "."),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Semicolon => write!(f, ";"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Eof => write!(f, "end of query"),
        }
    }
}
