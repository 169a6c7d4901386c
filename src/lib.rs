//! # remespath
//!
//! A forgiving JSON parser and linter, plus RemesPath, a query language for
//! selecting, transforming and editing JSON.
//!
//! ```
//! use remespath::{JsonParser, ParserOptions, RemesParser, to_json};
//!
//! let mut parser = JsonParser::new(ParserOptions::lenient());
//! let doc = parser.parse("{'a': [1, 2, 3,], b: NaN}").unwrap();
//! assert!(!parser.lint().is_empty());
//!
//! let remes = RemesParser::default();
//! assert_eq!(to_json(&remes.search("sum(@.a) * 2", &doc).unwrap()), "12.0");
//! ```
pub mod ast;
pub mod evaluator;
pub mod functions;
pub mod json_parser;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod path;
pub mod query_cache;
pub mod slice;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{BinOp, CompiledQuery, Expr, Statement, Token};
pub use evaluator::{ArgumentError, EvalError, Evaluator};
pub use json_parser::{
    JsonLint, JsonParseError, JsonParser, LintType, LoggerLevel, ParserOptions, ParserState, parse_json,
    parse_json_lines, parse_json_with,
};
pub use lexer::{LexError, Lexer};
pub use output::{PrettyStyle, pretty_render, render, to_json, to_json_pretty};
pub use parser::{ParseError, QueryError, compile};
pub use query_cache::{QueryCache, RemesParser};
pub use slice::Slice;
pub use value::{Dtype, Node, Value};
