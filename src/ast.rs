//! # RemesPath - Abstract Syntax Tree
//!
//! This module defines the syntax tree for RemesPath, a query language for
//! selecting, transforming and editing JSON documents.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[operators]** - Binary and unary operators with their binding powers
//! - **[expressions]** - Expression nodes and indexers
//! - **[statements]** - Variable declarations, loops, mutations
//! - **[query]** - A compiled query, either a constant or a program to run
//!
//! ## Quick Start
//!
//! ```text
//! @.items[@.price > 100].name
//! ```
//!
//! Selects the names of all items costing more than 100.
//!
//! ## Core Concepts
//!
//! ### The current node
//!
//! `@` is the input document at the top level. Inside a boolean index or a
//! projection it is rebound to the node being indexed.
//!
//! ### Indexers
//!
//! - `.key`, `` .`quoted key` ``, ``.g`regex` `` and `[k1, k2]` select object children
//! - `[0]`, `[-1]`, `[1:3]`, `[::2]` select array children
//! - `[*]` and `.*` select every child
//! - `..key`, `..[0]`, `..*` search recursively
//! - `[@.x > 3]` filters by a boolean (or array of booleans)
//! - `{a: @.b, c}` and `{@.x, @.y}` build new objects and arrays
//! - `-> expr` maps each selected node through `expr`
//!
//! ### Vectorization
//!
//! Binary operators and most string/number functions apply elementwise to
//! arrays and objects: `@ * 2` doubles every number in an array.
//!
//! ### Mutation
//!
//! A single `=` turns a query into an in-place edit:
//!
//! ```text
//! @.prices[@ < 0] = 0
//! ```
pub mod tokens;
pub mod expressions;
pub mod operators;
pub mod statements;
pub mod query;

pub use tokens::Token;
pub use expressions::{Expr, Indexer, IndexerKind};
pub use operators::{BinOp, UnaryOp};
pub use statements::Statement;
pub use query::{CompiledQuery, Program};
