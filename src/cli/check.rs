//! Run RemesPath queries against JSON input

use tracing::debug;

use super::{CliError, json_to_node};
use crate::{
    Evaluator, JsonParser, Node, ParserOptions, compile,
    output::{PrettyStyle, pretty_render, to_json},
};

/// Options for the query command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The RemesPath query to execute
    pub query: String,
    /// JSON input text
    pub input: Option<String>,
    /// Pretty-print the output
    pub pretty: bool,
    /// Only compile the query, don't execute
    pub syntax_only: bool,
    /// Read the input with serde_json instead of the tolerant parser
    pub strict: bool,
    /// Seed for `rand` and `randint`
    pub seed: Option<u64>,
    /// Tolerant parser settings, ignored with `strict`
    pub parser: ParserOptions,
}

/// Result of a check operation
#[derive(Debug)]
pub enum CheckResult {
    /// The query compiled
    SyntaxValid,
    /// Query executed successfully; rendered output
    Success(String),
}

/// Read `text` into a Node with the configured reader.
pub fn read_input(text: &str, strict: bool, options: &ParserOptions) -> Result<Node, CliError> {
    if strict {
        let value: serde_json::Value = serde_json::from_str(text)?;
        return Ok(json_to_node(value));
    }
    let mut parser = JsonParser::new(options.clone());
    let node = parser.parse(text)?;
    for lint in parser.lint() {
        debug!(position = lint.position, "{}", lint.message());
    }
    Ok(node)
}

/// Compile the query and, unless `syntax_only`, run it over the input.
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    let compiled = compile(&options.query)?;
    if options.syntax_only {
        return Ok(CheckResult::SyntaxValid);
    }

    let text = options.input.as_ref().ok_or(CliError::NoInput)?;
    let mut input = read_input(text, options.strict, &options.parser)?;

    let mut evaluator = match options.seed {
        Some(seed) => Evaluator::with_seed(seed),
        None => Evaluator::new(),
    };
    let result = evaluator.run_mut(&compiled, &mut input).map_err(crate::QueryError::from)?;

    let output = if options.pretty {
        pretty_render(&result, 4, false, PrettyStyle::Google)
    } else {
        to_json(&result)
    };
    Ok(CheckResult::Success(output))
}
