//! Lint and reformat JSON documents

use std::fmt;

use super::CliError;
use crate::{
    JsonLint, JsonParser, Node, ParserOptions, ParserState,
    output::{PrettyStyle, pretty_render, render},
};

/// Everything the tolerant parser noticed about a document.
#[derive(Debug, Clone)]
pub struct LintReport {
    /// Most severe deviation seen
    pub state: ParserState,
    pub lints: Vec<JsonLint>,
    /// Whether parsing stopped before the end of the input
    pub exited_early: bool,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.lints.is_empty()
    }

    /// The report as a JSON array of `{message, position, severity}` objects.
    pub fn to_node(&self) -> Node {
        Node::array(self.lints.iter().map(JsonLint::to_node).collect())
    }
}

impl fmt::Display for LintReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for lint in &self.lints {
            writeln!(f, "{}", lint)?;
        }
        write!(f, "Overall severity: {}", self.state)?;
        if self.exited_early {
            write!(f, " (parsing stopped early)")?;
        }
        Ok(())
    }
}

/// Parse `text` and collect every deviation.
///
/// Logged deviations never abort the parse here; only a FATAL one does, and
/// that is reported rather than raised.
pub fn execute_lint(text: &str, options: &ParserOptions, json_lines: bool) -> LintReport {
    let options = options.clone().with_throw_if_logged(false).with_throw_if_fatal(false);
    let mut parser = JsonParser::new(options);
    let result = if json_lines {
        parser.parse_json_lines(text)
    } else {
        parser.parse(text)
    };
    LintReport {
        state: parser.state(),
        lints: parser.lint().to_vec(),
        exited_early: result.is_err() || parser.exited_early(),
    }
}

/// Options for the format command
#[derive(Debug, Clone)]
pub struct FormatOptions {
    pub indent: usize,
    pub sort_keys: bool,
    pub style: PrettyStyle,
    /// Single line, `", "` and `": "` separators
    pub compact: bool,
    pub json_lines: bool,
    pub parser: ParserOptions,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions {
            indent: 4,
            sort_keys: false,
            style: PrettyStyle::Google,
            compact: false,
            json_lines: false,
            parser: ParserOptions::default(),
        }
    }
}

/// Reprint `text` as JSON.
pub fn execute_format(text: &str, options: &FormatOptions) -> Result<String, CliError> {
    let mut parser = JsonParser::new(options.parser.clone());
    let node = if options.json_lines {
        parser.parse_json_lines(text)?
    } else {
        parser.parse(text)?
    };
    if options.compact {
        return Ok(render(&node, options.sort_keys, ": ", ", "));
    }
    Ok(pretty_render(&node, options.indent, options.sort_keys, options.style))
}
