//! JSON output for [`Node`] trees.
//!
//! This module renders trees produced by the parser or by a query back to
//! JSON text, either compactly with caller-chosen separators or pretty-printed
//! in one of three styles.
//!
//! # Features
//!
//! - **Compact output** via [`render()`] / [`to_json()`]
//! - **Pretty output** via [`pretty_render()`] / [`to_json_pretty()`], in
//!   [`PrettyStyle::Google`], [`PrettyStyle::Whitesmith`] or [`PrettyStyle::PPrint`] layout
//! - **Type preservation**: whole floats keep a trailing `.0`; NaN and the
//!   infinities are written as `NaN`, `Infinity` and `-Infinity`
//! - **Optional key sorting**, case-insensitive
//! - **Paths**: [`path_to_position()`] turns a source position back into a query path
//!
//! # Examples
//!
//! ```
//! use remespath::json_parser::parse_json;
//! use remespath::output::{render, to_json};
//!
//! let node = parse_json(r#"{"b": [1, 2.0], "a": null}"#).unwrap();
//! assert_eq!(to_json(&node), r#"{"b": [1, 2.0], "a": null}"#);
//! assert_eq!(render(&node, true, ":", ","), r#"{"a":null,"b":[1,2.0]}"#);
//! ```

use crate::value::{Node, Value};

/// Longest line PPrint style tries to keep a compact container on.
pub const PPRINT_LINE_LENGTH: usize = 79;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrettyStyle {
    /// Children indented one level past their parent's brackets.
    #[default]
    Google,
    /// Brackets indented to the same level as the children.
    Whitesmith,
    /// Like Google, but containers that fit on one line are kept compact.
    PPrint,
}

#[derive(Debug, Clone)]
enum Layout {
    Compact { key_sep: String, item_sep: String },
    Pretty { indent: usize, style: PrettyStyle },
}

pub struct JsonPrinter {
    sort_keys: bool,
    layout: Layout,
}

impl JsonPrinter {
    pub fn compact(sort_keys: bool, key_sep: &str, item_sep: &str) -> Self {
        JsonPrinter {
            sort_keys,
            layout: Layout::Compact {
                key_sep: key_sep.to_string(),
                item_sep: item_sep.to_string(),
            },
        }
    }

    pub fn pretty(indent: usize, sort_keys: bool, style: PrettyStyle) -> Self {
        JsonPrinter {
            sort_keys,
            layout: Layout::Pretty { indent, style },
        }
    }

    pub fn print(&self, node: &Node) -> String {
        let mut out = String::new();
        match &self.layout {
            Layout::Compact { key_sep, item_sep } => self.print_compact(node, key_sep, item_sep, &mut out),
            Layout::Pretty { indent, style } => self.print_pretty(node, *indent, *style, 0, &mut out),
        }
        out
    }

    fn ordered_entries<'a>(&self, obj: &'a crate::value::ObjectMap) -> Vec<(&'a String, &'a Node)> {
        let mut entries: Vec<_> = obj.iter().collect();
        if self.sort_keys {
            entries.sort_by(|(a, _), (b, _)| {
                a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
            });
        }
        entries
    }

    fn print_compact(&self, node: &Node, key_sep: &str, item_sep: &str, out: &mut String) {
        match &node.value {
            Value::Array(arr) => {
                out.push('[');
                for (i, child) in arr.iter().enumerate() {
                    if i > 0 {
                        out.push_str(item_sep);
                    }
                    self.print_compact(child, key_sep, item_sep, out);
                }
                out.push(']');
            }
            Value::Object(obj) => {
                out.push('{');
                for (i, (k, child)) in self.ordered_entries(obj).into_iter().enumerate() {
                    if i > 0 {
                        out.push_str(item_sep);
                    }
                    push_quoted(k, out);
                    out.push_str(key_sep);
                    self.print_compact(child, key_sep, item_sep, out);
                }
                out.push('}');
            }
            _ => out.push_str(&scalar_to_string(node)),
        }
    }

    fn print_pretty(&self, node: &Node, indent: usize, style: PrettyStyle, depth: usize, out: &mut String) {
        let dent = " ".repeat(indent * depth);
        let child_dent = " ".repeat(indent * (depth + 1));
        match &node.value {
            Value::Array(arr) if !arr.is_empty() => {
                if style == PrettyStyle::Whitesmith {
                    out.push_str(&dent);
                }
                out.push_str("[\n");
                for (i, child) in arr.iter().enumerate() {
                    match style {
                        PrettyStyle::Whitesmith => {
                            if !has_children(child) {
                                out.push_str(&dent);
                            }
                            self.print_pretty(child, indent, style, depth + 1, out);
                        }
                        PrettyStyle::Google => {
                            out.push_str(&child_dent);
                            self.print_pretty(child, indent, style, depth + 1, out);
                        }
                        PrettyStyle::PPrint => {
                            out.push_str(&child_dent);
                            self.pprint_child(child, indent, depth, out);
                        }
                    }
                    if i + 1 < arr.len() {
                        out.push(',');
                    }
                    out.push('\n');
                }
                out.push_str(&dent);
                out.push(']');
            }
            Value::Object(obj) if !obj.is_empty() => {
                if style == PrettyStyle::Whitesmith {
                    out.push_str(&dent);
                }
                out.push_str("{\n");
                let entries = self.ordered_entries(obj);
                let n = entries.len();
                for (i, (k, child)) in entries.into_iter().enumerate() {
                    match style {
                        PrettyStyle::Whitesmith => {
                            out.push_str(&dent);
                            push_quoted(k, out);
                            out.push(':');
                            out.push(if has_children(child) { '\n' } else { ' ' });
                            self.print_pretty(child, indent, style, depth + 1, out);
                        }
                        PrettyStyle::Google => {
                            out.push_str(&child_dent);
                            push_quoted(k, out);
                            out.push_str(": ");
                            self.print_pretty(child, indent, style, depth + 1, out);
                        }
                        PrettyStyle::PPrint => {
                            out.push_str(&child_dent);
                            push_quoted(k, out);
                            out.push_str(": ");
                            self.pprint_child(child, indent, depth, out);
                        }
                    }
                    if i + 1 < n {
                        out.push(',');
                    }
                    out.push('\n');
                }
                out.push_str(&dent);
                out.push('}');
            }
            _ => self.print_compact(node, ": ", ", ", out),
        }
    }

    /// PPrint keeps a child container compact when it fits on the current line.
    fn pprint_child(&self, child: &Node, indent: usize, depth: usize, out: &mut String) {
        let many_children = child.len().is_some_and(|n| n > PPRINT_LINE_LENGTH / 8);
        if child.is_iterable() && !many_children {
            let mut compact = String::new();
            self.print_compact(child, ": ", ", ", &mut compact);
            let line_len = out.len() - out.rfind('\n').map_or(0, |i| i + 1);
            if line_len + compact.len() <= PPRINT_LINE_LENGTH {
                out.push_str(&compact);
                return;
            }
        }
        self.print_pretty(child, indent, PrettyStyle::PPrint, depth + 1, out);
    }
}

fn has_children(node: &Node) -> bool {
    node.len().is_some_and(|n| n > 0)
}

/// Render a float the way the parser reads it back: `1.0`, `1e300`, `NaN`, `-Infinity`.
pub fn float_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        // Debug keeps the `.0` on whole numbers and switches to exponents for extremes
        format!("{:?}", n)
    }
}

fn scalar_to_string(node: &Node) -> String {
    match &node.value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(n) => float_to_string(*n),
        Value::Str(s) => quote(s),
        Value::Date(d) => quote(&d.format("%Y-%m-%d").to_string()),
        Value::DateTime(dt) => quote(&dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        Value::Regex(re) => quote(re.as_str()),
        Value::Slice(s) => quote(&s.to_string()),
        Value::Array(_) | Value::Object(_) => to_json(node),
    }
}

/// Wrap a string in double quotes, escaping as JSON requires.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    push_quoted(s, &mut out);
    out
}

fn push_quoted(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Render a plain value for string contexts (`str()`, `s_join`, `group_by` keys):
/// strings come out bare, everything else as compact JSON.
pub fn display_string(node: &Node) -> String {
    match &node.value {
        Value::Str(s) => s.clone(),
        _ => to_json(node),
    }
}

// Convenience functions

/// Compact rendering with caller-chosen separators.
///
/// # Arguments
///
/// * `sort_keys` - order object keys case-insensitively instead of by insertion
/// * `key_sep` - written between a key and its value, e.g. `": "` or `":"`
/// * `item_sep` - written between siblings, e.g. `", "` or `","`
///
/// # Examples
///
/// ```
/// use remespath::json_parser::parse_json;
/// use remespath::output::render;
///
/// let node = parse_json("[1, {\"B\": 2, \"a\": 3}]").unwrap();
/// assert_eq!(render(&node, true, ":", ","), "[1,{\"a\":3,\"B\":2}]");
/// ```
pub fn render(node: &Node, sort_keys: bool, key_sep: &str, item_sep: &str) -> String {
    JsonPrinter::compact(sort_keys, key_sep, item_sep).print(node)
}

/// Multi-line rendering.
///
/// Empty arrays and objects always render as `[]` and `{}`.
///
/// # Examples
///
/// ```
/// use remespath::json_parser::parse_json;
/// use remespath::output::{pretty_render, PrettyStyle};
///
/// let node = parse_json("{\"a\": [1, 2]}").unwrap();
/// assert_eq!(
///     pretty_render(&node, 2, false, PrettyStyle::Google),
///     "{\n  \"a\": [\n    1,\n    2\n  ]\n}"
/// );
/// assert_eq!(
///     pretty_render(&node, 2, false, PrettyStyle::PPrint),
///     "{\n  \"a\": [1, 2]\n}"
/// );
/// ```
pub fn pretty_render(node: &Node, indent: usize, sort_keys: bool, style: PrettyStyle) -> String {
    JsonPrinter::pretty(indent, sort_keys, style).print(node)
}

/// Converts a Node to its default compact representation.
///
/// Keys keep insertion order, pairs are separated by `", "` and keys from
/// values by `": "`. This is also how nodes are shown inside error messages.
pub fn to_json(node: &Node) -> String {
    render(node, false, ": ", ", ")
}

/// Converts a Node to Google-style pretty JSON with 4-space indentation,
/// keys in insertion order.
pub fn to_json_pretty(node: &Node) -> String {
    pretty_render(node, 4, false, PrettyStyle::Google)
}

// ========================================
// Paths
// ========================================

/// How [`format_key`] and [`path_to_position`] spell object keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStyle {
    /// `` .foo `` or `` [`foo bar`] ``
    #[default]
    RemesPath,
    /// `.foo` or `["foo bar"]`
    JavaScript,
    /// always `["foo"]`
    Python,
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Format a key as one path step.
///
/// ```
/// use remespath::output::{format_key, KeyStyle};
///
/// assert_eq!(format_key("a", KeyStyle::RemesPath), ".a");
/// assert_eq!(format_key("a b", KeyStyle::RemesPath), "[`a b`]");
/// assert_eq!(format_key("a b", KeyStyle::JavaScript), "[\"a b\"]");
/// assert_eq!(format_key("a", KeyStyle::Python), "[\"a\"]");
/// ```
pub fn format_key(key: &str, style: KeyStyle) -> String {
    match style {
        KeyStyle::RemesPath if is_identifier(key) => format!(".{}", key),
        KeyStyle::RemesPath => {
            format!("[`{}`]", key.replace('\\', "\\\\").replace('`', "\\`"))
        }
        KeyStyle::JavaScript if is_identifier(key) => format!(".{}", key),
        KeyStyle::JavaScript | KeyStyle::Python => format!("[{}]", quote(key)),
    }
}

/// Path from `root` to the deepest node starting at or before `position`.
///
/// At each container the child with the greatest position not past
/// `position` is followed. RemesPath paths start with `@`.
pub fn path_to_position(root: &Node, position: usize, style: KeyStyle) -> String {
    let mut path = match style {
        KeyStyle::RemesPath => "@".to_string(),
        _ => String::new(),
    };
    let mut node = root;
    loop {
        if node.position == position {
            break;
        }
        let next = match &node.value {
            Value::Array(arr) => arr
                .iter()
                .enumerate()
                .filter(|(_, child)| child.position <= position)
                .max_by_key(|(_, child)| child.position)
                .map(|(i, child)| (format!("[{}]", i), child)),
            Value::Object(obj) => obj
                .iter()
                .filter(|(_, child)| child.position <= position)
                .max_by_key(|(_, child)| child.position)
                .map(|(k, child)| (format_key(k, style), child)),
            _ => None,
        };
        match next {
            Some((step, child)) => {
                path.push_str(&step);
                node = child;
            }
            None => break,
        }
    }
    path
}
