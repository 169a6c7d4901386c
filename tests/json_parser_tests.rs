// tests/json_parser_tests.rs

use chrono::NaiveDate;
use remespath::json_parser::{
    Comment, JsonParser, LintType, LoggerLevel, ParserOptions, ParserState, parse_json, parse_json_lines,
};
use remespath::output::to_json;
use remespath::value::{Node, Value};

fn lenient_parse(input: &str) -> (Node, JsonParser) {
    let mut parser = JsonParser::new(ParserOptions::lenient());
    let node = parser.parse(input).unwrap();
    (node, parser)
}

fn lint_types(parser: &JsonParser) -> Vec<LintType> {
    parser.lint().iter().map(|l| l.lint_type.clone()).collect()
}

// ============================================================================
// Strict JSON
// ============================================================================

#[test]
fn test_strict_documents_have_no_lints() {
    let test_cases = vec![
        "1",
        "-2.5e3",
        "\"hi\"",
        "[1, 2, 3]",
        "{\"a\": {\"b\": [true, false, null]}}",
        "  [ ]  ",
        "{}",
    ];

    for input in test_cases {
        let (_, parser) = lenient_parse(input);
        assert_eq!(parser.state(), ParserState::Strict, "Failed for input: {}", input);
        assert!(parser.lint().is_empty(), "Failed for input: {}", input);
    }
}

#[test]
fn test_values_round_trip_through_compact_output() {
    let test_cases = vec![
        ("[1, 2.0, \"x\"]", "[1, 2.0, \"x\"]"),
        ("{\"b\":1,\"a\":[null]}", "{\"b\": 1, \"a\": [null]}"),
        ("1e2", "100.0"),
        ("\"tab\\there\"", "\"tab\\there\""),
    ];

    for (input, expected) in test_cases {
        let node = parse_json(input).unwrap();
        assert_eq!(to_json(&node), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_positions_are_byte_offsets() {
    let node = parse_json("{\"a\": [1, 22]}").unwrap();
    assert_eq!(node.position, 0);
    let arr = node.get_key("a").unwrap();
    assert_eq!(arr.position, 6);
    assert_eq!(arr.get_index(0).unwrap().position, 7);
    assert_eq!(arr.get_index(1).unwrap().position, 10);
}

#[test]
fn test_positions_count_multibyte_characters_as_bytes() {
    let node = parse_json("{\"words\": \"Th\u{1ebf} n\u{e0}o r\u{1ed3}i?\", \"n\": 1}").unwrap();
    let n = node.get_key("n").unwrap();
    assert_eq!(n.position, 36);
    assert_eq!(node.get_key("words").unwrap().position, 10);
}

#[test]
fn test_big_integers_become_floats() {
    let node = parse_json("12345678901234567890").unwrap();
    assert!(matches!(node.value, Value::Float(f) if f > 1.2e19));
}

// ============================================================================
// Severity ladder
// ============================================================================

#[test]
fn test_single_deviation_severity() {
    let test_cases = vec![
        ("NaN", LintType::NaN, ParserState::NanInf),
        ("-Infinity", LintType::Infinity, ParserState::NanInf),
        ("// c\n[1]", LintType::JavaScriptComment, ParserState::Jsonc),
        ("[1, 2,]", LintType::Json5CommaAfterLastElementArray, ParserState::Json5),
        ("{\"a\": 1,}", LintType::Json5CommaAfterLastElementObject, ParserState::Json5),
        ("{a: 1}", LintType::Json5UnquotedKey, ParserState::Json5),
        ("'s'", LintType::Json5SingleQuotedString, ParserState::Json5),
        ("0x1F", LintType::Json5HexNum, ParserState::Json5),
        ("+5", LintType::Json5NumLeadingPlus, ParserState::Json5),
        (".5", LintType::Json5NumLeadingDecimalPoint, ParserState::Json5),
        ("# c\n[1]", LintType::PythonComment, ParserState::Bad),
        ("[1 2]", LintType::NoCommaBetweenArrayItems, ParserState::Bad),
        ("[1,,2]", LintType::TwoConsecutiveCommasArray(0), ParserState::Bad),
        ("[1, 2", LintType::UnterminatedArray, ParserState::Bad),
        ("012", LintType::UnnecessaryLeadingZero, ParserState::Bad),
        ("[1] x", LintType::CharInsteadOfEof('x'), ParserState::Bad),
        ("nan", LintType::PythonNan, ParserState::Bad),
    ];

    for (input, lint, state) in test_cases {
        let (_, parser) = lenient_parse(input);
        assert_eq!(lint_types(&parser), vec![lint], "Failed for input: {}", input);
        assert_eq!(parser.state(), state, "Failed for input: {}", input);
    }
}

#[test]
fn test_recovered_values() {
    let test_cases = vec![
        ("[1, 2,]", "[1, 2]"),
        ("[1,,2]", "[1, 2]"),
        ("[1 2]", "[1, 2]"),
        ("[1, 2", "[1, 2]"),
        ("{'a': 'b'}", "{\"a\": \"b\"}"),
        ("{a: 1, $b_2: 2}", "{\"a\": 1, \"$b_2\": 2}"),
        ("{\"a\": 1 \"b\": 2}", "{\"a\": 1, \"b\": 2}"),
        ("[True, False, None, undefined]", "[true, false, null, null]"),
        ("[0x1F, +5, .5, 5.]", "[31, 5, 0.5, 5.0]"),
        ("1/2", "0.5"),
        ("[inf, -inf]", "[Infinity, -Infinity]"),
        ("\"abc", "\"abc\""),
        ("{\"a\": 1, \"a\": 2}", "{\"a\": 2}"),
    ];

    for (input, expected) in test_cases {
        let (node, _) = lenient_parse(input);
        assert_eq!(to_json(&node), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_state_is_worst_severity_seen() {
    let (_, parser) = lenient_parse("[NaN, 'a', 1 2]");
    assert_eq!(parser.state(), ParserState::Bad);
    let severities: Vec<ParserState> = parser.lint().iter().map(|l| l.severity()).collect();
    assert_eq!(
        severities,
        vec![ParserState::NanInf, ParserState::Json5, ParserState::Bad]
    );
}

#[test]
fn test_logger_level_filters_lints() {
    let options = ParserOptions::lenient().with_logger_level(LoggerLevel::Json5);
    let mut parser = JsonParser::new(options);
    parser.parse("[NaN, 'a', 1 2]").unwrap();
    // state still tracks everything, only the BAD lint is logged
    assert_eq!(parser.state(), ParserState::Bad);
    assert_eq!(lint_types(&parser), vec![LintType::NoCommaBetweenArrayItems]);
}

// ============================================================================
// Raising
// ============================================================================

#[test]
fn test_default_options_raise_past_nan_inf() {
    assert!(parse_json("[NaN, Infinity, -Infinity]").is_ok());

    let test_cases = vec![
        ("[1, 2,]", LintType::Json5CommaAfterLastElementArray),
        ("// c\n1", LintType::JavaScriptComment),
        ("{a: 1}", LintType::Json5UnquotedKey),
        ("[1,,2]", LintType::TwoConsecutiveCommasArray(0)),
    ];

    for (input, lint) in test_cases {
        let err = parse_json(input).unwrap_err();
        assert_eq!(err.lint.lint_type, lint, "Failed for input: {}", input);
    }
}

#[test]
fn test_error_display() {
    let err = parse_json("[1, 2,]").unwrap_err();
    assert_eq!(err.position(), 6);
    assert_eq!(err.to_string(), "Comma after last element of array at position 6 (char ']')");
}

#[test]
fn test_fatal_stops_parsing() {
    let (node, parser) = lenient_parse("[1, 2, tru]");
    assert_eq!(to_json(&node), "[1, 2, null]");
    assert_eq!(parser.state(), ParserState::Fatal);
    assert!(parser.exited_early());
    let fatal = parser.fatal_error().unwrap();
    assert_eq!(fatal.lint_type, LintType::InvalidStartsWith('t'));
    assert_eq!(fatal.message(), "Expected literal starting with 't' to be true");
}

#[test]
fn test_fatal_raises_when_throw_if_fatal() {
    let options = ParserOptions::lenient().with_throw_if_fatal(true);
    let err = JsonParser::new(options).parse("[1, 2, tru]").unwrap_err();
    assert_eq!(err.lint.lint_type, LintType::InvalidStartsWith('t'));
}

#[test]
fn test_empty_input() {
    let err = parse_json("").unwrap_err();
    assert_eq!(err.lint.lint_type, LintType::NoInput);

    let (node, parser) = lenient_parse("   ");
    assert_eq!(node, Node::null());
    assert_eq!(lint_types(&parser), vec![LintType::OnlyWhitespaceComments]);
}

#[test]
fn test_recursion_limit() {
    // nesting this deep needs more than the default test thread stack
    let handle = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            let ok = format!("{}{}", "[".repeat(512), "]".repeat(512));
            let (_, parser) = lenient_parse(&ok);
            assert_eq!(parser.state(), ParserState::Strict);

            let too_deep = format!("{}{}", "[".repeat(513), "]".repeat(513));
            let (_, parser) = lenient_parse(&too_deep);
            assert_eq!(parser.state(), ParserState::Fatal);
            assert_eq!(lint_types(&parser), vec![LintType::MaxRecursionDepth]);
        })
        .unwrap();
    handle.join().unwrap();
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn test_string_escapes() {
    let test_cases = vec![
        ("\"a\\u0041\"", "aA"),
        ("\"\\ud83d\\ude00\"", "\u{1F600}"),
        ("\"a\\/b\"", "a/b"),
        ("'it\\'s'", "it's"),
        ("\"a\\x41\"", "aA"),
        ("\"a\\qb\"", "aqb"),
        ("\"caf\u{e9}\"", "caf\u{e9}"),
    ];

    for (input, expected) in test_cases {
        let (node, _) = lenient_parse(input);
        assert_eq!(node.value, Value::Str(expected.to_string()), "Failed for input: {}", input);
    }
}

#[test]
fn test_string_control_chars() {
    let (node, parser) = lenient_parse("\"a\tb\"");
    assert_eq!(node.value, Value::Str("a\tb".to_string()));
    assert_eq!(lint_types(&parser), vec![LintType::ControlChar]);
    assert_eq!(parser.state(), ParserState::Ok);

    let (node, parser) = lenient_parse("\"a\nb\"");
    assert_eq!(node.value, Value::Str("a\nb".to_string()));
    assert_eq!(lint_types(&parser), vec![LintType::StringContainsNewline]);
}

#[test]
fn test_parse_dates() {
    let options = ParserOptions::default().with_parse_dates(true);
    let mut parser = JsonParser::new(options);
    let node = parser
        .parse("[\"2024-01-15\", \"2024-01-15 10:30:00\", \"2024-13-45\", \"nope\"]")
        .unwrap();
    let Value::Array(items) = &node.value else {
        panic!("Expected array");
    };
    assert_eq!(items[0].value, Value::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()));
    assert!(matches!(items[1].value, Value::DateTime(_)));
    assert_eq!(items[2].value, Value::Str("2024-13-45".to_string()));
    assert_eq!(items[3].value, Value::Str("nope".to_string()));
}

// ============================================================================
// Comments
// ============================================================================

#[test]
fn test_remember_comments() {
    let options = ParserOptions::lenient().with_remember_comments(true);
    let mut parser = JsonParser::new(options);
    let node = parser.parse("// hello\n[1, /* mid */ 2]").unwrap();
    assert_eq!(to_json(&node), "[1, 2]");
    assert_eq!(
        parser.comments(),
        &[
            Comment {
                content: " hello".to_string(),
                is_multiline: false,
                position: 0,
            },
            Comment {
                content: " mid ".to_string(),
                is_multiline: true,
                position: 13,
            },
        ]
    );
}

#[test]
fn test_unterminated_multiline_comment() {
    let (node, parser) = lenient_parse("[1] /* never closed");
    assert_eq!(to_json(&node), "[1]");
    assert!(lint_types(&parser).contains(&LintType::UnterminatedMultilineComment));
}

// ============================================================================
// JSON Lines
// ============================================================================

#[test]
fn test_json_lines() {
    let node = parse_json_lines("{\"a\": 1}\n[2]\n3\n").unwrap();
    assert_eq!(to_json(&node), "[{\"a\": 1}, [2], 3]");

    let node = parse_json_lines("1\n2").unwrap();
    assert_eq!(to_json(&node), "[1, 2]");
}

#[test]
fn test_json_lines_one_document_per_line() {
    let err = parse_json_lines("[1] [2]\n").unwrap_err();
    assert_eq!(err.lint.lint_type, LintType::JsonLinesNotOneDocPerLine);
}

#[test]
fn test_parser_reuse_resets_state() {
    let mut parser = JsonParser::new(ParserOptions::lenient());
    parser.parse("[1,]").unwrap();
    assert_eq!(parser.state(), ParserState::Json5);
    parser.parse("[1]").unwrap();
    assert_eq!(parser.state(), ParserState::Strict);
    assert!(parser.lint().is_empty());
}

#[test]
fn test_lint_to_node() {
    let (_, parser) = lenient_parse("[1,]");
    let node = parser.lint()[0].to_node();
    assert_eq!(
        to_json(&node),
        "{\"message\": \"Comma after last element of array\", \"position\": 3, \"severity\": \"JSON5\"}"
    );
}
