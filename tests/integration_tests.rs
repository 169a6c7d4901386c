// tests/integration_tests.rs
#![cfg(feature = "cli")]

use remespath::cli::{CheckOptions, CheckResult, CliError, FormatOptions, execute_check, execute_format, execute_lint};
use remespath::{JsonParser, ParserOptions, RemesParser, to_json};

fn check(query: &str, input: &str) -> Result<String, CliError> {
    let options = CheckOptions {
        query: query.to_string(),
        input: Some(input.to_string()),
        ..Default::default()
    };
    match execute_check(&options)? {
        CheckResult::Success(out) => Ok(out),
        CheckResult::SyntaxValid => panic!("Expected output for {}", query),
    }
}

// ============================================================================
// Lenient input through to query output
// ============================================================================

#[test]
fn test_lenient_document_then_query() {
    let mut parser = JsonParser::new(ParserOptions::lenient());
    let doc = parser
        .parse("{'a': [1, 2, 3,], b: NaN, // note\n \"c\": {\"d\": 'x'}}")
        .unwrap();
    assert!(parser.lint().len() >= 4);

    let remes = RemesParser::default();
    let test_cases = vec![
        ("sum(@.a) * 2", "12.0"),
        ("isna(@.b)", "true"),
        ("@.c.d", "\"x\""),
        ("@.a[@ > 1]->str(@)", "[\"2\", \"3\"]"),
    ];

    for (query, expected) in test_cases {
        assert_eq!(to_json(&remes.search(query, &doc).unwrap()), expected, "Failed for input: {}", query);
    }
}

// ============================================================================
// Query command
// ============================================================================

#[test]
fn test_check_outputs() {
    assert_eq!(check("@.a[1:]", r#"{"a": [1, 2, 3]}"#).unwrap(), "[2, 3]");
    assert_eq!(check("@.a = 0", r#"{"a": 5}"#).unwrap(), "{\"a\": 0}");
}

#[test]
fn test_check_pretty() {
    let options = CheckOptions {
        query: "@".to_string(),
        input: Some(r#"{"a": 1}"#.to_string()),
        pretty: true,
        ..Default::default()
    };
    match execute_check(&options).unwrap() {
        CheckResult::Success(out) => assert_eq!(out, "{\n    \"a\": 1\n}"),
        other => panic!("Expected output, got {:?}", other),
    }
}

#[test]
fn test_check_syntax_only_needs_no_input() {
    let options = CheckOptions {
        query: "@.a[0]".to_string(),
        syntax_only: true,
        ..Default::default()
    };
    assert!(matches!(execute_check(&options), Ok(CheckResult::SyntaxValid)));

    let missing = CheckOptions {
        query: "@.a[0]".to_string(),
        ..Default::default()
    };
    assert!(matches!(execute_check(&missing), Err(CliError::NoInput)));
}

#[test]
fn test_check_errors() {
    assert!(matches!(check("@.a[", "{}"), Err(CliError::Query(_))));
    assert!(matches!(check("@", "[1, 2,]"), Err(CliError::Json(_))));
}

#[test]
fn test_check_strict_reader() {
    let options = |input: &str| CheckOptions {
        query: "@[0]".to_string(),
        input: Some(input.to_string()),
        strict: true,
        ..Default::default()
    };
    assert!(matches!(
        execute_check(&options("[7, 8]")),
        Ok(CheckResult::Success(out)) if out == "7"
    ));
    assert!(matches!(execute_check(&options("[7, 8,]")), Err(CliError::StrictJson(_))));
}

#[test]
fn test_check_seed_is_reproducible() {
    let options = CheckOptions {
        query: "@{randint(1000), rand()}".to_string(),
        input: Some("null".to_string()),
        seed: Some(11),
        ..Default::default()
    };
    let render = |r: CheckResult| match r {
        CheckResult::Success(out) => out,
        CheckResult::SyntaxValid => String::new(),
    };
    let first = render(execute_check(&options).unwrap());
    let second = render(execute_check(&options).unwrap());
    assert_eq!(first, second);
}

// ============================================================================
// Lint command
// ============================================================================

#[test]
fn test_lint_report() {
    let report = execute_lint("[1, 2,]", &ParserOptions::default(), false);
    assert_eq!(report.lints.len(), 1);
    assert!(!report.is_clean());
    assert!(!report.exited_early);
    let text = report.to_string();
    assert!(text.contains("Comma after last element of array"), "got {}", text);
    assert!(text.contains("Overall severity:"), "got {}", text);
}

#[test]
fn test_lint_clean_json_lines() {
    let report = execute_lint("{\"a\": 1}\n[2]\n", &ParserOptions::default(), true);
    assert!(report.is_clean(), "got {}", report);
    assert_eq!(to_json(&report.to_node()), "[]");
}

#[test]
fn test_lint_fatal_stops_early() {
    let report = execute_lint("[1, tru]", &ParserOptions::default(), false);
    assert!(report.exited_early);
    assert!(report.to_string().ends_with("(parsing stopped early)"));
}

// ============================================================================
// Format command
// ============================================================================

#[test]
fn test_format() {
    let lenient = FormatOptions {
        parser: ParserOptions::lenient(),
        compact: true,
        ..Default::default()
    };
    assert_eq!(execute_format("{'a': [1, 2,]}", &lenient).unwrap(), "{\"a\": [1, 2]}");

    let sorted = FormatOptions {
        sort_keys: true,
        compact: true,
        ..Default::default()
    };
    assert_eq!(execute_format(r#"{"b": 1, "a": 2}"#, &sorted).unwrap(), "{\"a\": 2, \"b\": 1}");

    assert_eq!(execute_format("[1]", &FormatOptions::default()).unwrap(), "[\n    1\n]");
}

#[test]
fn test_format_json_lines() {
    let options = FormatOptions {
        json_lines: true,
        compact: true,
        ..Default::default()
    };
    assert_eq!(execute_format("1\n\"a\"\n", &options).unwrap(), "[1, \"a\"]");
}

#[test]
fn test_format_rejects_deviations_by_default() {
    let err = execute_format("{'a': 1}", &FormatOptions::default()).unwrap_err();
    assert!(matches!(err, CliError::Json(_)));
    assert!(err.to_string().starts_with("Invalid JSON: "));
}
