// tests/evaluator_tests.rs

use remespath::evaluator::{EvalError, Evaluator};
use remespath::json_parser::parse_json;
use remespath::output::to_json;
use remespath::parser::{QueryError, compile};
use remespath::value::Value;

const DOC: &str = r#"{"foo": [1, 2, 3], "bar": {"a": false, "b": ["x", "y"]}, "baz": "z"}"#;

fn search(query: &str, input: &str) -> Result<String, QueryError> {
    let doc = parse_json(input).unwrap();
    let compiled = compile(query)?;
    Ok(to_json(&Evaluator::new().run(&compiled, &doc)?))
}

fn eval_error(query: &str, input: &str) -> EvalError {
    match search(query, input) {
        Err(QueryError::Eval(e)) => e,
        other => panic!("Expected an evaluation error for {}, got {:?}", query, other),
    }
}

// ============================================================================
// Indexing
// ============================================================================

#[test]
fn test_indexers() {
    let test_cases = vec![
        ("@.foo", "[1, 2, 3]"),
        ("@.foo[0]", "1"),
        ("@.foo[-1]", "3"),
        ("@.foo[1:]", "[2, 3]"),
        ("@.foo[::-1]", "[3, 2, 1]"),
        ("@.foo[0, 2]", "[1, 3]"),
        ("@.foo[5]", "[]"),
        ("@.bar.b[1]", "\"y\""),
        ("@[`baz`]", "\"z\""),
        ("@[foo, baz]", "{\"foo\": [1, 2, 3], \"baz\": \"z\"}"),
        ("@.g`^ba`", "{\"bar\": {\"a\": false, \"b\": [\"x\", \"y\"]}, \"baz\": \"z\"}"),
        ("@.nope", "{}"),
        ("@.bar.*", "{\"a\": false, \"b\": [\"x\", \"y\"]}"),
        ("@.foo[*]", "[1, 2, 3]"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(search(input, DOC).unwrap(), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_recursive_indexers() {
    let test_cases = vec![
        ("@..b", DOC, "[\"x\", \"y\"]"),
        ("@..*", DOC, "[1, 2, 3, false, \"x\", \"y\", \"z\"]"),
        ("@..x", r#"{"x": 1, "y": {"x": 2}}"#, "[1, 2]"),
        ("@..g`^[ab]$`", r#"{"a": 1, "c": {"b": 2}}"#, "[1, 2]"),
        ("@..[0]", "[[1, 2], [3]]", "[[1, 2], 1, 3]"),
    ];

    for (query, input, expected) in test_cases {
        assert_eq!(search(query, input).unwrap(), expected, "Failed for input: {}", query);
    }
}

#[test]
fn test_negated_indexers() {
    let test_cases = vec![
        ("@.bar!.a", "{\"b\": [\"x\", \"y\"]}"),
        ("@.foo![0]", "[2, 3]"),
        ("@.foo![:2]", "[3]"),
        ("@![foo, bar]", "{\"baz\": \"z\"}"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(search(input, DOC).unwrap(), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_boolean_indexers() {
    let test_cases = vec![
        ("@.foo[@ > 1]", "[2, 3]"),
        ("@.foo[@ > 5]", "[]"),
        ("@.foo[@ > 1 & @ < 3]", "[2]"),
        ("@.foo[@ == 2 | @ == 3]", "[2, 3]"),
        ("@.bar.b[@ =~ `y`]", "[\"y\"]"),
        ("@[is_expr(@)]", "{\"foo\": [1, 2, 3], \"bar\": {\"a\": false, \"b\": [\"x\", \"y\"]}}"),
        ("@.foo[true]", "[1, 2, 3]"),
        ("@.baz[@ == `z`]", "\"z\""),
    ];

    for (input, expected) in test_cases {
        assert_eq!(search(input, DOC).unwrap(), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_chained_selection_drops_empty_results() {
    let input = r#"[{"a": [1, 5]}, {"a": [0]}, {"a": [7]}]"#;
    assert_eq!(search("@[:].a[@ > 2]", input).unwrap(), "[[5], [7]]");
}

#[test]
fn test_selection_on_small_document() {
    let doc = r#"{"a": [1, 2, 3], "b": {"c": 4}}"#;
    let test_cases = vec![("@.a[1]", "2"), ("@..c", "4"), ("@.a[@ > 1]", "[2, 3]")];

    for (input, expected) in test_cases {
        assert_eq!(search(input, doc).unwrap(), expected, "Failed for input: {}", input);
    }
    assert!(matches!(
        eval_error("@.a + @.b", r#"{"a": [1, 2], "b": [1, 2, 3]}"#),
        EvalError::ShapeMismatch(_)
    ));
}

// ============================================================================
// Projections and map
// ============================================================================

#[test]
fn test_projections() {
    let test_cases = vec![
        ("@{a: @.baz, b: len(@.foo)}", "{\"a\": \"z\", \"b\": 3}"),
        ("@{@.baz, 1}", "[\"z\", 1]"),
        ("@.foo{@[0], @[-1]}", "[1, 3]"),
        ("@.foo->str(@)", "[\"1\", \"2\", \"3\"]"),
        ("@.bar.b->s_upper(@)", "[\"X\", \"Y\"]"),
        ("@.foo->(@ * 2)", "[2, 4, 6]"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(search(input, DOC).unwrap(), expected, "Failed for input: {}", input);
    }
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_vectorized_operators() {
    let test_cases = vec![
        ("@.foo * 2 + 1", "[3, 5, 7]"),
        ("@.foo / 2", "[0.5, 1.0, 1.5]"),
        ("@.foo // 2", "[0, 1, 1]"),
        ("@.foo == 2", "[false, true, false]"),
        ("@.foo[:2] + @.foo[1:]", "[3, 5]"),
        ("-@.foo", "[-1, -2, -3]"),
        ("not @.bar.a", "true"),
        ("@.bar.b[0] + @.baz", "\"xz\""),
        ("@.bar.b == `x`", "[true, false]"),
        ("2 ** @.foo", "[2.0, 4.0, 8.0]"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(search(input, DOC).unwrap(), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_object_operands_keep_keys() {
    let input = r#"{"a": 1, "b": 2}"#;
    assert_eq!(search("@ * 10", input).unwrap(), "{\"a\": 10, \"b\": 20}");
    assert_eq!(search("@ + @", input).unwrap(), "{\"a\": 2, \"b\": 4}");
}

#[test]
fn test_evaluation_errors() {
    assert!(matches!(
        eval_error("@.foo + j`[1, 2]`", DOC),
        EvalError::ShapeMismatch(_)
    ));
    assert!(matches!(
        eval_error("@.foo[@ > `a`]", DOC),
        EvalError::TypeMismatch(_)
    ));
    assert!(matches!(eval_error("@.baz[0]", DOC), EvalError::TypeMismatch(_)));
    assert!(matches!(eval_error("@.foo.a", DOC), EvalError::TypeMismatch(_)));
    assert!(matches!(eval_error("@.foo // 0", DOC), EvalError::DivisionByZero));
    assert!(matches!(
        eval_error("@.foo[j`[true, false]`]", DOC),
        EvalError::ShapeMismatch(_)
    ));
    assert!(matches!(eval_error("@ + j`{}`", "[1]"), EvalError::TypeMismatch(_)));
}

#[test]
fn test_runtime_argument_errors() {
    match search("s_len(@)", "[1]") {
        Err(QueryError::Argument(e)) => {
            assert_eq!(e.function, "s_len");
            assert_eq!(e.arg_index, 0);
        }
        other => panic!("Expected an argument error, got {:?}", other),
    }
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn test_functions() {
    let test_cases = vec![
        ("len(@.foo)", "3"),
        ("sum(@.foo)", "6.0"),
        ("keys(@)", "[\"foo\", \"bar\", \"baz\"]"),
        ("values(@.bar)", "[false, [\"x\", \"y\"]]"),
        ("s_len(@.bar.b)", "[1, 1]"),
        ("ifelse(@.foo > 1, `big`, `small`)", "[\"small\", \"big\", \"big\"]"),
        ("sorted(j`[3, 1, 2]`)", "[1, 2, 3]"),
        ("sorted(j`[3, 1, 2]`, true)", "[3, 2, 1]"),
        ("sorted(j`['b', 'a']`)", "[\"a\", \"b\"]"),
        ("unique(j`[2, 1, 2, 3, 1]`)", "[2, 1, 3]"),
        ("unique(j`[2, 1, 2, 3, 1]`, true)", "[1, 2, 3]"),
        ("value_counts(j`['a', 'b', 'a']`)", "[[\"a\", 2], [\"b\", 1]]"),
        ("range(5)", "[0, 1, 2, 3, 4]"),
        ("range(1, 10, 3)", "[1, 4, 7]"),
        ("range(3, 0, -1)", "[3, 2, 1]"),
        ("mean(j`[1, 2, 3, 4]`)", "2.5"),
        ("max(j`[1, 5, 3]`)", "5"),
        ("min(j`[2, -1]`)", "-1"),
        ("quantile(j`[1, 2, 3, 4, 5]`, 0.5)", "3.0"),
        ("quantile(j`[1, 2, 3, 4]`, 0.5)", "2.5"),
        ("flatten(j`[[1, [2]], 3]`)", "[1, [2], 3]"),
        ("flatten(j`[[1, [2]], 3]`, 2)", "[1, 2, 3]"),
        ("zip(j`[1, 2]`, j`['a', 'b']`)", "[[1, \"a\"], [2, \"b\"]]"),
        ("enumerate(j`['a', 'b']`)", "[[0, \"a\"], [1, \"b\"]]"),
        ("dict(j`[['a', 1], ['b', 2]]`)", "{\"a\": 1, \"b\": 2}"),
        ("items(j`{'a': 1}`)", "[[\"a\", 1]]"),
        ("concat(j`[1]`, j`[2, 3]`)", "[1, 2, 3]"),
        ("concat(j`{'a': 1}`, j`{'b': 2}`)", "{\"a\": 1, \"b\": 2}"),
        ("append(j`[1]`, 2, `x`)", "[1, 2, \"x\"]"),
        ("add_items(j`{}`, `a`, 1, `b`, 2)", "{\"a\": 1, \"b\": 2}"),
        ("in(2, j`[1, 2]`)", "true"),
        ("in(`a`, j`{'a': 1}`)", "true"),
        ("index(j`[1, 2, 1]`, 1)", "0"),
        ("index(j`[1, 2, 1]`, 1, true)", "2"),
        ("all(j`[true, false]`)", "false"),
        ("any(j`[true, false]`)", "true"),
        ("at(j`[1, 2, 3]`, -1)", "3"),
        ("at(j`[1, 2, 3]`, j`[0, 2]`)", "[1, 3]"),
        ("sort_by(j`[{'a': 2}, {'a': 1}]`, `a`)", "[{\"a\": 1}, {\"a\": 2}]"),
        ("max_by(j`[[1, 'x'], [3, 'y']]`, 0)", "[3, \"y\"]"),
        ("min_by(j`[[1, 'x'], [3, 'y']]`, 0)", "[1, \"x\"]"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(search(input, DOC).unwrap(), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_string_functions() {
    let test_cases = vec![
        ("s_split(`a,b,,c`, `,`)", "[\"a\", \"b\", \"\", \"c\"]"),
        ("s_split(`a1b22c`, g`\\d+`)", "[\"a\", \"b\", \"c\"]"),
        ("s_sub(`a.b.c`, `.`, `-`)", "\"a-b-c\""),
        ("s_sub(`abc123`, g`(\\d)`, `<$1>`)", "\"abc<1><2><3>\""),
        ("s_count(`banana`, `an`)", "2"),
        ("s_count(`banana`, g`a`)", "3"),
        ("s_find(`a1b22`, g`\\d+`)", "[\"1\", \"22\"]"),
        ("s_slice(`hello`, 1:3)", "\"el\""),
        ("s_slice(`hello`, -1)", "\"o\""),
        ("s_join(`, `, j`['a', 'b']`)", "\"a, b\""),
        ("s_upper(`abc`)", "\"ABC\""),
        ("s_lower(`AbC`)", "\"abc\""),
        ("s_strip(`  x `)", "\"x\""),
        ("s_mul(`ab`, 3)", "\"ababab\""),
        ("s_csv(`a,b\\n1,2\\n`, 2)", "[[\"a\", \"b\"], [\"1\", \"2\"]]"),
        ("str(j`[1, 'a']`)", "[\"1\", \"a\"]"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(search(input, "null").unwrap(), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_conversion_functions() {
    let test_cases = vec![
        ("int(`12`)", "12"),
        ("int(2.5)", "2"),
        ("float(`1.5`)", "1.5"),
        ("round(3.14159, 2)", "3.14"),
        ("round(2.5)", "2"),
        ("abs(-3)", "3"),
        ("log2(8)", "3.0"),
        ("is_num(j`[1, 'a', 2.5]`)", "[true, false, true]"),
        ("is_str(j`[1, 'a']`)", "[false, true]"),
        ("isnull(j`[null, 1]`)", "[true, false]"),
        ("not(j`[true, false]`)", "[false, true]"),
        ("parse(`[1, 2]`)", "{\"result\": [1, 2]}"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(search(input, "null").unwrap(), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_group_by_and_pivot() {
    let rows = r#"[{"k": "x", "v": 1}, {"k": "y", "v": 2}, {"k": "x", "v": 3}]"#;
    assert_eq!(
        search("group_by(@, `k`)", rows).unwrap(),
        "{\"x\": [{\"k\": \"x\", \"v\": 1}, {\"k\": \"x\", \"v\": 3}], \"y\": [{\"k\": \"y\", \"v\": 2}]}"
    );

    let long = r#"[
        {"id": 1, "k": "a", "v": 10}, {"id": 1, "k": "b", "v": 20},
        {"id": 2, "k": "a", "v": 30}, {"id": 2, "k": "b", "v": 40}
    ]"#;
    assert_eq!(
        search("pivot(@, `k`, `v`, `id`)", long).unwrap(),
        "{\"a\": [10, 30], \"b\": [20, 40], \"id\": [1, 2]}"
    );
}

#[test]
fn test_parse_reports_errors_as_values() {
    let out = search("parse(`[1,`)", "null").unwrap();
    assert!(out.starts_with("{\"error\": "), "got {}", out);
}

#[test]
fn test_seeded_random_is_reproducible() {
    let doc = parse_json("null").unwrap();
    let compiled = compile("@{rand(), randint(1000)}").unwrap();
    assert!(!compiled.is_const());
    let first = Evaluator::with_seed(42).run(&compiled, &doc).unwrap();
    let second = Evaluator::with_seed(42).run(&compiled, &doc).unwrap();
    assert_eq!(first, second);
}

// ============================================================================
// Integer edges
// ============================================================================

#[test]
fn test_floor_divide_overflow_becomes_float() {
    let doc = parse_json("-9223372036854775808").unwrap();
    let compiled = compile("@ // -1").unwrap();
    let out = Evaluator::new().run(&compiled, &doc).unwrap();
    assert!(matches!(out.value, Value::Float(f) if f == 9223372036854775808.0), "got {:?}", out);

    match compile("(-9223372036854775807 - 1) // -1").unwrap() {
        remespath::ast::CompiledQuery::Const(node) => {
            assert!(matches!(node.value, Value::Float(f) if f == 9223372036854775808.0), "got {:?}", node);
        }
        other => panic!("Expected a constant, got {:?}", other),
    }
}

#[test]
fn test_steps_stop_before_overflow() {
    let test_cases = vec![
        ("range(9223372036854775806, 9223372036854775807, 2)", "null", "[9223372036854775806]"),
        ("@[1::9223372036854775807]", "[1, 2, 3]", "[2]"),
    ];

    for (query, input, expected) in test_cases {
        assert_eq!(search(query, input).unwrap(), expected, "Failed for input: {}", query);
    }
}

#[test]
fn test_oversized_string_repetition_is_an_error() {
    for query in ["`ab` * 9223372036854775807", "s_mul(`ab`, 9223372036854775807)", "`ab` * 100000000"] {
        assert!(
            matches!(compile(query), Err(QueryError::Eval(EvalError::Custom(_)))),
            "Failed for input: {}",
            query
        );
    }
    assert!(matches!(
        eval_error("@ * 9223372036854775807", "\"ab\""),
        EvalError::Custom(_)
    ));
    assert_eq!(search("s_mul(@, 3)", "\"ab\"").unwrap(), "\"ababab\"");
}
