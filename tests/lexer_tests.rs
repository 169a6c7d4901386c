// tests/lexer_tests.rs

use remespath::ast::{BinOp, Token};
use remespath::lexer::{Lexer, tokenize};
use remespath::value::{Node, Value};

fn tokens(query: &str) -> Vec<Token> {
    tokenize(query).unwrap().into_iter().map(|(tok, _)| tok).collect()
}

fn lit(value: impl Into<Node>) -> Token {
    Token::Literal(value.into())
}

fn ident(name: &str) -> Token {
    Token::Ident(name.to_string())
}

// ============================================================================
// Single Tokens
// ============================================================================

#[test]
fn test_delimiters() {
    let test_cases = vec![
        ("@", Token::At),
        ("=", Token::Assign),
        ("!", Token::Bang),
        ("->", Token::Arrow),
        (".", Token::Dot),
        (",", Token::Comma),
        (":", Token::Colon),
        (";", Token::Semicolon),
    ];

    for (input, expected) in test_cases {
        assert_eq!(tokens(input), vec![expected, Token::Eof], "Failed for input: {}", input);
    }
}

#[test]
fn test_binary_operators() {
    let test_cases = vec![
        ("**", BinOp::Power),
        ("//", BinOp::FloorDivide),
        ("==", BinOp::Equal),
        ("!=", BinOp::NotEqual),
        ("=~", BinOp::Match),
        ("<=", BinOp::LessEqual),
        (">=", BinOp::GreaterEqual),
        ("<", BinOp::LessThan),
        (">", BinOp::GreaterThan),
        ("&", BinOp::BitAnd),
        ("|", BinOp::BitOr),
        ("^", BinOp::BitXor),
        ("+", BinOp::Add),
        ("-", BinOp::Subtract),
        ("*", BinOp::Multiply),
        ("/", BinOp::Divide),
        ("%", BinOp::Modulo),
    ];

    for (input, expected) in test_cases {
        assert_eq!(
            tokens(input),
            vec![Token::BinOp(expected), Token::Eof],
            "Failed for input: {}",
            input
        );
    }
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_numbers() {
    let test_cases = vec![
        ("42", lit(42)),
        ("0x1f", lit(31)),
        ("3.25", lit(3.25)),
        (".5", lit(0.5)),
        ("1e3", lit(1000.0)),
        ("2.5E-1", lit(0.25)),
        ("99999999999999999999", lit(1e20)),
    ];

    for (input, expected) in test_cases {
        assert_eq!(tokens(input), vec![expected, Token::Eof], "Failed for input: {}", input);
    }
}

#[test]
fn test_named_constants() {
    assert_eq!(
        tokens("null true false Infinity"),
        vec![
            lit(Node::null()),
            lit(true),
            lit(false),
            lit(f64::INFINITY),
            Token::Eof
        ]
    );
    let toks = tokens("NaN");
    assert!(matches!(&toks[0], Token::Literal(n) if matches!(n.value, Value::Float(f) if f.is_nan())));
}

#[test]
fn test_backtick_strings() {
    let test_cases = vec![
        ("`hello`", "hello"),
        ("`a b c`", "a b c"),
        ("`tick\\`tock`", "tick`tock"),
        ("`back\\\\slash`", "back\\slash"),
        ("`line\\nbreak`", "line\nbreak"),
        ("`\\d+`", "\\d+"),
        ("``", ""),
    ];

    for (input, expected) in test_cases {
        assert_eq!(tokens(input), vec![lit(expected), Token::Eof], "Failed for input: {}", input);
    }
}

#[test]
fn test_regex_literal() {
    let toks = tokens("g`^a+\\d$`");
    match &toks[0] {
        Token::Literal(Node {
            value: Value::Regex(re), ..
        }) => {
            assert_eq!(re.as_str(), "^a+\\d$");
            assert!(re.is_match("aa7"));
        }
        other => panic!("Expected regex literal, got {:?}", other),
    }
}

#[test]
fn test_json_literal() {
    let toks = tokens("j`{\"a\": [1, 2.5, 'x']}`");
    let expected = Node::object_from([(
        "a",
        Node::array(vec![Node::from(1), Node::from(2.5), Node::from("x")]),
    )]);
    assert_eq!(toks, vec![Token::Literal(expected), Token::Eof]);
}

#[test]
fn test_g_and_j_are_identifiers_without_backtick() {
    assert_eq!(tokens("g j"), vec![ident("g"), ident("j"), Token::Eof]);
}

// ============================================================================
// Disambiguation
// ============================================================================

#[test]
fn test_dot_after_operand_is_accessor() {
    assert_eq!(
        tokens("@.5"),
        vec![Token::At, Token::Dot, lit(5), Token::Eof]
    );
    assert_eq!(
        tokens("@[0].a"),
        vec![
            Token::At,
            Token::LBracket,
            lit(0),
            Token::RBracket,
            Token::Dot,
            ident("a"),
            Token::Eof
        ]
    );
    assert_eq!(
        tokens("1 + .5"),
        vec![lit(1), Token::BinOp(BinOp::Add), lit(0.5), Token::Eof]
    );
}

#[test]
fn test_minus_is_never_part_of_a_number() {
    assert_eq!(
        tokens("-2"),
        vec![Token::BinOp(BinOp::Subtract), lit(2), Token::Eof]
    );
}

#[test]
fn test_identifiers() {
    assert_eq!(
        tokens("foo _bar $ref a1 caf\u{e9}"),
        vec![
            ident("foo"),
            ident("_bar"),
            ident("$ref"),
            ident("a1"),
            ident("caf\u{e9}"),
            Token::Eof
        ]
    );
}

#[test]
fn test_full_query() {
    assert_eq!(
        tokens("@.items[@.price >= 10]->str(@)"),
        vec![
            Token::At,
            Token::Dot,
            ident("items"),
            Token::LBracket,
            Token::At,
            Token::Dot,
            ident("price"),
            Token::BinOp(BinOp::GreaterEqual),
            lit(10),
            Token::RBracket,
            Token::Arrow,
            ident("str"),
            Token::LParen,
            Token::At,
            Token::RParen,
            Token::Eof,
        ]
    );
}

#[test]
fn test_positions_are_char_offsets() {
    let toks = Lexer::new("`\u{e9}\u{e9}` + x").tokenize().unwrap();
    let positions: Vec<usize> = toks.iter().map(|(_, p)| *p).collect();
    assert_eq!(positions, vec![0, 5, 7, 8]);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_lex_errors() {
    let test_cases = vec![
        ("@.a`b", 3, "Unterminated string literal"),
        ("@ # 1", 2, "Invalid token '#'"),
        ("1.2.3", 3, "Number with two decimal points"),
        ("g`(`", 0, "Invalid regex"),
        ("j`[1, tru]`", 0, "Invalid JSON literal"),
        ("@[1", 1, "Unclosed '['"),
        ("@.a)", 3, "Unmatched ')'"),
        ("(@[0)]", 4, "Unmatched ')'"),
    ];

    for (input, position, message) in test_cases {
        let err = tokenize(input).unwrap_err();
        assert_eq!(err.position, position, "Failed for input: {}", input);
        assert!(
            err.message.starts_with(message),
            "Failed for input: {}: got {}",
            input,
            err.message
        );
    }
}

#[test]
fn test_error_display_has_caret() {
    let err = tokenize("@.a`b").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Syntax error at position 3: Unterminated string literal\n@.a`b\n   ^"
    );
}

#[test]
fn test_bracket_depth_limit() {
    let ok = format!("{}1{}", "(".repeat(512), ")".repeat(512));
    assert!(tokenize(&ok).is_ok());

    let too_deep = format!("{}1{}", "(".repeat(513), ")".repeat(513));
    let err = tokenize(&too_deep).unwrap_err();
    assert_eq!(err.position, 512);
    assert_eq!(err.message, "Maximum recursion depth (512) reached");
}
