// tests/output_tests.rs

use proptest::prelude::*;
use remespath::json_parser::parse_json;
use remespath::output::{
    KeyStyle, PrettyStyle, display_string, float_to_string, path_to_position, pretty_render, render, to_json,
    to_json_pretty,
};
use remespath::value::Node;

// ============================================================================
// Scalars
// ============================================================================

#[test]
fn test_float_to_string() {
    let test_cases = vec![
        (1.0, "1.0"),
        (-0.5, "-0.5"),
        (1e300, "1e300"),
        (1e-7, "1e-7"),
        (f64::NAN, "NaN"),
        (f64::INFINITY, "Infinity"),
        (f64::NEG_INFINITY, "-Infinity"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(float_to_string(input), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_string_escaping() {
    let test_cases = vec![
        ("plain", "\"plain\""),
        ("a\"b", "\"a\\\"b\""),
        ("back\\slash", "\"back\\\\slash\""),
        ("line\nbreak\ttab", "\"line\\nbreak\\ttab\""),
        ("\u{1}", "\"\\u0001\""),
        ("caf\u{e9}", "\"caf\u{e9}\""),
    ];

    for (input, expected) in test_cases {
        assert_eq!(to_json(&Node::from(input)), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_display_string() {
    assert_eq!(display_string(&Node::from("bare")), "bare");
    assert_eq!(display_string(&Node::from(2)), "2");
    assert_eq!(
        display_string(&Node::array(vec![Node::from("a"), Node::null()])),
        "[\"a\", null]"
    );
}

// ============================================================================
// Compact
// ============================================================================

#[test]
fn test_render_separators() {
    let node = parse_json("{\"a\": [1, 2], \"b\": {}}").unwrap();
    assert_eq!(render(&node, false, ":", ","), "{\"a\":[1,2],\"b\":{}}");
    assert_eq!(render(&node, false, ": ", ", "), "{\"a\": [1, 2], \"b\": {}}");
}

#[test]
fn test_sort_keys_case_insensitive() {
    let node = parse_json("{\"b\": 1, \"a\": 3, \"A\": 2, \"C\": 4}").unwrap();
    assert_eq!(render(&node, true, ":", ","), "{\"A\":2,\"a\":3,\"b\":1,\"C\":4}");
    // unsorted keeps insertion order
    assert_eq!(to_json(&node), "{\"b\": 1, \"a\": 3, \"A\": 2, \"C\": 4}");
}

// ============================================================================
// Pretty
// ============================================================================

#[test]
fn test_pretty_google() {
    let node = parse_json("{\"a\": [1, {\"b\": null}], \"c\": [], \"d\": {}}").unwrap();
    let expected = "{\n  \"a\": [\n    1,\n    {\n      \"b\": null\n    }\n  ],\n  \"c\": [],\n  \"d\": {}\n}";
    assert_eq!(pretty_render(&node, 2, false, PrettyStyle::Google), expected);
}

#[test]
fn test_pretty_whitesmith() {
    let node = parse_json("{\"a\": [1, 2]}").unwrap();
    let expected = "{\n\"a\":\n  [\n  1,\n  2\n  ]\n}";
    assert_eq!(pretty_render(&node, 2, false, PrettyStyle::Whitesmith), expected);
}

#[test]
fn test_pretty_pprint_keeps_short_containers_compact() {
    let node = parse_json("[[1, 2], {\"a\": 3}]").unwrap();
    assert_eq!(
        pretty_render(&node, 4, false, PrettyStyle::PPrint),
        "[\n    [1, 2],\n    {\"a\": 3}\n]"
    );
}

#[test]
fn test_pretty_pprint_expands_long_containers() {
    let long = format!("[{}]", (0..12).map(|i| i.to_string()).collect::<Vec<_>>().join(", "));
    let node = parse_json(&format!("{{\"a\": {}}}", long)).unwrap();
    let out = pretty_render(&node, 1, false, PrettyStyle::PPrint);
    assert!(out.starts_with("{\n \"a\": [\n  0,\n  1,"), "got {}", out);
    assert!(out.ends_with("  11\n ]\n}"), "got {}", out);
}

#[test]
fn test_to_json_pretty_uses_four_spaces() {
    let node = parse_json("[1]").unwrap();
    assert_eq!(to_json_pretty(&node), "[\n    1\n]");
    assert_eq!(to_json_pretty(&Node::from(1)), "1");
}

// ============================================================================
// Paths
// ============================================================================

#[test]
fn test_path_to_position() {
    let node = parse_json("{\"a\": [1, {\"b c\": 2}]}").unwrap();
    let test_cases = vec![
        (KeyStyle::RemesPath, "@.a[1][`b c`]"),
        (KeyStyle::JavaScript, ".a[1][\"b c\"]"),
        (KeyStyle::Python, "[\"a\"][1][\"b c\"]"),
    ];

    for (style, expected) in test_cases {
        assert_eq!(path_to_position(&node, 18, style), expected);
    }
    assert_eq!(path_to_position(&node, 7, KeyStyle::RemesPath), "@.a[0]");
    assert_eq!(path_to_position(&node, 0, KeyStyle::RemesPath), "@");
}

// ============================================================================
// Properties
// ============================================================================

fn arb_json() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        Just("null".to_string()),
        any::<bool>().prop_map(|b| b.to_string()),
        any::<i32>().prop_map(|n| n.to_string()),
        (-1000.0f64..1000.0).prop_map(|f| format!("{:?}", f)),
        "[a-z ]{0,8}".prop_map(|s| format!("\"{}\"", s)),
    ];
    leaf.prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(|items| format!("[{}]", items.join(","))),
            // duplicate keys would be linted, so keys come from a map
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..6).prop_map(|pairs| {
                let body: Vec<String> = pairs.into_iter().map(|(k, v)| format!("\"{}\":{}", k, v)).collect();
                format!("{{{}}}", body.join(","))
            }),
        ]
    })
}

proptest! {
    #[test]
    fn prop_compact_output_parses_back(text in arb_json()) {
        let node = parse_json(&text).unwrap();
        let again = parse_json(&to_json(&node)).unwrap();
        prop_assert_eq!(&node, &again);
    }

    #[test]
    fn prop_pretty_styles_parse_back(text in arb_json()) {
        let node = parse_json(&text).unwrap();
        for style in [PrettyStyle::Google, PrettyStyle::Whitesmith, PrettyStyle::PPrint] {
            let again = parse_json(&pretty_render(&node, 2, false, style)).unwrap();
            prop_assert_eq!(&node, &again);
        }
    }
}
