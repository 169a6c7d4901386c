// tests/slice_tests.rs

use proptest::prelude::*;
use remespath::slice::{Slice, SliceError, wrap_index};

// ============================================================================
// Python semantics
// ============================================================================

#[test]
fn test_indices() {
    let test_cases: Vec<(Option<i64>, Option<i64>, Option<i64>, Vec<usize>)> = vec![
        (Some(1), Some(4), None, vec![1, 2, 3]),
        (None, None, Some(-1), vec![5, 4, 3, 2, 1, 0]),
        (Some(-2), None, None, vec![4, 5]),
        (None, Some(-2), None, vec![0, 1, 2, 3]),
        (Some(10), None, None, vec![]),
        (Some(-10), Some(2), None, vec![0, 1]),
        (Some(4), Some(1), Some(-1), vec![4, 3, 2]),
        (None, None, Some(2), vec![0, 2, 4]),
        (Some(5), None, Some(-2), vec![5, 3, 1]),
        (Some(-1), Some(-10), Some(-1), vec![5, 4, 3, 2, 1, 0]),
        (Some(3), Some(3), None, vec![]),
    ];

    for (start, stop, step, expected) in test_cases {
        let slice = Slice::new(start, stop, step);
        assert_eq!(slice.indices(6).unwrap(), expected, "Failed for slice: {}", slice);
    }
}

#[test]
fn test_zero_step() {
    let slice = Slice::new(None, None, Some(0));
    assert_eq!(slice.indices(3), Err(SliceError::ZeroStep));
    assert_eq!(SliceError::ZeroStep.to_string(), "slice step cannot be zero");
}

#[test]
fn test_huge_steps_stop_at_the_end() {
    let test_cases = vec![
        (Slice::new(Some(1), None, Some(i64::MAX)), 3, vec![1]),
        (Slice::new(Some(i64::MAX - 1), None, Some(i64::MAX)), 3, vec![]),
        (Slice::new(None, None, Some(i64::MIN)), 3, vec![2]),
        (Slice::new(Some(i64::MIN), Some(i64::MAX), Some(2)), 4, vec![0, 2]),
    ];

    for (slice, len, expected) in test_cases {
        assert_eq!(slice.indices(len).unwrap(), expected, "Failed for input: {}", slice);
    }
}

#[test]
fn test_slice_str_counts_chars() {
    let slice = Slice::new(Some(1), Some(3), None);
    assert_eq!(slice.slice_str("h\u{e9}llo").unwrap(), "\u{e9}l");
    assert_eq!(Slice::new(None, None, Some(-1)).slice_str("abc").unwrap(), "cba");
}

#[test]
fn test_display() {
    let test_cases = vec![
        (Slice::new(Some(1), None, None), "1:"),
        (Slice::new(None, Some(-1), None), ":-1"),
        (Slice::new(None, None, Some(-1)), "::-1"),
        (Slice::new(Some(1), Some(5), Some(2)), "1:5:2"),
    ];

    for (slice, expected) in test_cases {
        assert_eq!(slice.to_string(), expected);
    }
}

#[test]
fn test_wrap_index() {
    assert_eq!(wrap_index(0, 3), Some(0));
    assert_eq!(wrap_index(-1, 3), Some(2));
    assert_eq!(wrap_index(3, 3), None);
    assert_eq!(wrap_index(-4, 3), None);
    assert_eq!(wrap_index(0, 0), None);
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_indices_in_bounds(
        len in 0usize..40,
        start in proptest::option::of(-50i64..50),
        stop in proptest::option::of(-50i64..50),
        step in prop_oneof![(-5i64..=-1), (1i64..=5)],
    ) {
        let indices = Slice::new(start, stop, Some(step)).indices(len).unwrap();
        prop_assert!(indices.iter().all(|&i| i < len));
        let ordered = indices.windows(2).all(|w| if step > 0 { w[0] < w[1] } else { w[0] > w[1] });
        prop_assert!(ordered);
    }

    #[test]
    fn prop_full_reverse_is_reverse(len in 0usize..40) {
        let forward = Slice::default().indices(len).unwrap();
        let mut backward = Slice::new(None, None, Some(-1)).indices(len).unwrap();
        backward.reverse();
        prop_assert_eq!(forward, backward);
    }
}
