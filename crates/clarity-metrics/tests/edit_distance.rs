use clarity_metrics::{edit_distance, normalized_edit_distance};
use proptest::prelude::*;

#[test]
fn empty_strings_have_zero_drift() {
    assert_eq!(normalized_edit_distance("", ""), 0.0);
    assert_eq!(normalized_edit_distance("", "abc"), 1.0);
}

#[test]
fn mixed_scripts_count_characters_not_bytes() {
    assert_eq!(edit_distance("naïve café", "naive cafe"), 2);
    assert_eq!(edit_distance("日本語テキスト", "日本語のテキスト"), 1);
    assert_eq!(normalized_edit_distance("🙂🙂", "🙂🙃"), 0.5);
}

proptest! {
    #[test]
    fn distance_is_a_metric(a in "\\PC{0,12}", b in "\\PC{0,12}", c in "\\PC{0,12}") {
        prop_assert_eq!(edit_distance(&a, &a), 0);
        prop_assert_eq!(edit_distance(&a, &b), edit_distance(&b, &a));
        prop_assert!(edit_distance(&a, &c) <= edit_distance(&a, &b) + edit_distance(&b, &c));
    }

    #[test]
    fn normalized_distance_is_bounded(a in "\\PC{0,16}", b in "\\PC{0,16}") {
        let d = normalized_edit_distance(&a, &b);
        prop_assert!((0.0..=1.0).contains(&d));
        let longest = a.chars().count().max(b.chars().count());
        prop_assert!(edit_distance(&a, &b) <= longest);
    }
}
