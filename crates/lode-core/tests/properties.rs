//! Property-based tests for the state differencer
//!
//! These tests verify the compaction guarantees audit storage relies on:
//!  - Rejected keys never survive compaction
//!  - Identical state compacts to nothing
//!  - Disjoint state passes through untouched (minus rejected keys)
//!  - Every surviving value differs from the baseline

use lode_core::{compact, extract_difference, AttributeTree, RejectKeySet, Tag, DEFAULT_REJECT_KEYS};
use proptest::prelude::*;

/// Generate strategies for prop-testing

fn scalar_strategy() -> impl Strategy<Value = Tag> {
    prop_oneof![
        any::<i8>().prop_map(Tag::Byte),
        any::<i16>().prop_map(Tag::Short),
        any::<i32>().prop_map(Tag::Int),
        any::<i64>().prop_map(Tag::Long),
        any::<f32>().prop_map(Tag::Float),
        any::<f64>().prop_map(Tag::Double),
        "[a-z]{0,6}".prop_map(Tag::String),
        prop::collection::vec(any::<i32>(), 0..4).prop_map(Tag::IntArray),
    ]
}

fn tag_strategy() -> impl Strategy<Value = Tag> {
    scalar_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Tag::List),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|entries| Tag::Compound(entries.into_iter().collect())),
        ]
    })
}

/// Keys mix short lowercase names with the default reject keys so that
/// stripping is actually exercised.
fn key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,4}",
        prop::sample::select(DEFAULT_REJECT_KEYS).prop_map(str::to_string),
    ]
}

fn tree_strategy() -> impl Strategy<Value = AttributeTree> {
    prop::collection::btree_map(key_strategy(), tag_strategy(), 0..8)
        .prop_map(|entries| entries.into_iter().collect())
}

// ============================================================================
// Compaction Property Tests
// ============================================================================

proptest! {
    #[test]
    fn compact_never_contains_reject_keys(
        live in tree_strategy(),
        baseline in tree_strategy()
    ) {
        let rejects = RejectKeySet::default();
        let compacted = compact(&live, &baseline, &rejects);
        for key in compacted.keys() {
            prop_assert!(!rejects.contains(key), "reject key {} survived", key);
        }
    }

    #[test]
    fn compact_of_identical_state_is_empty(baseline in tree_strategy()) {
        let compacted = compact(&baseline, &baseline, &RejectKeySet::default());
        prop_assert!(compacted.is_empty());
    }

    #[test]
    fn compact_of_disjoint_state_is_live_minus_rejects(
        live in tree_strategy(),
        baseline in tree_strategy()
    ) {
        // Rename baseline keys so the two trees share nothing
        let baseline: AttributeTree = baseline
            .into_iter()
            .map(|(k, v)| (format!("base_{}", k), v))
            .collect();

        let rejects = RejectKeySet::default();
        let compacted = compact(&live, &baseline, &rejects);

        let mut expected = live.clone();
        rejects.strip(&mut expected);
        prop_assert!(compacted.same_value(&expected));
    }

    #[test]
    fn surviving_values_differ_from_baseline(
        live in tree_strategy(),
        baseline in tree_strategy()
    ) {
        let diff = extract_difference(&live, &baseline);
        for (key, value) in &diff {
            if let Some(default) = baseline.get(key) {
                prop_assert!(!value.same_value(default) || matches!(value, Tag::List(_)));
            }
            prop_assert!(live.contains_key(key));
        }
    }

    #[test]
    fn diffing_never_grows_the_tree(
        live in tree_strategy(),
        baseline in tree_strategy()
    ) {
        let diff = extract_difference(&live, &baseline);
        prop_assert!(diff.len() <= live.len());
    }
}
