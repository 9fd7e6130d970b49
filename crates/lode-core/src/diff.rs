//! State differencing against a per-type baseline.
//!
//! A live entity snapshot usually repeats most of the default state of a
//! freshly created entity of the same type. [`extract_difference`] drops
//! every value that is byte-identical to the baseline, and
//! [`RejectKeySet::strip`] removes volatile top-level keys that carry no
//! audit value. [`compact`] applies both.

use crate::tree::{AttributeTree, Tag};
use std::collections::BTreeSet;

/// Top-level keys too volatile to be meaningful in an audit record.
pub const DEFAULT_REJECT_KEYS: &[&str] = &[
    "DeathTime",
    "Fire",
    "Health",
    "HurtByTimestamp",
    "HurtTime",
    "Motion",
    "OnGround",
    "WorldUUIDLeast",
    "WorldUUIDMost",
];

/// Set of top-level attribute names stripped after diffing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectKeySet {
    keys: BTreeSet<String>,
}

impl RejectKeySet {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// An empty set (nothing is stripped).
    pub fn empty() -> Self {
        Self {
            keys: BTreeSet::new(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Remove every rejected key from the top level of `tree`.
    pub fn strip(&self, tree: &mut AttributeTree) {
        for key in &self.keys {
            tree.remove(key);
        }
    }
}

impl Default for RejectKeySet {
    fn default() -> Self {
        Self::new(DEFAULT_REJECT_KEYS.iter().copied())
    }
}

/// Compute the part of `live` that differs from `baseline`.
///
/// - Keys missing from the baseline are always kept.
/// - Byte-identical values (see [`Tag::same_value`]) are dropped.
/// - Compounds present on both sides recurse and are kept only when the
///   nested difference is non-empty.
/// - Lists of compounds with the same length as the baseline list recurse
///   element-wise. Unchanged elements become empty compounds so positions
///   survive; the list is dropped if every element is unchanged.
/// - Anything else that differs is kept whole.
pub fn extract_difference(live: &AttributeTree, baseline: &AttributeTree) -> AttributeTree {
    let mut result = AttributeTree::new();

    for (key, value) in live {
        let Some(default) = baseline.get(key) else {
            result.insert(key.clone(), value.clone());
            continue;
        };

        if let Some(diff) = diff_tag(value, default) {
            result.insert(key.clone(), diff);
        }
    }

    result
}

/// Difference of a single value, or `None` when nothing changed.
fn diff_tag(live: &Tag, default: &Tag) -> Option<Tag> {
    match (live, default) {
        (Tag::Compound(a), Tag::Compound(b)) => {
            let nested = extract_difference(a, b);
            (!nested.is_empty()).then_some(Tag::Compound(nested))
        }
        (Tag::List(a), Tag::List(b)) if a.len() == b.len() && is_compound_list(a, b) => {
            let mut changed = false;
            let items: Vec<Tag> = a
                .iter()
                .zip(b)
                .map(|(x, y)| match diff_tag(x, y) {
                    Some(diff) => {
                        changed = true;
                        diff
                    }
                    None => Tag::Compound(AttributeTree::new()),
                })
                .collect();
            changed.then_some(Tag::List(items))
        }
        _ if live.same_value(default) => None,
        _ => Some(live.clone()),
    }
}

fn is_compound_list(a: &[Tag], b: &[Tag]) -> bool {
    !a.is_empty()
        && a.iter()
            .chain(b)
            .all(|tag| matches!(tag, Tag::Compound(_)))
}

/// Baseline difference followed by reject-key stripping.
pub fn compact(
    live: &AttributeTree,
    baseline: &AttributeTree,
    rejects: &RejectKeySet,
) -> AttributeTree {
    let mut filtered = extract_difference(live, baseline);
    rejects.strip(&mut filtered);
    filtered
}
