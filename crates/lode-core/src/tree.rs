//! Attribute trees: the serializable state of one entity at a point in time.
//!
//! An [`AttributeTree`] is an ordered map of named [`Tag`] values. Compound
//! tags nest further trees, so an entity snapshot is a tree of arbitrary
//! depth. Trees render to an SNBT-like text form via `Display`; the UTF-8
//! length of that text is what diagnostics report as "serialized size".

use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

/// A single attribute value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Tag {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    ByteArray(Vec<i8>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
    /// Ordered list of values.
    List(Vec<Tag>),
    /// Nested named values.
    Compound(AttributeTree),
}

/// Discriminant of a [`Tag`], without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagKind {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    ByteArray,
    IntArray,
    LongArray,
    List,
    Compound,
}

impl Tag {
    pub fn kind(&self) -> TagKind {
        match self {
            Tag::Byte(_) => TagKind::Byte,
            Tag::Short(_) => TagKind::Short,
            Tag::Int(_) => TagKind::Int,
            Tag::Long(_) => TagKind::Long,
            Tag::Float(_) => TagKind::Float,
            Tag::Double(_) => TagKind::Double,
            Tag::String(_) => TagKind::String,
            Tag::ByteArray(_) => TagKind::ByteArray,
            Tag::IntArray(_) => TagKind::IntArray,
            Tag::LongArray(_) => TagKind::LongArray,
            Tag::List(_) => TagKind::List,
            Tag::Compound(_) => TagKind::Compound,
        }
    }

    /// Byte-identical comparison.
    ///
    /// Unlike `==`, floating point values compare by bit pattern, so a
    /// `NaN` equals an identical `NaN` and `0.0` differs from `-0.0`.
    pub fn same_value(&self, other: &Tag) -> bool {
        match (self, other) {
            (Tag::Float(a), Tag::Float(b)) => a.to_bits() == b.to_bits(),
            (Tag::Double(a), Tag::Double(b)) => a.to_bits() == b.to_bits(),
            (Tag::List(a), Tag::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_value(y))
            }
            (Tag::Compound(a), Tag::Compound(b)) => a.same_value(b),
            _ => self == other,
        }
    }

    pub fn as_compound(&self) -> Option<&AttributeTree> {
        match self {
            Tag::Compound(tree) => Some(tree),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Tag]> {
        match self {
            Tag::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<AttributeTree> for Tag {
    fn from(tree: AttributeTree) -> Self {
        Tag::Compound(tree)
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        Tag::String(s.to_string())
    }
}

/// Ordered, nested attribute map.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeTree {
    entries: BTreeMap<String, Tag>,
}

impl AttributeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous value under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Tag>) -> Option<Tag> {
        self.entries.insert(key.into(), value.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Tag>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Tag> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Tag> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Tag> {
        self.entries.iter()
    }

    /// Byte-identical comparison of two trees (see [`Tag::same_value`]).
    pub fn same_value(&self, other: &AttributeTree) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|((ka, va), (kb, vb))| ka == kb && va.same_value(vb))
    }

    /// UTF-8 byte length of the rendered tree.
    pub fn serialized_len(&self) -> usize {
        self.to_string().len()
    }
}

impl<K: Into<String>> FromIterator<(K, Tag)> for AttributeTree {
    fn from_iter<I: IntoIterator<Item = (K, Tag)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a AttributeTree {
    type Item = (&'a String, &'a Tag);
    type IntoIter = btree_map::Iter<'a, String, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for AttributeTree {
    type Item = (String, Tag);
    type IntoIter = btree_map::IntoIter<String, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// SNBT-style rendering

fn write_string(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "\"")
}

fn is_bare_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '+'))
}

fn write_array<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    prefix: char,
    suffix: &str,
    items: &[T],
) -> fmt::Result {
    write!(f, "[{};", prefix)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{}{}", item, suffix)?;
    }
    write!(f, "]")
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Byte(v) => write!(f, "{}b", v),
            Tag::Short(v) => write!(f, "{}s", v),
            Tag::Int(v) => write!(f, "{}", v),
            Tag::Long(v) => write!(f, "{}L", v),
            Tag::Float(v) => write!(f, "{:?}f", v),
            Tag::Double(v) => write!(f, "{:?}d", v),
            Tag::String(s) => write_string(f, s),
            Tag::ByteArray(items) => write_array(f, 'B', "b", items),
            Tag::IntArray(items) => write_array(f, 'I', "", items),
            Tag::LongArray(items) => write_array(f, 'L', "L", items),
            Tag::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Tag::Compound(tree) => write!(f, "{}", tree),
        }
    }
}

impl fmt::Display for AttributeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            if is_bare_key(key) {
                write!(f, "{}", key)?;
            } else {
                write_string(f, key)?;
            }
            write!(f, ":{}", value)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut tree = AttributeTree::new();
        assert!(tree.is_empty());

        assert!(tree.insert("Age", Tag::Int(3)).is_none());
        assert_eq!(tree.insert("Age", Tag::Int(4)), Some(Tag::Int(3)));
        assert_eq!(tree.get("Age"), Some(&Tag::Int(4)));
        assert_eq!(tree.len(), 1);

        assert_eq!(tree.remove("Age"), Some(Tag::Int(4)));
        assert!(!tree.contains_key("Age"));
    }

    #[test]
    fn test_keys_are_ordered() {
        let tree = AttributeTree::new()
            .with("b", Tag::Byte(1))
            .with("a", Tag::Byte(2))
            .with("c", Tag::Byte(3));

        let keys: Vec<_> = tree.keys().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_same_value_float_bits() {
        assert!(Tag::Float(f32::NAN).same_value(&Tag::Float(f32::NAN)));
        assert!(!Tag::Double(0.0).same_value(&Tag::Double(-0.0)));
        assert!(Tag::Double(1.5).same_value(&Tag::Double(1.5)));
        assert!(!Tag::Int(1).same_value(&Tag::Long(1)));
    }

    #[test]
    fn test_same_value_nested() {
        let a = AttributeTree::new().with(
            "Pos",
            Tag::List(vec![Tag::Double(1.0), Tag::Double(f64::NAN)]),
        );
        let b = a.clone();
        assert!(a.same_value(&b));

        let c = AttributeTree::new().with("Pos", Tag::List(vec![Tag::Double(1.0)]));
        assert!(!a.same_value(&c));
    }

    #[test]
    fn test_display_snbt() {
        let inner = AttributeTree::new().with("id", "minecraft:stone");
        let tree = AttributeTree::new()
            .with("Health", Tag::Float(20.0))
            .with("Age", Tag::Short(-1))
            .with("Item", inner)
            .with("Tags", Tag::List(vec!["a".into(), "b\"c".into()]))
            .with("UUID", Tag::IntArray(vec![1, 2]))
            .with("odd key", Tag::Long(7));

        assert_eq!(
            tree.to_string(),
            r#"{Age:-1s,Health:20.0f,Item:{id:"minecraft:stone"},Tags:["a","b\"c"],UUID:[I;1,2],"odd key":7L}"#
        );
    }

    #[test]
    fn test_serialized_len_counts_utf8_bytes() {
        let tree = AttributeTree::new().with("n", "é");
        // {n:"é"} with a two-byte character
        assert_eq!(tree.serialized_len(), 8);
    }

    #[test]
    fn test_serde_roundtrip() {
        let tree = AttributeTree::new()
            .with("Age", Tag::Int(5))
            .with("Inner", AttributeTree::new().with("x", Tag::Byte(1)));

        let json = serde_json::to_string(&tree).unwrap();
        let back: AttributeTree = serde_json::from_str(&json).unwrap();
        assert_eq!(tree, back);
    }
}
