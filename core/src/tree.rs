//! Generic deep merge over structured documents.
//!
//! A [`Tree`] is any scalar/sequence/mapping document. Merging is the
//! workhorse behind sample-shape reduction: an ordered list of overlapping
//! samples folds left-to-right into one representative shape. The same
//! algorithm combines customization patch values with node trees.
//!
//! The rules are deliberately asymmetric:
//!
//! - mapping ← mapping merges recursively per key; non-mapping incoming
//!   values replace the base value outright.
//! - sequence ← sequence merges index-aligned; new trailing indices append,
//!   gaps pad with empty scalars.
//! - scalars never merge — they are only replaced wholesale by the mapping
//!   rule.

use serde_yaml::{Mapping, Value};

/// A structured document: scalar, ordered sequence, or mapping.
pub type Tree = Value;

/// Coarse shape of a [`Tree`], used by patch path resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeShape {
    Scalar,
    Sequence,
    Mapping,
}

/// Returns the coarse shape of a document.
pub fn shape_of(tree: &Tree) -> TreeShape {
    match tree {
        Value::Sequence(_) => TreeShape::Sequence,
        Value::Mapping(_) => TreeShape::Mapping,
        _ => TreeShape::Scalar,
    }
}

/// An empty document of the given shape.
///
/// The empty scalar is null, which is what an empty YAML scalar resolves to.
pub fn empty_of(shape: TreeShape) -> Tree {
    match shape {
        TreeShape::Scalar => Value::Null,
        TreeShape::Sequence => Value::Sequence(Vec::new()),
        TreeShape::Mapping => Value::Mapping(Mapping::new()),
    }
}

/// Deep-merges `incoming` into `base` in place.
///
/// # Examples
///
/// ```
/// use serde_yaml::Value;
/// use specmash_core::merge;
///
/// let mut base: Value = serde_yaml::from_str("{a: {x: 1}, b: 2}").unwrap();
/// let incoming: Value = serde_yaml::from_str("{a: {y: 3}, b: 4}").unwrap();
/// merge(&mut base, &incoming);
///
/// let expected: Value = serde_yaml::from_str("{a: {x: 1, y: 3}, b: 4}").unwrap();
/// assert_eq!(base, expected);
/// ```
pub fn merge(base: &mut Tree, incoming: &Tree) {
    match incoming {
        Value::Mapping(incoming_map) => {
            if let Value::Mapping(base_map) = base {
                merge_mappings(base_map, incoming_map);
            }
        }
        Value::Sequence(incoming_seq) => {
            if let Value::Sequence(base_seq) = base {
                merge_sequences(base_seq, incoming_seq);
            }
        }
        // scalars never merge
        _ => {}
    }
}

/// Returns the merge of two documents, leaving both inputs untouched.
pub fn merged(base: &Tree, incoming: &Tree) -> Tree {
    let mut out = base.clone();
    merge(&mut out, incoming);
    out
}

fn merge_mappings(base: &mut Mapping, incoming: &Mapping) {
    for (key, value) in incoming {
        if value.is_mapping() {
            if !base.contains_key(key) {
                base.insert(key.clone(), Value::Mapping(Mapping::new()));
            }
            if let Some(slot) = base.get_mut(key) {
                merge(slot, value);
            }
        } else {
            base.insert(key.clone(), value.clone());
        }
    }
}

fn merge_sequences(base: &mut Vec<Tree>, incoming: &[Tree]) {
    for (index, value) in incoming.iter().enumerate() {
        if index < base.len() {
            merge(&mut base[index], value);
        } else if index == base.len() {
            base.push(value.clone());
        } else {
            base.resize(index, Value::Null);
            base.push(value.clone());
        }
    }
}
