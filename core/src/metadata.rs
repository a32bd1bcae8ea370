//! Author-facing metadata attached to every spec.
//!
//! Metadata never participates in structural equality or content hashing;
//! it is the extension point annotation processors and customization
//! targets read from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Optional description, free-form annotations, and a cached content hash.
///
/// The `hash` field caches the content hash of the spec the metadata is
/// attached to. Hashing itself never reads this field, so the cache cannot
/// become self-referential.
///
/// # Examples
///
/// ```
/// use specmash_core::SpecMetadata;
///
/// let mut metadata = SpecMetadata::default();
/// assert!(metadata.is_empty());
///
/// metadata.annotations.insert("specmash/root-type".into(), "true".into());
/// assert!(!metadata.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecMetadata {
    /// Human-readable description, carried through to the generator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Cached content hash of the owning spec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Arbitrary string key/value annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl SpecMetadata {
    /// Returns `true` when every field is absent or empty.
    ///
    /// Empty metadata is omitted entirely from persisted documents.
    pub fn is_empty(&self) -> bool {
        self.description.as_deref().is_none_or(str::is_empty)
            && self.annotations.is_empty()
            && self.hash.is_none()
    }

    /// Copies description and annotations from another metadata value.
    ///
    /// The cached hash is not inherited; it describes the donor's
    /// structure, not the recipient's.
    pub fn inherit_from(&mut self, other: &SpecMetadata) {
        self.description = other.description.clone();
        self.annotations = other.annotations.clone();
    }

    /// Removes the given annotation keys, ignoring keys that are absent.
    pub fn strip_annotations(&mut self, keys: &[&str]) {
        for key in keys {
            self.annotations.remove(*key);
        }
    }

    /// Returns the annotation value for `key`, if present.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}
