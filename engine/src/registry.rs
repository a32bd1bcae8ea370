//! The authoritative store of identifiable specs, keyed by (kind, name).
//!
//! A registry is an owned value: callers create one per run (or share one
//! deliberately), so independent runs never contend over global state.
//! Storing under an existing tag overwrites; the previous occupant is
//! handed back to the caller.
//!
//! Directory loading is recursive and tolerant: a malformed document is
//! fatal to that document only — it is logged and skipped, never aborting
//! the batch.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use specmash_core::{Spec, SpecCustomization, SpecKind, SpecNode};

/// Unique identity of a stored spec.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SpecTag {
    pub kind: SpecKind,
    pub name: String,
}

impl SpecTag {
    pub fn new(kind: SpecKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// Errors surfaced by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Attempted to store a spec without a name (a primitive or cluster).
    #[error("cannot store an unidentifiable {kind} spec")]
    Unidentifiable { kind: SpecKind },

    /// The directory walk itself failed (not an individual document).
    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Convenience alias for results with [`RegistryError`].
pub type Result<T> = std::result::Result<T, RegistryError>;

/// (kind, name)-keyed spec store with last-write-wins semantics.
///
/// # Examples
///
/// ```
/// use specmash_core::{Spec, SpecKind, SpecNode};
/// use specmash_engine::SpecRegistry;
///
/// let mut registry = SpecRegistry::new();
/// registry.store(Spec::Node(SpecNode::new("Track"))).unwrap();
///
/// assert!(registry.query(SpecKind::Object, "Track").is_some());
/// assert!(registry.query(SpecKind::Reference, "Track").is_none());
/// ```
#[derive(Debug, Default)]
pub struct SpecRegistry {
    specs: std::collections::BTreeMap<SpecTag, Spec>,
}

impl SpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an identifiable spec, returning whatever it displaced.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unidentifiable`] for primitives and
    /// clusters, which carry no name to key on.
    pub fn store(&mut self, spec: Spec) -> Result<Option<Spec>> {
        let Some(name) = spec.name() else {
            return Err(RegistryError::Unidentifiable { kind: spec.kind() });
        };
        let tag = SpecTag::new(spec.kind(), name);
        debug!(kind = %tag.kind, name = %tag.name, "storing spec");
        Ok(self.specs.insert(tag, spec))
    }

    /// Stores every spec in the iterator, returning how many were stored.
    pub fn store_all(&mut self, specs: impl IntoIterator<Item = Spec>) -> Result<usize> {
        let mut stored = 0;
        for spec in specs {
            self.store(spec)?;
            stored += 1;
        }
        Ok(stored)
    }

    /// Looks up the spec stored under (kind, name).
    pub fn query(&self, kind: SpecKind, name: &str) -> Option<&Spec> {
        self.specs.get(&SpecTag::new(kind, name))
    }

    /// Iterates every stored spec in tag order.
    pub fn iter(&self) -> impl Iterator<Item = (&SpecTag, &Spec)> {
        self.specs.iter()
    }

    /// Every stored node, in name order.
    pub fn nodes(&self) -> Vec<&SpecNode> {
        self.specs
            .values()
            .filter_map(|spec| spec.as_node())
            .collect()
    }

    /// Every stored customization, in name order.
    pub fn customizations(&self) -> Vec<&SpecCustomization> {
        self.specs
            .values()
            .filter_map(|spec| match spec {
                Spec::Customization(customization) => Some(customization),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Recursively loads every `.yaml`/`.yml`/`.json` document under `root`
    /// into the store, returning how many specs were stored.
    ///
    /// YAML files may hold multiple documents. Documents that fail to
    /// decode, and decoded documents that are unidentifiable, are logged
    /// and skipped — one bad document never aborts the batch.
    pub fn load_dir(&mut self, root: impl AsRef<Path>) -> Result<usize> {
        let mut loaded = 0;
        for entry in WalkDir::new(root.as_ref()) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
                continue;
            };
            if !matches!(extension, "yaml" | "yml" | "json") {
                continue;
            }
            let text = match std::fs::read_to_string(path) {
                Ok(text) => text,
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipping unreadable file");
                    continue;
                }
            };
            let specs = match extension {
                "json" => match serde_json::from_str::<Spec>(&text) {
                    Ok(spec) => vec![spec],
                    Err(error) => {
                        warn!(path = %path.display(), %error, "skipping malformed document");
                        continue;
                    }
                },
                _ => match decode_yaml_documents(&text) {
                    Ok(specs) => specs,
                    Err(error) => {
                        warn!(path = %path.display(), %error, "skipping malformed document");
                        continue;
                    }
                },
            };
            for spec in specs {
                match self.store(spec) {
                    Ok(_) => loaded += 1,
                    Err(error) => {
                        warn!(path = %path.display(), %error, "skipping unstorable document");
                    }
                }
            }
        }
        Ok(loaded)
    }
}

/// Decodes every document in a (possibly multi-document) YAML stream.
pub fn decode_yaml_documents(text: &str) -> std::result::Result<Vec<Spec>, serde_yaml::Error> {
    let mut specs = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        specs.push(Spec::deserialize(document)?);
    }
    Ok(specs)
}
