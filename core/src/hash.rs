//! Content hashing: a deterministic, metadata-independent structural
//! fingerprint.
//!
//! Hash values are a stable identity for imported samples (deduplication)
//! and the strongest selector a customization target can use. The traversal
//! appends raw bytes into one shared accumulator — recursive, but never
//! hash-of-hash — and runs a single digest over the full buffer at the end.
//! Mapping-shaped data always walks its keys in descending order, so the
//! fingerprint is independent of key insertion order while staying
//! sensitive to every leaf value.

use sha2::{Digest, Sha256};

use crate::tree::Tree;
use crate::types::{
    CustomizationPatch, CustomizationTarget, Spec, SpecCustomization, SpecNode,
};

/// Byte accumulator finalized with one digest pass.
///
/// # Examples
///
/// ```
/// use specmash_core::SpecHasher;
///
/// let mut hasher = SpecHasher::new();
/// hasher.update("Object");
/// let hex = hasher.finalize();
/// assert_eq!(hex.len(), 64);
/// assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
#[derive(Debug, Default)]
pub struct SpecHasher {
    buf: Vec<u8>,
}

impl SpecHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw bytes to the accumulator.
    pub fn update(&mut self, bytes: impl AsRef<[u8]>) {
        self.buf.extend_from_slice(bytes.as_ref());
    }

    /// Digests the accumulated bytes and renders them as lowercase hex.
    pub fn finalize(self) -> String {
        let digest = Sha256::digest(&self.buf);
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

impl Spec {
    /// The content hash of this spec.
    ///
    /// # Examples
    ///
    /// ```
    /// use specmash_core::{PrimitiveKind, Spec, SpecNode, SpecPrimitive};
    ///
    /// let field = || Spec::Primitive(SpecPrimitive::new(PrimitiveKind::String));
    /// let ab = SpecNode::new("T").with_child("a", field()).with_child("b", field());
    /// let ba = SpecNode::new("T").with_child("b", field()).with_child("a", field());
    ///
    /// // key order never affects the fingerprint
    /// assert_eq!(Spec::Node(ab).content_hash(), Spec::Node(ba).content_hash());
    /// ```
    pub fn content_hash(&self) -> String {
        let mut hasher = SpecHasher::new();
        self.hash_into(&mut hasher);
        hasher.finalize()
    }

    /// Appends this spec's canonical bytes to an accumulator.
    pub fn hash_into(&self, hasher: &mut SpecHasher) {
        hasher.update(self.kind().as_str());
        match self {
            Spec::Primitive(primitive) => {
                hasher.update(primitive.primitive.as_str());
            }
            Spec::Cluster(cluster) => {
                cluster.element.hash_into(hasher);
                if let Some(key) = &cluster.key {
                    key.hash_into(hasher);
                }
            }
            Spec::Node(node) => {
                for (name, child) in node.children.iter().rev() {
                    hasher.update(name);
                    child.hash_into(hasher);
                }
            }
            Spec::Alias(alias) => {
                hasher.update(&alias.aliased_name);
                hasher.update(alias.aliased_kind.as_str());
            }
            Spec::Enumeration(enumeration) => {
                hasher.update(enumeration.enumeration_kind.as_str());
                hasher.update([u8::from(enumeration.extensible)]);
                for (case, raw) in enumeration.cases.iter().rev() {
                    hasher.update(case);
                    hasher.update(raw);
                }
            }
            Spec::TypeGroup(group) => {
                hasher.update(&group.name);
            }
            Spec::Customization(customization) => {
                hash_customization(customization, hasher);
            }
        }
    }
}

impl SpecNode {
    /// The content hash of this node.
    pub fn content_hash(&self) -> String {
        let mut hasher = SpecHasher::new();
        Spec::Node(self.clone()).hash_into(&mut hasher);
        hasher.finalize()
    }
}

fn hash_customization(customization: &SpecCustomization, hasher: &mut SpecHasher) {
    hash_target(&customization.target, hasher);
    for patch in &customization.patches {
        hash_patch(patch, hasher);
    }
}

fn hash_target(target: &CustomizationTarget, hasher: &mut SpecHasher) {
    if let Some(kind) = target.kind {
        hasher.update(kind.as_str());
    }
    if let Some(name) = &target.name {
        hasher.update(name);
    }
    if let Some(hashes) = &target.hashes {
        for hash in hashes {
            hasher.update(hash);
        }
    }
    if let Some(fragments) = &target.children {
        for fragment in fragments {
            for (name, spec) in fragment.iter().rev() {
                hasher.update(name);
                spec.hash_into(hasher);
            }
        }
    }
    if let Some(metadata) = &target.metadata {
        if let Some(hash) = &metadata.hash {
            hasher.update(hash);
        }
        for (key, value) in metadata.annotations.iter().rev() {
            hasher.update(key);
            hasher.update(value);
        }
    }
}

fn hash_patch(patch: &CustomizationPatch, hasher: &mut SpecHasher) {
    hasher.update(patch.operation.as_str());
    hasher.update(&patch.path);
    if let Some(value) = &patch.value {
        hash_tree(value, hasher);
    }
}

/// Appends a document's canonical bytes to an accumulator.
///
/// Mappings walk their keys sorted descending by rendering, so a document's
/// fingerprint is stable under key-order permutation.
pub fn hash_tree(tree: &Tree, hasher: &mut SpecHasher) {
    match tree {
        Tree::Null => hasher.update("~"),
        Tree::Bool(b) => hasher.update(if *b { "true" } else { "false" }),
        Tree::Number(n) => hasher.update(n.to_string()),
        Tree::String(s) => hasher.update(s),
        Tree::Sequence(items) => {
            for item in items {
                hash_tree(item, hasher);
            }
        }
        Tree::Mapping(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| key_repr(b).cmp(&key_repr(a)));
            for (key, value) in entries {
                hash_tree(key, hasher);
                hash_tree(value, hasher);
            }
        }
        Tree::Tagged(tagged) => {
            hasher.update(tagged.tag.to_string());
            hash_tree(&tagged.value, hasher);
        }
    }
}

// Deterministic rendering used only to order mapping keys.
fn key_repr(tree: &Tree) -> String {
    match tree {
        Tree::Null => "~".to_string(),
        Tree::Bool(b) => b.to_string(),
        Tree::Number(n) => n.to_string(),
        Tree::String(s) => s.clone(),
        Tree::Sequence(items) => items.iter().map(key_repr).collect::<Vec<_>>().join(","),
        Tree::Mapping(map) => map
            .iter()
            .map(|(k, v)| format!("{}:{}", key_repr(k), key_repr(v)))
            .collect::<Vec<_>>()
            .join(","),
        Tree::Tagged(tagged) => format!("{}{}", tagged.tag, key_repr(&tagged.value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PrimitiveKind, SpecCluster, SpecPrimitive};

    fn primitive(kind: PrimitiveKind) -> Spec {
        Spec::Primitive(SpecPrimitive::new(kind))
    }

    #[test]
    fn leaf_change_changes_the_hash() {
        let a = SpecNode::new("T").with_child("x", primitive(PrimitiveKind::String));
        let b = SpecNode::new("T").with_child("x", primitive(PrimitiveKind::Integer));
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn metadata_never_affects_the_hash() {
        let plain = SpecNode::new("T").with_child("x", primitive(PrimitiveKind::String));
        let mut annotated = plain.clone();
        annotated.metadata.description = Some("described".into());
        annotated
            .metadata
            .annotations
            .insert("specmash/type-group".into(), "G".into());
        annotated.metadata.hash = Some("cached".into());

        assert_eq!(plain.content_hash(), annotated.content_hash());
    }

    #[test]
    fn cluster_key_presence_distinguishes_hashes() {
        let array = Spec::Cluster(SpecCluster::array(primitive(PrimitiveKind::String)));
        let dictionary = Spec::Cluster(SpecCluster::dictionary(
            primitive(PrimitiveKind::String),
            primitive(PrimitiveKind::String),
        ));
        assert_ne!(array.content_hash(), dictionary.content_hash());
    }

    #[test]
    fn tree_mapping_hash_is_key_order_stable() {
        let ab: Tree = serde_yaml::from_str("{a: 1, b: 2}").unwrap();
        let ba: Tree = serde_yaml::from_str("{b: 2, a: 1}").unwrap();

        let mut hasher = SpecHasher::new();
        hash_tree(&ab, &mut hasher);
        let first = hasher.finalize();

        let mut hasher = SpecHasher::new();
        hash_tree(&ba, &mut hasher);
        assert_eq!(first, hasher.finalize());
    }

    #[test]
    fn sequence_order_is_value_significant() {
        let ab: Tree = serde_yaml::from_str("[a, b]").unwrap();
        let ba: Tree = serde_yaml::from_str("[b, a]").unwrap();

        let mut hasher = SpecHasher::new();
        hash_tree(&ab, &mut hasher);
        let first = hasher.finalize();

        let mut hasher = SpecHasher::new();
        hash_tree(&ba, &mut hasher);
        assert_ne!(first, hasher.finalize());
    }
}
