//! Core data model for specmash: the type-schema IR shared by the
//! importer, the mashing engine, and downstream generators.
//!
//! This crate defines:
//!
//! - [`Spec`] — the closed tagged union over every schema shape
//!   (primitives, clusters, nodes, aliases, enumerations, type groups,
//!   customizations), with structural equality via [`Spec::is_equal`].
//! - [`SpecMetadata`] — descriptions, annotations, and cached hashes;
//!   always invisible to equality and hashing.
//! - Content hashing ([`Spec::content_hash`], [`SpecHasher`]) — a
//!   deterministic structural fingerprint, stable under map key-order
//!   permutation.
//! - [`Tree`] documents and [`merge`] — the generic deep merge that folds
//!   many overlapping sample shapes into one representative shape.
//! - The persisted-document layout ([`Spec::to_tree`], [`Spec::from_tree`])
//!   dispatching on a `kind` discriminator, which also backs the
//!   `Serialize`/`Deserialize` impls.
//!
//! # Example
//!
//! ```
//! use specmash_core::{PrimitiveKind, Spec, SpecNode, SpecPrimitive};
//!
//! let node = SpecNode::new("Track")
//!     .with_child("title", Spec::Primitive(SpecPrimitive::new(PrimitiveKind::String)))
//!     .with_child("plays", Spec::Primitive(SpecPrimitive::new(PrimitiveKind::Integer)));
//!
//! let yaml = serde_yaml::to_string(&Spec::Node(node.clone())).unwrap();
//! let decoded: Spec = serde_yaml::from_str(&yaml).unwrap();
//! assert!(decoded.is_equal(&Spec::Node(node)));
//! ```

mod codec;
mod hash;
mod metadata;
mod tree;
mod types;

pub use codec::CodecError;
pub use hash::{SpecHasher, hash_tree};
pub use metadata::SpecMetadata;
pub use tree::{Tree, TreeShape, empty_of, merge, merged, shape_of};
pub use types::{
    CustomizationPatch, CustomizationTarget, GenerationStyle, MissingBehavior, PatchOperation,
    PrimitiveKind, Spec, SpecAlias, SpecCluster, SpecCustomization, SpecEnumeration, SpecKind,
    SpecNode, SpecPrimitive, TypeGroup, TypeGroupSettings, UnknownKindError,
};
