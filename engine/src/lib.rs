//! The specmash engine: everything between imported sample nodes and the
//! declared-type table a generator consumes.
//!
//! - [`SpecRegistry`] — (kind, name)-keyed store with recursive directory
//!   loading of persisted documents.
//! - [`AnnotationPipeline`] — pluggable multi-pass annotation processing
//!   with recursive tree dispatch and delegate callbacks.
//! - Standard processors — type lifting, enum synthesis, type-group
//!   collection ([`processors`]).
//! - [`TypeMasher`] — the fixpoint "mashing" run that reconciles many
//!   sample shapes (and mid-run synthesized types) into one declared type
//!   per name.
//! - [`CustomizationEngine`] — target matching plus the ordered path-patch
//!   interpreter.
//! - [`resolve_alias`] — cycle-detecting alias resolution.
//!
//! Every piece is an owned value; nothing global. Independent runs can
//! proceed concurrently by giving each its own registry, pipeline, and
//! masher.
//!
//! # Example
//!
//! ```
//! use specmash_core::{PrimitiveKind, Spec, SpecNode, SpecPrimitive};
//! use specmash_engine::{AnnotationPipeline, TypeMasher, keys};
//!
//! let sample = SpecNode::new("Track")
//!     .with_child("title", Spec::Primitive(SpecPrimitive::new(PrimitiveKind::String)))
//!     .with_annotation(keys::ROOT_TYPE, "true");
//!
//! let pipeline = AnnotationPipeline::standard();
//! let mut masher = TypeMasher::new();
//! masher.eat(&pipeline, &[sample]).unwrap();
//! assert_eq!(masher.declared_types().len(), 1);
//! ```

mod customize;
pub mod keys;
mod masher;
mod pipeline;
pub mod processors;
mod registry;
mod resolve;

pub use customize::{
    CustomizationEngine, CustomizeError, PathError, apply_customization, apply_patch,
    target_matches,
};
pub use masher::{MashConfig, MashError, TypeMasher};
pub use pipeline::{AnnotationPipeline, AnnotationProcessor, PipelineDelegate, RegistrationError};
pub use registry::{RegistryError, SpecRegistry, SpecTag, decode_yaml_documents};
pub use resolve::{ResolveError, resolve_alias};
