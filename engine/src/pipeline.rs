//! The annotation-processing pipeline: pluggable passes that rewrite specs
//! based on their metadata annotations.
//!
//! A processor declares either a set of annotation keys (it runs on any
//! spec whose metadata carries at least one, optionally narrowed by kind)
//! or, with no keys, a fixed set of kinds (it runs unconditionally on every
//! spec of a matching kind). Dispatch is recursive: a processed node's
//! children are dispatched in turn, and rejected children disappear from
//! the tree.
//!
//! Processor order is deterministic: kind-only processors run first, then
//! keyed processors in registration order.

use std::collections::BTreeSet;

use thiserror::Error;

use specmash_core::{Spec, SpecCluster, SpecKind};

/// Receives what processors report while a tree is being dispatched.
///
/// The masher is the canonical delegate; tests supply small recording
/// implementations.
pub trait PipelineDelegate {
    /// A processor minted a new top-level spec (a lifted type, a
    /// synthesized enumeration).
    fn created_spec(&mut self, spec: Spec);

    /// A processor observed that `field` on some node belongs to the named
    /// type-group aggregate. The spec is an owned snapshot.
    fn found_group_member(&mut self, group: &str, field: &str, spec: Spec) {
        let _ = (group, field, spec);
    }
}

/// One annotation-processing pass.
pub trait AnnotationProcessor {
    /// Annotation keys this processor claims. Non-empty means the processor
    /// runs on any spec carrying at least one of them.
    fn annotation_keys(&self) -> &[&'static str] {
        &[]
    }

    /// Kinds this processor applies to. With no annotation keys declared,
    /// the processor runs unconditionally on every spec of these kinds;
    /// otherwise the kinds narrow the annotation match.
    fn kinds(&self) -> &[SpecKind];

    /// Transforms a spec, or returns `None` to reject it outright.
    fn process(&self, spec: Spec, delegate: &mut dyn PipelineDelegate) -> Option<Spec>;
}

/// Errors raised while registering processors.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Two processors claimed the same annotation key. This is a build-time
    /// misconfiguration, fatal at startup.
    #[error("annotation key `{key}` is already claimed by another processor")]
    KeyCollision { key: &'static str },
}

/// An ordered set of registered processors plus the recursive dispatcher.
#[derive(Default)]
pub struct AnnotationPipeline {
    processors: Vec<Box<dyn AnnotationProcessor>>,
    claimed_keys: BTreeSet<&'static str>,
}

impl AnnotationPipeline {
    /// An empty pipeline with no processors.
    pub fn new() -> Self {
        Self::default()
    }

    /// A pipeline with the standard processors installed: type lifting,
    /// enum synthesis, and the type-group collector.
    pub fn standard() -> Self {
        use crate::processors::{EnumSynthesisProcessor, TypeGroupCollector, TypeLiftingProcessor};

        let mut pipeline = Self::new();
        pipeline.push_processor(Box::new(TypeLiftingProcessor));
        pipeline.push_processor(Box::new(EnumSynthesisProcessor));
        pipeline.push_processor(Box::new(TypeGroupCollector));
        pipeline
    }

    /// Registers a processor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::KeyCollision`] if another processor
    /// already claims one of its annotation keys.
    pub fn register(
        &mut self,
        processor: Box<dyn AnnotationProcessor>,
    ) -> Result<(), RegistrationError> {
        for key in processor.annotation_keys() {
            if self.claimed_keys.contains(key) {
                return Err(RegistrationError::KeyCollision { key });
            }
        }
        self.push_processor(processor);
        Ok(())
    }

    fn push_processor(&mut self, processor: Box<dyn AnnotationProcessor>) {
        self.claimed_keys
            .extend(processor.annotation_keys().iter().copied());
        self.processors.push(processor);
    }

    /// Every processor applicable to `spec`, in dispatch order.
    fn applicable(&self, spec: &Spec) -> Vec<&dyn AnnotationProcessor> {
        let kind = spec.kind();
        let mut out = Vec::new();

        for processor in &self.processors {
            if processor.annotation_keys().is_empty() && processor.kinds().contains(&kind) {
                out.push(processor.as_ref());
            }
        }

        if let Some(metadata) = spec.metadata() {
            for processor in &self.processors {
                let annotation_keys = processor.annotation_keys();
                if annotation_keys.is_empty() {
                    continue;
                }
                if !annotation_keys
                    .iter()
                    .any(|key| metadata.annotations.contains_key(*key))
                {
                    continue;
                }
                if !processor.kinds().is_empty() && !processor.kinds().contains(&kind) {
                    continue;
                }
                out.push(processor.as_ref());
            }
        }

        out
    }

    /// Recursively dispatches a spec through its applicable processors.
    ///
    /// Applicable processors run in sequence, each fed the previous
    /// output; any `None` drops the spec entirely. A surviving node then
    /// has each child dispatched (rejected children are removed). A
    /// surviving cluster recurses into its key — a rejected key degrades
    /// the dictionary to an array — and its element, whose rejection
    /// rejects the whole cluster. Other kinds are terminal.
    pub fn process(&self, spec: Spec, delegate: &mut dyn PipelineDelegate) -> Option<Spec> {
        let processors = self.applicable(&spec);
        let mut current = spec;
        for processor in processors {
            current = processor.process(current, delegate)?;
        }

        match current {
            Spec::Node(mut node) => {
                let children = std::mem::take(&mut node.children);
                for (name, child) in children {
                    if let Some(processed) = self.process(child, delegate) {
                        node.children.insert(name, processed);
                    }
                }
                Some(Spec::Node(node))
            }
            Spec::Cluster(cluster) => {
                let SpecCluster {
                    key,
                    element,
                    metadata,
                } = cluster;
                let key = key.and_then(|key| self.process(*key, delegate).map(Box::new));
                let element = Box::new(self.process(*element, delegate)?);
                Some(Spec::Cluster(SpecCluster {
                    key,
                    element,
                    metadata,
                }))
            }
            terminal => Some(terminal),
        }
    }
}
