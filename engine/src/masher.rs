//! The type masher: fixpoint reconciliation of many sample shapes into one
//! declared type per name.
//!
//! Real data sets contain many overlapping samples of each type, and
//! annotation rules can mint *new* type names mid-run (lifted types, enum
//! aliases). The masher therefore iterates: every pushed root runs through
//! the annotation pipeline, lifted candidates accumulate per name, each
//! name's candidates flatten into one node by left-to-right deep merge, and
//! the flattened nodes are pushed as new roots — until a full round
//! produces nothing new. A configurable round budget turns a pathological
//! annotation feedback loop into a reportable error instead of a hang.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use specmash_core::{
    CodecError, Spec, SpecAlias, SpecEnumeration, SpecNode, SpecKind,
};

use crate::keys;
use crate::pipeline::{AnnotationPipeline, PipelineDelegate};
use crate::registry::SpecRegistry;

/// Errors raised by a mashing run.
#[derive(Debug, Error)]
pub enum MashError {
    /// The drain loop failed to stabilize within the round budget.
    #[error("type mashing exceeded the fixpoint budget of {budget} rounds")]
    FixpointBudget { budget: usize },

    /// A deep merge produced a document that no longer decodes.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Tuning for a mashing run.
#[derive(Debug, Clone, Copy)]
pub struct MashConfig {
    /// Maximum outer drain rounds before the run is aborted.
    pub max_rounds: usize,
}

impl Default for MashConfig {
    fn default() -> Self {
        Self { max_rounds: 64 }
    }
}

// Per-run accumulation; doubles as the pipeline delegate.
#[derive(Default)]
struct MashState {
    // group name -> field name -> observed sample snapshots
    group_aggregates: BTreeMap<String, BTreeMap<String, Vec<Spec>>>,
    // lifted type name -> candidate shapes awaiting flattening
    extracted_nodes: BTreeMap<String, Vec<SpecNode>>,
    // lifted type name -> flattened accumulator
    flattened_extractions: BTreeMap<String, SpecNode>,
    declared_types: BTreeMap<String, Spec>,
}

impl PipelineDelegate for MashState {
    fn created_spec(&mut self, spec: Spec) {
        match spec {
            Spec::Node(node) => {
                self.extracted_nodes
                    .entry(node.name.clone())
                    .or_default()
                    .push(node);
            }
            other => {
                if let Some(name) = other.name() {
                    self.declared_types.insert(name.to_string(), other);
                }
            }
        }
    }

    fn found_group_member(&mut self, group: &str, field: &str, spec: Spec) {
        self.group_aggregates
            .entry(group.to_string())
            .or_default()
            .entry(field.to_string())
            .or_default()
            .push(spec);
    }
}

/// Consumes a set of potentially overlapping root nodes and produces the
/// flat declared-type table a generator renders from.
///
/// A masher is an owned value; each call to [`eat`](TypeMasher::eat) is one
/// self-contained run, and independent mashers can run concurrently.
///
/// # Examples
///
/// ```
/// use specmash_core::{PrimitiveKind, Spec, SpecNode, SpecPrimitive};
/// use specmash_engine::{AnnotationPipeline, TypeMasher, keys};
///
/// let root = SpecNode::new("Track")
///     .with_child("title", Spec::Primitive(SpecPrimitive::new(PrimitiveKind::String)))
///     .with_annotation(keys::ROOT_TYPE, "true");
///
/// let pipeline = AnnotationPipeline::standard();
/// let mut masher = TypeMasher::new();
/// masher.eat(&pipeline, &[root]).unwrap();
///
/// assert!(masher.declared_types().contains_key("Track"));
/// ```
#[derive(Default)]
pub struct TypeMasher {
    config: MashConfig,
    state: MashState,
}

impl TypeMasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MashConfig) -> Self {
        Self {
            config,
            state: MashState::default(),
        }
    }

    /// Runs one mash over the given roots. All per-run state resets on
    /// entry, so a masher can be reused across runs.
    pub fn eat(&mut self, pipeline: &AnnotationPipeline, roots: &[SpecNode]) -> Result<(), MashError> {
        self.state = MashState::default();

        for root in roots {
            self.push_root(pipeline, root.clone());
        }

        let mut rounds = 0usize;
        while !self.state.extracted_nodes.is_empty() {
            rounds += 1;
            if rounds > self.config.max_rounds {
                return Err(MashError::FixpointBudget {
                    budget: self.config.max_rounds,
                });
            }
            debug!(round = rounds, pending = self.state.extracted_nodes.len(), "mash round");

            // drain every pending lifted-type candidate into its flattened
            // accumulator, seeded by any prior value for that name
            let extracted = std::mem::take(&mut self.state.extracted_nodes);
            for (name, candidates) in extracted {
                let base = self.state.flattened_extractions.remove(&name);
                let flattened = flatten_candidates(&name, candidates, base)?;
                self.state.flattened_extractions.insert(name, flattened);
            }

            // every flattened node re-enters as a root, which may refill
            // extracted_nodes and continue the loop
            let flattened = std::mem::take(&mut self.state.flattened_extractions);
            for (_, node) in flattened {
                self.push_root(pipeline, node);
            }
        }

        let aggregates = std::mem::take(&mut self.state.group_aggregates);
        for (group, fields) in aggregates {
            let node = assemble_type_group(&group, fields)?;
            self.state.declared_types.insert(group, Spec::Node(node));
        }

        Ok(())
    }

    // One root through the pipeline. Rejected roots vanish; node results
    // must opt in as root types, everything else identifiable lands in the
    // declared-type table.
    fn push_root(&mut self, pipeline: &AnnotationPipeline, root: SpecNode) {
        let Some(processed) = pipeline.process(Spec::Node(root), &mut self.state) else {
            return;
        };

        if let Spec::Node(node) = &processed {
            if node.metadata.annotation(keys::ROOT_TYPE) != Some("true") {
                // the node existed only for its side effects
                return;
            }
        }

        if let Some(name) = processed.name() {
            self.state.declared_types.insert(name.to_string(), processed);
        }
    }

    /// The final declared-type table, name to spec.
    pub fn declared_types(&self) -> &BTreeMap<String, Spec> {
        &self.state.declared_types
    }

    /// Consumes the masher, yielding the declared-type table.
    pub fn into_declared_types(self) -> BTreeMap<String, Spec> {
        self.state.declared_types
    }

    /// The declared nodes, name to node.
    pub fn nodes(&self) -> BTreeMap<&str, &SpecNode> {
        self.state
            .declared_types
            .iter()
            .filter_map(|(name, spec)| spec.as_node().map(|node| (name.as_str(), node)))
            .collect()
    }

    /// The declared enumerations, name to enumeration.
    pub fn enumerations(&self) -> BTreeMap<&str, &SpecEnumeration> {
        self.state
            .declared_types
            .iter()
            .filter_map(|(name, spec)| match spec {
                Spec::Enumeration(enumeration) => Some((name.as_str(), enumeration)),
                _ => None,
            })
            .collect()
    }

    /// The declared aliases, name to alias.
    pub fn aliases(&self) -> BTreeMap<&str, &SpecAlias> {
        self.state
            .declared_types
            .iter()
            .filter_map(|(name, spec)| match spec {
                Spec::Alias(alias) => Some((name.as_str(), alias)),
                _ => None,
            })
            .collect()
    }

    /// Declared nodes inherited by `name` through its TypeGroup sidecar's
    /// `explicitly_extends` list, resolved against the given registry.
    pub fn inherited_nodes(&self, registry: &SpecRegistry, name: &str) -> Vec<&SpecNode> {
        let Some(Spec::TypeGroup(group)) = registry.query(SpecKind::TypeGroup, name) else {
            return Vec::new();
        };
        let nodes = self.nodes();
        group
            .settings
            .explicitly_extends
            .iter()
            .filter_map(|extends| nodes.get(extends.as_str()).copied())
            .collect()
    }

    /// The potentially-overlapping fields `name` inherits through its
    /// TypeGroup sidecar. Collision resolution is the caller's concern.
    pub fn inherited_properties<'a>(
        &'a self,
        registry: &SpecRegistry,
        name: &str,
    ) -> Vec<(&'a str, &'a Spec)> {
        self.inherited_nodes(registry, name)
            .into_iter()
            .flat_map(|node| {
                node.children
                    .iter()
                    .map(|(field, spec)| (field.as_str(), spec))
            })
            .collect()
    }
}

// Left-to-right deep merge of a name's candidates over an optional prior
// accumulator; the result keeps the name and tags every immediate child as
// a member of the name's type group.
fn flatten_candidates(
    name: &str,
    candidates: Vec<SpecNode>,
    base: Option<SpecNode>,
) -> Result<SpecNode, MashError> {
    let mut merged = base.unwrap_or_else(|| SpecNode::new(name));
    for candidate in &candidates {
        merged = merged.merge_with(candidate)?;
    }
    merged.name = name.to_string();

    for child in merged.children.values_mut() {
        if let Some(metadata) = child.metadata_mut() {
            metadata
                .annotations
                .insert(keys::TYPE_GROUP.to_string(), name.to_string());
        }
    }
    Ok(merged)
}

// Builds the synthetic node for one type group: per field, the
// left-to-right merge of every structurally distinct sample observed.
fn assemble_type_group(
    name: &str,
    fields: BTreeMap<String, Vec<Spec>>,
) -> Result<SpecNode, MashError> {
    let mut node = SpecNode::new(name);
    for (field, samples) in fields {
        let mut distinct: Vec<Spec> = Vec::new();
        for sample in samples {
            if !distinct.iter().any(|seen| seen.is_equal(&sample)) {
                distinct.push(sample);
            }
        }
        let mut iter = distinct.into_iter();
        let Some(first) = iter.next() else {
            continue;
        };
        let merged = iter.try_fold(first, |acc, next| acc.merge_with(&next))?;
        node.children.insert(field, merged);
    }
    Ok(node)
}
