//! The spec data model: a closed tagged union over every schema shape.
//!
//! A [`Spec`] is one node of the type-schema IR. Five of the variants are
//! *identifiable* (they carry a name and can live in a registry); clusters
//! and primitives are anonymous structure. Dispatch is always an exhaustive
//! `match` — new shapes are added by extending the union, never through
//! runtime capability checks.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::metadata::SpecMetadata;
use crate::tree::Tree;

/// Discriminator for every spec shape, matching the `kind` field of
/// persisted documents.
///
/// # Examples
///
/// ```
/// use specmash_core::SpecKind;
///
/// assert_eq!(SpecKind::TypeGroup.to_string(), "TypeGroup");
/// assert_eq!("Reference".parse::<SpecKind>().unwrap(), SpecKind::Reference);
/// assert!("Gadget".parse::<SpecKind>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpecKind {
    Object,
    Array,
    Dictionary,
    Reference,
    Primitive,
    Enumeration,
    TypeGroup,
    Customization,
}

impl SpecKind {
    /// The wire spelling of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecKind::Object => "Object",
            SpecKind::Array => "Array",
            SpecKind::Dictionary => "Dictionary",
            SpecKind::Reference => "Reference",
            SpecKind::Primitive => "Primitive",
            SpecKind::Enumeration => "Enumeration",
            SpecKind::TypeGroup => "TypeGroup",
            SpecKind::Customization => "Customization",
        }
    }
}

impl fmt::Display for SpecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecKind {
    type Err = UnknownKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Object" => Ok(SpecKind::Object),
            "Array" => Ok(SpecKind::Array),
            "Dictionary" => Ok(SpecKind::Dictionary),
            "Reference" => Ok(SpecKind::Reference),
            "Primitive" => Ok(SpecKind::Primitive),
            "Enumeration" => Ok(SpecKind::Enumeration),
            "TypeGroup" => Ok(SpecKind::TypeGroup),
            "Customization" => Ok(SpecKind::Customization),
            other => Err(UnknownKindError(other.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognized discriminator spelling.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown discriminator `{0}`")]
pub struct UnknownKindError(pub String);

/// The lowest-level value shape a spec can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimitiveKind {
    String,
    Integer,
    Double,
    Boolean,
    Never,
    Date,
    Data,
}

impl PrimitiveKind {
    /// The wire spelling of this primitive kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveKind::String => "String",
            PrimitiveKind::Integer => "Integer",
            PrimitiveKind::Double => "Double",
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Never => "Never",
            PrimitiveKind::Date => "Date",
            PrimitiveKind::Data => "Data",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrimitiveKind {
    type Err = UnknownKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "String" => Ok(PrimitiveKind::String),
            "Integer" => Ok(PrimitiveKind::Integer),
            "Double" => Ok(PrimitiveKind::Double),
            "Boolean" => Ok(PrimitiveKind::Boolean),
            "Never" => Ok(PrimitiveKind::Never),
            "Date" => Ok(PrimitiveKind::Date),
            "Data" => Ok(PrimitiveKind::Data),
            other => Err(UnknownKindError(other.to_string())),
        }
    }
}

/// A terminal scalar type.
#[derive(Debug, Clone)]
pub struct SpecPrimitive {
    pub primitive: PrimitiveKind,
    pub metadata: SpecMetadata,
}

impl SpecPrimitive {
    pub fn new(primitive: PrimitiveKind) -> Self {
        Self {
            primitive,
            metadata: SpecMetadata::default(),
        }
    }
}

/// A homogeneous container: an array of `element`, or a dictionary from
/// `key` to `element`.
///
/// The two shapes share one struct; the presence of `key` decides the kind.
/// Clusters carry no name and never live in the registry directly.
#[derive(Debug, Clone)]
pub struct SpecCluster {
    pub key: Option<Box<Spec>>,
    pub element: Box<Spec>,
    pub metadata: SpecMetadata,
}

impl SpecCluster {
    /// Creates an array cluster.
    pub fn array(element: Spec) -> Self {
        Self {
            key: None,
            element: Box::new(element),
            metadata: SpecMetadata::default(),
        }
    }

    /// Creates a dictionary cluster.
    pub fn dictionary(key: Spec, element: Spec) -> Self {
        Self {
            key: Some(Box::new(key)),
            element: Box::new(element),
            metadata: SpecMetadata::default(),
        }
    }

    pub fn kind(&self) -> SpecKind {
        if self.key.is_some() {
            SpecKind::Dictionary
        } else {
            SpecKind::Array
        }
    }
}

/// The "object" shape: a named record of uniquely-keyed fields.
///
/// # Examples
///
/// ```
/// use specmash_core::{PrimitiveKind, Spec, SpecNode, SpecPrimitive};
///
/// let node = SpecNode::new("Person")
///     .with_child("name", Spec::Primitive(SpecPrimitive::new(PrimitiveKind::String)))
///     .with_child("age", Spec::Primitive(SpecPrimitive::new(PrimitiveKind::Integer)));
///
/// assert_eq!(node.children.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct SpecNode {
    pub name: String,
    pub children: BTreeMap<String, Spec>,
    pub metadata: SpecMetadata,
}

impl SpecNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: BTreeMap::new(),
            metadata: SpecMetadata::default(),
        }
    }

    /// Adds a field, replacing any field with the same name.
    pub fn with_child(mut self, name: impl Into<String>, child: Spec) -> Self {
        self.children.insert(name.into(), child);
        self
    }

    /// Sets an annotation on the node's metadata.
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.annotations.insert(key.into(), value.into());
        self
    }
}

/// A named reference to another identifiable spec.
///
/// Resolution is lazy: the `(aliased_kind, aliased_name)` pair is looked up
/// in a registry at resolution time and may dangle.
#[derive(Debug, Clone)]
pub struct SpecAlias {
    pub name: String,
    pub aliased_name: String,
    pub aliased_kind: SpecKind,
    pub metadata: SpecMetadata,
}

impl SpecAlias {
    pub fn new(
        name: impl Into<String>,
        aliased_name: impl Into<String>,
        aliased_kind: SpecKind,
    ) -> Self {
        Self {
            name: name.into(),
            aliased_name: aliased_name.into(),
            aliased_kind,
            metadata: SpecMetadata::default(),
        }
    }
}

/// A named enumeration over a primitive raw type.
#[derive(Debug, Clone)]
pub struct SpecEnumeration {
    pub name: String,
    /// Whether unknown raw values beyond `cases` may occur.
    pub extensible: bool,
    pub enumeration_kind: PrimitiveKind,
    /// Case name to raw value.
    pub cases: BTreeMap<String, String>,
    pub metadata: SpecMetadata,
}

/// How a generator should render the type a [`TypeGroup`] targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationStyle {
    #[default]
    Concrete,
    Abstract,
}

impl GenerationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStyle::Concrete => "Concrete",
            GenerationStyle::Abstract => "Abstract",
        }
    }
}

impl FromStr for GenerationStyle {
    type Err = UnknownKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Concrete" => Ok(GenerationStyle::Concrete),
            "Abstract" => Ok(GenerationStyle::Abstract),
            other => Err(UnknownKindError(other.to_string())),
        }
    }
}

/// Generator hints attached to a [`TypeGroup`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeGroupSettings {
    pub generation_style: GenerationStyle,
    /// Names of other type groups whose fields this type also carries.
    pub explicitly_extends: Vec<String>,
}

impl TypeGroupSettings {
    pub fn is_default(&self) -> bool {
        self.generation_style == GenerationStyle::Concrete && self.explicitly_extends.is_empty()
    }
}

/// A sidecar for a declared type, named after the node it targets.
///
/// Type groups never affect mashing; they only carry hints for the
/// downstream generator.
#[derive(Debug, Clone)]
pub struct TypeGroup {
    pub name: String,
    pub settings: TypeGroupSettings,
    pub metadata: SpecMetadata,
}

impl TypeGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: TypeGroupSettings::default(),
            metadata: SpecMetadata::default(),
        }
    }
}

/// Selection predicate of a customization.
///
/// All declared criteria must hold, except content-hash membership, which
/// short-circuits to a match on its own. A target with no criteria at all
/// matches nothing.
#[derive(Debug, Clone, Default)]
pub struct CustomizationTarget {
    pub kind: Option<SpecKind>,
    pub name: Option<String>,
    pub metadata: Option<SpecMetadata>,
    /// Content hashes; any one matching selects the candidate outright.
    pub hashes: Option<Vec<String>>,
    /// Children fragments: the candidate matches a fragment iff every named
    /// field exists and is structurally equal to the fragment's value.
    pub children: Option<Vec<BTreeMap<String, Spec>>>,
}

impl CustomizationTarget {
    /// `true` when no criterion at all is declared.
    pub fn is_empty(&self) -> bool {
        self.is_empty_without_hashes() && self.hashes.as_deref().unwrap_or_default().is_empty()
    }

    /// `true` when no criterion besides content hashes is declared.
    pub fn is_empty_without_hashes(&self) -> bool {
        self.kind.is_none()
            && self.name.is_none()
            && self
                .metadata
                .as_ref()
                .is_none_or(|m| m.hash.is_none() && m.annotations.is_empty())
            && self.children.as_deref().unwrap_or_default().is_empty()
    }
}

/// One path-addressed mutation applied to a matched node.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomizationPatch {
    pub operation: PatchOperation,
    /// `/`-delimited segments; `~1` inside a segment decodes to a literal `/`.
    pub path: String,
    pub missing_behavior: MissingBehavior,
    pub value: Option<Tree>,
}

/// Patch operation verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOperation {
    Add,
    Replace,
    Append,
    Remove,
}

impl PatchOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchOperation::Add => "add",
            PatchOperation::Replace => "replace",
            PatchOperation::Append => "append",
            PatchOperation::Remove => "remove",
        }
    }
}

impl FromStr for PatchOperation {
    type Err = UnknownKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(PatchOperation::Add),
            "replace" => Ok(PatchOperation::Replace),
            "append" => Ok(PatchOperation::Append),
            "remove" => Ok(PatchOperation::Remove),
            other => Err(UnknownKindError(other.to_string())),
        }
    }
}

/// What a failed path resolution does to the enclosing patch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingBehavior {
    /// The path error is fatal to the whole customization.
    #[default]
    Throw,
    /// Only this patch is dropped; later patches still apply.
    Skip,
}

impl MissingBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissingBehavior::Throw => "throw",
            MissingBehavior::Skip => "skip",
        }
    }
}

impl FromStr for MissingBehavior {
    type Err = UnknownKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "throw" => Ok(MissingBehavior::Throw),
            "skip" => Ok(MissingBehavior::Skip),
            other => Err(UnknownKindError(other.to_string())),
        }
    }
}

/// A named target-plus-patches document.
#[derive(Debug, Clone)]
pub struct SpecCustomization {
    pub name: String,
    pub target: CustomizationTarget,
    pub patches: Vec<CustomizationPatch>,
}

/// One node of the type-schema IR.
///
/// # Examples
///
/// Structural equality is metadata-blind:
///
/// ```
/// use specmash_core::{PrimitiveKind, Spec, SpecPrimitive};
///
/// let a = SpecPrimitive::new(PrimitiveKind::String);
/// let mut b = SpecPrimitive::new(PrimitiveKind::String);
/// b.metadata.description = Some("described".into());
///
/// assert!(Spec::Primitive(a).is_equal(&Spec::Primitive(b)));
/// ```
#[derive(Debug, Clone)]
pub enum Spec {
    Primitive(SpecPrimitive),
    Cluster(SpecCluster),
    Node(SpecNode),
    Alias(SpecAlias),
    Enumeration(SpecEnumeration),
    TypeGroup(TypeGroup),
    Customization(SpecCustomization),
}

impl Spec {
    /// The kind discriminator for this spec.
    pub fn kind(&self) -> SpecKind {
        match self {
            Spec::Primitive(_) => SpecKind::Primitive,
            Spec::Cluster(cluster) => cluster.kind(),
            Spec::Node(_) => SpecKind::Object,
            Spec::Alias(_) => SpecKind::Reference,
            Spec::Enumeration(_) => SpecKind::Enumeration,
            Spec::TypeGroup(_) => SpecKind::TypeGroup,
            Spec::Customization(_) => SpecKind::Customization,
        }
    }

    /// The name, for identifiable specs; `None` for primitives and clusters.
    pub fn name(&self) -> Option<&str> {
        match self {
            Spec::Primitive(_) | Spec::Cluster(_) => None,
            Spec::Node(node) => Some(&node.name),
            Spec::Alias(alias) => Some(&alias.name),
            Spec::Enumeration(enumeration) => Some(&enumeration.name),
            Spec::TypeGroup(group) => Some(&group.name),
            Spec::Customization(customization) => Some(&customization.name),
        }
    }

    /// The metadata, for every variant that carries one.
    ///
    /// Customizations carry no metadata of their own and return `None`.
    pub fn metadata(&self) -> Option<&SpecMetadata> {
        match self {
            Spec::Primitive(primitive) => Some(&primitive.metadata),
            Spec::Cluster(cluster) => Some(&cluster.metadata),
            Spec::Node(node) => Some(&node.metadata),
            Spec::Alias(alias) => Some(&alias.metadata),
            Spec::Enumeration(enumeration) => Some(&enumeration.metadata),
            Spec::TypeGroup(group) => Some(&group.metadata),
            Spec::Customization(_) => None,
        }
    }

    /// Mutable access to the metadata, where one exists.
    pub fn metadata_mut(&mut self) -> Option<&mut SpecMetadata> {
        match self {
            Spec::Primitive(primitive) => Some(&mut primitive.metadata),
            Spec::Cluster(cluster) => Some(&mut cluster.metadata),
            Spec::Node(node) => Some(&mut node.metadata),
            Spec::Alias(alias) => Some(&mut alias.metadata),
            Spec::Enumeration(enumeration) => Some(&mut enumeration.metadata),
            Spec::TypeGroup(group) => Some(&mut group.metadata),
            Spec::Customization(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&SpecNode> {
        match self {
            Spec::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn into_node(self) -> Option<SpecNode> {
        match self {
            Spec::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Structural equality: same kind, then field-by-field recursion.
    ///
    /// Metadata (descriptions, annotations, cached hashes) never
    /// participates. Node equality additionally requires identical
    /// child-name sets; node *names* are not compared, so two samples of
    /// the same shape compare equal regardless of what they were called.
    pub fn is_equal(&self, other: &Spec) -> bool {
        match (self, other) {
            (Spec::Primitive(a), Spec::Primitive(b)) => a.primitive == b.primitive,
            (Spec::Cluster(a), Spec::Cluster(b)) => {
                let keys_equal = match (&a.key, &b.key) {
                    (None, None) => true,
                    (Some(ka), Some(kb)) => ka.is_equal(kb),
                    _ => false,
                };
                keys_equal && a.element.is_equal(&b.element)
            }
            (Spec::Node(a), Spec::Node(b)) => {
                a.children.len() == b.children.len()
                    && a.children.iter().all(|(name, child)| {
                        b.children
                            .get(name)
                            .is_some_and(|other_child| child.is_equal(other_child))
                    })
            }
            (Spec::Alias(a), Spec::Alias(b)) => {
                a.aliased_name == b.aliased_name && a.aliased_kind == b.aliased_kind
            }
            (Spec::Enumeration(a), Spec::Enumeration(b)) => {
                a.name == b.name && a.enumeration_kind == b.enumeration_kind && a.cases == b.cases
            }
            (Spec::TypeGroup(a), Spec::TypeGroup(b)) => a.name == b.name,
            (Spec::Customization(a), Spec::Customization(b)) => {
                a.name == b.name && a.patches == b.patches && targets_equal(&a.target, &b.target)
            }
            _ => false,
        }
    }
}

fn targets_equal(a: &CustomizationTarget, b: &CustomizationTarget) -> bool {
    a.kind == b.kind
        && a.name == b.name
        && a.metadata == b.metadata
        && a.hashes == b.hashes
        && match (&a.children, &b.children) {
            (None, None) => true,
            (Some(x), Some(y)) => {
                x.len() == y.len() && x.iter().zip(y).all(|(fa, fb)| fragments_equal(fa, fb))
            }
            _ => false,
        }
}

fn fragments_equal(a: &BTreeMap<String, Spec>, b: &BTreeMap<String, Spec>) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(name, spec)| b.get(name).is_some_and(|other| spec.is_equal(other)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_spec() -> Spec {
        Spec::Primitive(SpecPrimitive::new(PrimitiveKind::String))
    }

    #[test]
    fn cluster_kind_follows_key_presence() {
        let array = SpecCluster::array(string_spec());
        assert_eq!(array.kind(), SpecKind::Array);

        let dictionary = SpecCluster::dictionary(string_spec(), string_spec());
        assert_eq!(dictionary.kind(), SpecKind::Dictionary);
    }

    #[test]
    fn node_equality_requires_same_child_names() {
        let a = SpecNode::new("A").with_child("x", string_spec());
        let b = SpecNode::new("B").with_child("x", string_spec());
        let c = SpecNode::new("A").with_child("y", string_spec());

        // names differ but shapes agree
        assert!(Spec::Node(a.clone()).is_equal(&Spec::Node(b)));
        // same name, different field set
        assert!(!Spec::Node(a).is_equal(&Spec::Node(c)));
    }

    #[test]
    fn node_equality_is_metadata_blind() {
        let plain = SpecNode::new("T").with_child("x", string_spec());
        let decorated = SpecNode::new("T")
            .with_child("x", string_spec())
            .with_annotation("specmash/root-type", "true");
        let mut described = decorated.clone();
        described.metadata.description = Some("anything".into());

        assert!(Spec::Node(plain.clone()).is_equal(&Spec::Node(decorated)));
        assert!(Spec::Node(plain).is_equal(&Spec::Node(described)));
    }

    #[test]
    fn alias_equality_compares_target_not_name() {
        let a = SpecAlias::new("a", "Target", SpecKind::Object);
        let b = SpecAlias::new("b", "Target", SpecKind::Object);
        let c = SpecAlias::new("a", "Target", SpecKind::Enumeration);

        assert!(Spec::Alias(a.clone()).is_equal(&Spec::Alias(b)));
        assert!(!Spec::Alias(a).is_equal(&Spec::Alias(c)));
    }

    #[test]
    fn enumeration_equality_ignores_extensible() {
        let mut cases = BTreeMap::new();
        cases.insert("ok".to_string(), "OK".to_string());

        let open = SpecEnumeration {
            name: "Status".into(),
            extensible: true,
            enumeration_kind: PrimitiveKind::String,
            cases,
            metadata: SpecMetadata::default(),
        };
        let mut closed = open.clone();
        closed.extensible = false;

        assert!(Spec::Enumeration(open).is_equal(&Spec::Enumeration(closed)));
    }

    #[test]
    fn different_kinds_never_compare_equal() {
        let node = Spec::Node(SpecNode::new("T"));
        assert!(!node.is_equal(&string_spec()));
    }

    #[test]
    fn empty_target_reports_empty() {
        let target = CustomizationTarget::default();
        assert!(target.is_empty());

        let hashed = CustomizationTarget {
            hashes: Some(vec!["abc".into()]),
            ..CustomizationTarget::default()
        };
        assert!(!hashed.is_empty());
        assert!(hashed.is_empty_without_hashes());
    }
}
