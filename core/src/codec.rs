//! Persisted-document layout: every spec round-trips through a
//! self-describing tree keyed by a `kind` discriminator.
//!
//! Decoding dispatches on `kind`; an unknown discriminator is a decode
//! error. Empty metadata is omitted entirely on the wire. The same tree
//! conversion backs [`Spec`]'s `Serialize`/`Deserialize` impls, so specs
//! round-trip through YAML and JSON alike, and backs spec-level merging:
//! two specs merge by merging their trees and decoding the result.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Mapping;
use thiserror::Error;

use crate::metadata::SpecMetadata;
use crate::tree::{self, Tree};
use crate::types::{
    CustomizationPatch, CustomizationTarget, GenerationStyle, MissingBehavior, Spec, SpecAlias,
    SpecCluster, SpecCustomization, SpecEnumeration, SpecKind, SpecNode, SpecPrimitive, TypeGroup,
    TypeGroupSettings, UnknownKindError,
};

/// Errors produced while decoding a persisted spec document.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The document root (or a nested spec) is not a mapping.
    #[error("spec document must be a mapping")]
    ExpectedMapping,

    /// A required field is absent.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// A field is present but has the wrong shape.
    #[error("field `{field}` must be {expected}")]
    FieldShape {
        field: &'static str,
        expected: &'static str,
    },

    /// An unrecognized `kind`, primitive type, or other discriminator.
    #[error(transparent)]
    UnknownDiscriminator(#[from] UnknownKindError),

    /// A document decoded to a different kind than the caller required.
    #[error("expected a {expected} document, found {found}")]
    UnexpectedKind { expected: SpecKind, found: SpecKind },
}

impl Spec {
    /// Encodes this spec as a tree in the persisted layout.
    pub fn to_tree(&self) -> Tree {
        let mut map = Mapping::new();
        put(&mut map, "kind", text(self.kind().as_str()));
        match self {
            Spec::Primitive(primitive) => {
                put(&mut map, "type", text(primitive.primitive.as_str()));
                put_metadata(&mut map, &primitive.metadata);
            }
            Spec::Cluster(cluster) => {
                put_metadata(&mut map, &cluster.metadata);
                if let Some(key) = &cluster.key {
                    put(&mut map, "key", key.to_tree());
                }
                put(&mut map, "element", cluster.element.to_tree());
            }
            Spec::Node(node) => {
                put(&mut map, "name", text(&node.name));
                put_metadata(&mut map, &node.metadata);
                let mut children = Mapping::new();
                for (name, child) in &node.children {
                    put(&mut children, name, child.to_tree());
                }
                put(&mut map, "children", Tree::Mapping(children));
            }
            Spec::Alias(alias) => {
                put(&mut map, "name", text(&alias.name));
                put_metadata(&mut map, &alias.metadata);
                put(&mut map, "aliasedName", text(&alias.aliased_name));
                put(&mut map, "aliasedKind", text(alias.aliased_kind.as_str()));
            }
            Spec::Enumeration(enumeration) => {
                put(&mut map, "name", text(&enumeration.name));
                put(&mut map, "extensible", Tree::Bool(enumeration.extensible));
                put_metadata(&mut map, &enumeration.metadata);
                put(
                    &mut map,
                    "enumerationKind",
                    text(enumeration.enumeration_kind.as_str()),
                );
                let mut cases = Mapping::new();
                for (case, raw) in &enumeration.cases {
                    put(&mut cases, case, text(raw));
                }
                put(&mut map, "cases", Tree::Mapping(cases));
            }
            Spec::TypeGroup(group) => {
                put(&mut map, "name", text(&group.name));
                if !group.settings.is_default() {
                    put(&mut map, "settings", settings_to_tree(&group.settings));
                }
                put_metadata(&mut map, &group.metadata);
            }
            Spec::Customization(customization) => {
                put(&mut map, "name", text(&customization.name));
                put(&mut map, "target", target_to_tree(&customization.target));
                let patches = customization.patches.iter().map(patch_to_tree).collect();
                put(&mut map, "patches", Tree::Sequence(patches));
            }
        }
        Tree::Mapping(map)
    }

    /// Decodes a spec from a tree in the persisted layout.
    pub fn from_tree(tree: &Tree) -> Result<Spec, CodecError> {
        let map = tree.as_mapping().ok_or(CodecError::ExpectedMapping)?;
        let kind: SpecKind = require_str(map, "kind")?.parse()?;

        match kind {
            SpecKind::Primitive => {
                let primitive = require_str(map, "type")?.parse()?;
                Ok(Spec::Primitive(SpecPrimitive {
                    primitive,
                    metadata: metadata_from(map)?,
                }))
            }
            SpecKind::Array | SpecKind::Dictionary => {
                let key = match kind {
                    SpecKind::Dictionary => {
                        let key_tree = field(map, "key").ok_or(CodecError::MissingField("key"))?;
                        Some(Box::new(Spec::from_tree(key_tree)?))
                    }
                    _ => None,
                };
                let element_tree =
                    field(map, "element").ok_or(CodecError::MissingField("element"))?;
                Ok(Spec::Cluster(SpecCluster {
                    key,
                    element: Box::new(Spec::from_tree(element_tree)?),
                    metadata: metadata_from(map)?,
                }))
            }
            SpecKind::Object => {
                let children_tree =
                    field(map, "children").ok_or(CodecError::MissingField("children"))?;
                let children_map = children_tree.as_mapping().ok_or(CodecError::FieldShape {
                    field: "children",
                    expected: "a mapping of field name to spec",
                })?;
                let mut children = BTreeMap::new();
                for (name, child) in children_map {
                    let name = name.as_str().ok_or(CodecError::FieldShape {
                        field: "children",
                        expected: "string field names",
                    })?;
                    children.insert(name.to_string(), Spec::from_tree(child)?);
                }
                Ok(Spec::Node(SpecNode {
                    name: require_str(map, "name")?.to_string(),
                    children,
                    metadata: metadata_from(map)?,
                }))
            }
            SpecKind::Reference => Ok(Spec::Alias(SpecAlias {
                name: require_str(map, "name")?.to_string(),
                aliased_name: require_str(map, "aliasedName")?.to_string(),
                aliased_kind: require_str(map, "aliasedKind")?.parse()?,
                metadata: metadata_from(map)?,
            })),
            SpecKind::Enumeration => {
                let cases_tree = field(map, "cases").ok_or(CodecError::MissingField("cases"))?;
                let cases = string_map_from(cases_tree, "cases")?;
                Ok(Spec::Enumeration(SpecEnumeration {
                    name: require_str(map, "name")?.to_string(),
                    extensible: field(map, "extensible")
                        .and_then(Tree::as_bool)
                        .unwrap_or(false),
                    enumeration_kind: require_str(map, "enumerationKind")?.parse()?,
                    cases,
                    metadata: metadata_from(map)?,
                }))
            }
            SpecKind::TypeGroup => Ok(Spec::TypeGroup(TypeGroup {
                name: require_str(map, "name")?.to_string(),
                settings: match field(map, "settings") {
                    Some(tree) => settings_from_tree(tree)?,
                    None => TypeGroupSettings::default(),
                },
                metadata: metadata_from(map)?,
            })),
            SpecKind::Customization => {
                let target_tree = field(map, "target").ok_or(CodecError::MissingField("target"))?;
                let patches_tree =
                    field(map, "patches").ok_or(CodecError::MissingField("patches"))?;
                let patch_seq = patches_tree.as_sequence().ok_or(CodecError::FieldShape {
                    field: "patches",
                    expected: "a sequence of patches",
                })?;
                let mut patches = Vec::with_capacity(patch_seq.len());
                for patch in patch_seq {
                    patches.push(patch_from_tree(patch)?);
                }
                Ok(Spec::Customization(SpecCustomization {
                    name: require_str(map, "name")?.to_string(),
                    target: target_from_tree(target_tree)?,
                    patches,
                }))
            }
        }
    }

    /// Deep-merges another spec into this one.
    ///
    /// Both sides serialize to their persisted trees, merge under the rules
    /// of [`crate::tree::merge`], and the result decodes back. The `kind`
    /// discriminator is a scalar, so wherever both sides carry one the
    /// incoming side's kind replaces the base's.
    pub fn merge_with(&self, incoming: &Spec) -> Result<Spec, CodecError> {
        let mut base = self.to_tree();
        tree::merge(&mut base, &incoming.to_tree());
        Spec::from_tree(&base)
    }
}

impl SpecNode {
    /// Deep-merges another node into this one. See [`Spec::merge_with`].
    pub fn merge_with(&self, incoming: &SpecNode) -> Result<SpecNode, CodecError> {
        match Spec::Node(self.clone()).merge_with(&Spec::Node(incoming.clone()))? {
            Spec::Node(node) => Ok(node),
            other => Err(CodecError::UnexpectedKind {
                expected: SpecKind::Object,
                found: other.kind(),
            }),
        }
    }
}

impl Serialize for Spec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_tree().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Spec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tree = Tree::deserialize(deserializer)?;
        Spec::from_tree(&tree).map_err(D::Error::custom)
    }
}

fn text(s: &str) -> Tree {
    Tree::String(s.to_string())
}

fn put(map: &mut Mapping, key: &str, value: Tree) {
    map.insert(text(key), value);
}

fn field<'a>(map: &'a Mapping, name: &str) -> Option<&'a Tree> {
    map.get(&text(name))
}

fn require_str<'a>(map: &'a Mapping, name: &'static str) -> Result<&'a str, CodecError> {
    field(map, name)
        .ok_or(CodecError::MissingField(name))?
        .as_str()
        .ok_or(CodecError::FieldShape {
            field: name,
            expected: "a string",
        })
}

fn opt_string(map: &Mapping, name: &'static str) -> Result<Option<String>, CodecError> {
    match field(map, name) {
        None => Ok(None),
        Some(tree) => scalar_to_string(tree)
            .map(Some)
            .ok_or(CodecError::FieldShape {
                field: name,
                expected: "a scalar",
            }),
    }
}

// Annotation and case values are declared as strings but YAML happily
// parses `true` or `3` as non-strings; render such scalars back.
fn scalar_to_string(tree: &Tree) -> Option<String> {
    match tree {
        Tree::String(s) => Some(s.clone()),
        Tree::Bool(b) => Some(b.to_string()),
        Tree::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_map_from(tree: &Tree, name: &'static str) -> Result<BTreeMap<String, String>, CodecError> {
    let map = tree.as_mapping().ok_or(CodecError::FieldShape {
        field: name,
        expected: "a mapping of strings",
    })?;
    let mut out = BTreeMap::new();
    for (key, value) in map {
        let (Some(key), Some(value)) = (key.as_str(), scalar_to_string(value)) else {
            return Err(CodecError::FieldShape {
                field: name,
                expected: "a mapping of strings",
            });
        };
        out.insert(key.to_string(), value);
    }
    Ok(out)
}

fn metadata_to_tree(metadata: &SpecMetadata) -> Tree {
    let mut map = Mapping::new();
    if let Some(description) = &metadata.description {
        put(&mut map, "description", text(description));
    }
    if let Some(hash) = &metadata.hash {
        put(&mut map, "hash", text(hash));
    }
    if !metadata.annotations.is_empty() {
        let mut annotations = Mapping::new();
        for (key, value) in &metadata.annotations {
            put(&mut annotations, key, text(value));
        }
        put(&mut map, "annotations", Tree::Mapping(annotations));
    }
    Tree::Mapping(map)
}

fn put_metadata(map: &mut Mapping, metadata: &SpecMetadata) {
    if !metadata.is_empty() {
        put(map, "metadata", metadata_to_tree(metadata));
    }
}

fn metadata_from(map: &Mapping) -> Result<SpecMetadata, CodecError> {
    match field(map, "metadata") {
        None => Ok(SpecMetadata::default()),
        Some(tree) => metadata_from_tree(tree),
    }
}

fn metadata_from_tree(tree: &Tree) -> Result<SpecMetadata, CodecError> {
    let map = tree.as_mapping().ok_or(CodecError::FieldShape {
        field: "metadata",
        expected: "a mapping",
    })?;
    let annotations = match field(map, "annotations") {
        None => BTreeMap::new(),
        Some(tree) => string_map_from(tree, "annotations")?,
    };
    Ok(SpecMetadata {
        description: opt_string(map, "description")?,
        hash: opt_string(map, "hash")?,
        annotations,
    })
}

fn settings_to_tree(settings: &TypeGroupSettings) -> Tree {
    let mut map = Mapping::new();
    put(
        &mut map,
        "generationStyle",
        text(settings.generation_style.as_str()),
    );
    if !settings.explicitly_extends.is_empty() {
        let extends = settings
            .explicitly_extends
            .iter()
            .map(|name| text(name))
            .collect();
        put(&mut map, "explicitlyExtends", Tree::Sequence(extends));
    }
    Tree::Mapping(map)
}

fn settings_from_tree(tree: &Tree) -> Result<TypeGroupSettings, CodecError> {
    let map = tree.as_mapping().ok_or(CodecError::FieldShape {
        field: "settings",
        expected: "a mapping",
    })?;
    let generation_style = match field(map, "generationStyle") {
        None => GenerationStyle::default(),
        Some(tree) => tree
            .as_str()
            .ok_or(CodecError::FieldShape {
                field: "generationStyle",
                expected: "a string",
            })?
            .parse()?,
    };
    let explicitly_extends = match field(map, "explicitlyExtends") {
        None => Vec::new(),
        Some(tree) => {
            let seq = tree.as_sequence().ok_or(CodecError::FieldShape {
                field: "explicitlyExtends",
                expected: "a sequence of type names",
            })?;
            let mut names = Vec::with_capacity(seq.len());
            for item in seq {
                names.push(
                    item.as_str()
                        .ok_or(CodecError::FieldShape {
                            field: "explicitlyExtends",
                            expected: "a sequence of type names",
                        })?
                        .to_string(),
                );
            }
            names
        }
    };
    Ok(TypeGroupSettings {
        generation_style,
        explicitly_extends,
    })
}

fn target_to_tree(target: &CustomizationTarget) -> Tree {
    let mut map = Mapping::new();
    if let Some(kind) = target.kind {
        put(&mut map, "kind", text(kind.as_str()));
    }
    if let Some(name) = &target.name {
        put(&mut map, "name", text(name));
    }
    if let Some(metadata) = &target.metadata {
        put(&mut map, "metadata", metadata_to_tree(metadata));
    }
    if let Some(hashes) = &target.hashes {
        let hashes = hashes.iter().map(|hash| text(hash)).collect();
        put(&mut map, "hashes", Tree::Sequence(hashes));
    }
    if let Some(fragments) = &target.children {
        let fragments = fragments
            .iter()
            .map(|fragment| {
                let mut map = Mapping::new();
                for (name, spec) in fragment {
                    put(&mut map, name, spec.to_tree());
                }
                Tree::Mapping(map)
            })
            .collect();
        put(&mut map, "children", Tree::Sequence(fragments));
    }
    Tree::Mapping(map)
}

fn target_from_tree(tree: &Tree) -> Result<CustomizationTarget, CodecError> {
    let map = tree.as_mapping().ok_or(CodecError::FieldShape {
        field: "target",
        expected: "a mapping",
    })?;
    let kind = match field(map, "kind") {
        None => None,
        Some(tree) => Some(
            tree.as_str()
                .ok_or(CodecError::FieldShape {
                    field: "kind",
                    expected: "a string",
                })?
                .parse::<SpecKind>()?,
        ),
    };
    let metadata = match field(map, "metadata") {
        None => None,
        Some(tree) => Some(metadata_from_tree(tree)?),
    };
    let hashes = match field(map, "hashes") {
        None => None,
        Some(tree) => {
            let seq = tree.as_sequence().ok_or(CodecError::FieldShape {
                field: "hashes",
                expected: "a sequence of hashes",
            })?;
            let mut hashes = Vec::with_capacity(seq.len());
            for item in seq {
                hashes.push(
                    item.as_str()
                        .ok_or(CodecError::FieldShape {
                            field: "hashes",
                            expected: "a sequence of hashes",
                        })?
                        .to_string(),
                );
            }
            Some(hashes)
        }
    };
    // a single fragment mapping or a sequence of them
    let children = match field(map, "children") {
        None => None,
        Some(Tree::Mapping(fragment)) => {
            Some(vec![fragment_from_mapping(fragment)?])
        }
        Some(Tree::Sequence(fragments)) => {
            let mut out = Vec::with_capacity(fragments.len());
            for fragment in fragments {
                let fragment = fragment.as_mapping().ok_or(CodecError::FieldShape {
                    field: "children",
                    expected: "fragment mappings",
                })?;
                out.push(fragment_from_mapping(fragment)?);
            }
            Some(out)
        }
        Some(_) => {
            return Err(CodecError::FieldShape {
                field: "children",
                expected: "a fragment mapping or a sequence of them",
            });
        }
    };
    Ok(CustomizationTarget {
        kind,
        name: opt_string(map, "name")?,
        metadata,
        hashes,
        children,
    })
}

fn fragment_from_mapping(fragment: &Mapping) -> Result<BTreeMap<String, Spec>, CodecError> {
    let mut out = BTreeMap::new();
    for (name, spec) in fragment {
        let name = name.as_str().ok_or(CodecError::FieldShape {
            field: "children",
            expected: "string field names",
        })?;
        out.insert(name.to_string(), Spec::from_tree(spec)?);
    }
    Ok(out)
}

fn patch_to_tree(patch: &CustomizationPatch) -> Tree {
    let mut map = Mapping::new();
    put(&mut map, "op", text(patch.operation.as_str()));
    put(&mut map, "path", text(&patch.path));
    if patch.missing_behavior == MissingBehavior::Skip {
        put(&mut map, "missing-behavior", text("skip"));
    }
    if let Some(value) = &patch.value {
        put(&mut map, "value", value.clone());
    }
    Tree::Mapping(map)
}

fn patch_from_tree(tree: &Tree) -> Result<CustomizationPatch, CodecError> {
    let map = tree.as_mapping().ok_or(CodecError::FieldShape {
        field: "patches",
        expected: "patch mappings",
    })?;
    let missing_behavior = match field(map, "missing-behavior") {
        None => MissingBehavior::default(),
        Some(tree) => tree
            .as_str()
            .ok_or(CodecError::FieldShape {
                field: "missing-behavior",
                expected: "throw or skip",
            })?
            .parse()?,
    };
    Ok(CustomizationPatch {
        operation: require_str(map, "op")?.parse()?,
        path: require_str(map, "path")?.to_string(),
        missing_behavior,
        value: field(map, "value").cloned(),
    })
}
