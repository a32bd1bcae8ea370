//! The customization engine: select nodes by structural criteria, then
//! apply ordered path-based patches to clones of them.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use specmash_core::{
    CodecError, CustomizationPatch, CustomizationTarget, MissingBehavior, PatchOperation, Spec,
    SpecCustomization, SpecKind, SpecNode, Tree, TreeShape, empty_of, shape_of,
};

use crate::registry::SpecRegistry;

/// A patch path failed to resolve against a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// A segment tried to descend into a scalar.
    #[error("cannot descend into a scalar at `{path}`")]
    ScalarAccess { path: String },

    /// A sequence was subscripted with a non-numeric segment.
    #[error("sequence index `{segment}` in `{path}` is not numeric")]
    SequenceIndex { path: String, segment: String },

    /// Resolution would have had to create more than the final segment.
    #[error("`{path}` would require creating more than its final segment")]
    AutoCreateDepth { path: String },

    /// The path does not resolve and creation was not permitted.
    #[error("`{path}` does not resolve")]
    Missing { path: String },

    /// An `append` landed on something other than a sequence.
    #[error("`{path}` does not refer to a sequence")]
    NotASequence { path: String },
}

/// Errors raised while applying customizations.
#[derive(Debug, Error)]
pub enum CustomizeError {
    /// A patch with `missing_behavior: throw` failed to resolve its path.
    #[error("customization `{name}` failed to apply its patch at `{path}`")]
    Patch {
        name: String,
        path: String,
        #[source]
        source: PathError,
    },

    /// The patched document no longer decodes as a spec.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The patched document decoded, but not as a node.
    #[error("customization `{name}` produced a non-node document ({found})")]
    NotANode { name: String, found: SpecKind },
}

/// Applies loaded customizations to clones of an input node set.
///
/// Customizations are keyed by name; overlapping customizations apply in
/// ascending name order, each seeing the cumulative result of the previous
/// ones. Input nodes are never mutated.
#[derive(Debug, Default)]
pub struct CustomizationEngine {
    customizations: BTreeMap<String, SpecCustomization>,
}

impl CustomizationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects every customization stored in a registry.
    pub fn from_registry(registry: &SpecRegistry) -> Self {
        let mut engine = Self::new();
        for customization in registry.customizations() {
            engine.load(customization.clone());
        }
        engine
    }

    /// Loads one customization, replacing any previous one of the same name.
    pub fn load(&mut self, customization: SpecCustomization) {
        self.customizations
            .insert(customization.name.clone(), customization);
    }

    pub fn len(&self) -> usize {
        self.customizations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customizations.is_empty()
    }

    /// Clones the input nodes and applies every matching customization to
    /// each clone. The originals are untouched.
    pub fn apply(&self, nodes: &[SpecNode]) -> Result<Vec<SpecNode>, CustomizeError> {
        let mut clones: Vec<SpecNode> = nodes.to_vec();
        for customization in self.customizations.values() {
            for node in clones.iter_mut() {
                if target_matches(&customization.target, node) {
                    debug!(
                        customization = %customization.name,
                        node = %node.name,
                        "applying customization"
                    );
                    *node = apply_customization(customization, node)?;
                }
            }
        }
        Ok(clones)
    }
}

/// Whether a target's criteria select the given node.
///
/// A target with zero criteria matches nothing. Content-hash membership
/// short-circuits to a match on its own; every other declared criterion
/// must hold simultaneously.
pub fn target_matches(target: &CustomizationTarget, node: &SpecNode) -> bool {
    if target.is_empty() {
        return false;
    }

    if let Some(hashes) = &target.hashes {
        if hashes.iter().any(|hash| *hash == node.content_hash()) {
            return true;
        }
    }

    if target.is_empty_without_hashes() {
        return false;
    }

    if let Some(fragments) = &target.children {
        if !fragments.is_empty() {
            let any_fragment_matches = fragments.iter().any(|fragment| {
                fragment.iter().all(|(field, expected)| {
                    node.children
                        .get(field)
                        .is_some_and(|child| child.is_equal(expected))
                })
            });
            if !any_fragment_matches {
                return false;
            }
        }
    }

    if let Some(name) = &target.name {
        if node.name != *name {
            return false;
        }
    }

    if let Some(kind) = target.kind {
        if kind != SpecKind::Object {
            return false;
        }
    }

    if let Some(metadata) = &target.metadata {
        if let Some(hash) = &metadata.hash {
            if node.metadata.hash.as_ref() != Some(hash) {
                return false;
            }
        }
        for (key, value) in &metadata.annotations {
            if node.metadata.annotations.get(key) != Some(value) {
                return false;
            }
        }
    }

    true
}

/// Applies one customization's patches, in declared order, to a clone of
/// the node.
pub fn apply_customization(
    customization: &SpecCustomization,
    node: &SpecNode,
) -> Result<SpecNode, CustomizeError> {
    let mut tree = Spec::Node(node.clone()).to_tree();

    for patch in &customization.patches {
        if let Err(error) = apply_patch(&mut tree, patch) {
            match patch.missing_behavior {
                MissingBehavior::Skip => {
                    debug!(
                        customization = %customization.name,
                        path = %patch.path,
                        %error,
                        "skipping unresolvable patch"
                    );
                    continue;
                }
                MissingBehavior::Throw => {
                    return Err(CustomizeError::Patch {
                        name: customization.name.clone(),
                        path: patch.path.clone(),
                        source: error,
                    });
                }
            }
        }
    }

    match Spec::from_tree(&tree)? {
        Spec::Node(node) => Ok(node),
        other => Err(CustomizeError::NotANode {
            name: customization.name.clone(),
            found: other.kind(),
        }),
    }
}

/// Applies one patch to a document.
pub fn apply_patch(document: &mut Tree, patch: &CustomizationPatch) -> Result<(), PathError> {
    let segments = split_path(&patch.path);
    match patch.operation {
        PatchOperation::Add | PatchOperation::Replace => {
            let value = patch.value.clone().unwrap_or(Tree::Null);
            let slot = locate(document, &patch.path, &segments, shape_of(&value), true)?;
            *slot = value;
            Ok(())
        }
        PatchOperation::Append => {
            let value = patch.value.clone().unwrap_or(Tree::Null);
            let slot = locate(document, &patch.path, &segments, TreeShape::Sequence, true)?;
            match slot {
                Tree::Sequence(sequence) => {
                    sequence.push(value);
                    Ok(())
                }
                _ => Err(PathError::NotASequence {
                    path: patch.path.clone(),
                }),
            }
        }
        PatchOperation::Remove => {
            let Some((last, parents)) = segments.split_last() else {
                return Ok(());
            };
            let parent = if parents.is_empty() {
                document
            } else {
                locate(document, &patch.path, parents, TreeShape::Scalar, false)?
            };
            remove_segment(parent, last, &patch.path)
        }
    }
}

// `/`-delimited with the two-character `~1` escape for literal slashes.
fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.replace("~1", "/"))
        .collect()
}

// Walks the document along the segments, returning the addressed slot.
// With `auto_create`, only the final segment may be created — shaped by
// `intent` — and a deeper miss is an error.
fn locate<'t>(
    root: &'t mut Tree,
    path: &str,
    segments: &[String],
    intent: TreeShape,
    auto_create: bool,
) -> Result<&'t mut Tree, PathError> {
    let mut current = root;
    for (index, segment) in segments.iter().enumerate() {
        let last = index + 1 == segments.len();
        match current {
            Tree::Mapping(map) => {
                let key = Tree::String(segment.clone());
                if !map.contains_key(&key) {
                    if last && auto_create {
                        map.insert(key.clone(), empty_of(intent));
                    } else if auto_create {
                        return Err(PathError::AutoCreateDepth {
                            path: path.to_string(),
                        });
                    } else {
                        return Err(PathError::Missing {
                            path: path.to_string(),
                        });
                    }
                }
                current = map.get_mut(&key).ok_or_else(|| PathError::Missing {
                    path: path.to_string(),
                })?;
            }
            Tree::Sequence(sequence) => {
                let position: usize =
                    segment.parse().map_err(|_| PathError::SequenceIndex {
                        path: path.to_string(),
                        segment: segment.clone(),
                    })?;
                if position >= sequence.len() {
                    if last && auto_create && position == sequence.len() {
                        sequence.push(empty_of(intent));
                    } else if !last && auto_create {
                        return Err(PathError::AutoCreateDepth {
                            path: path.to_string(),
                        });
                    } else {
                        return Err(PathError::Missing {
                            path: path.to_string(),
                        });
                    }
                }
                current = &mut sequence[position];
            }
            _ => {
                return Err(PathError::ScalarAccess {
                    path: path.to_string(),
                });
            }
        }
    }
    Ok(current)
}

// Deletes the final segment from its parent. Absent mapping keys and
// out-of-range indices are no-ops; only shape violations are errors.
fn remove_segment(parent: &mut Tree, segment: &str, path: &str) -> Result<(), PathError> {
    match parent {
        Tree::Mapping(map) => {
            map.remove(&Tree::String(segment.to_string()));
            Ok(())
        }
        Tree::Sequence(sequence) => {
            let position: usize = segment.parse().map_err(|_| PathError::SequenceIndex {
                path: path.to_string(),
                segment: segment.to_string(),
            })?;
            if position < sequence.len() {
                sequence.remove(position);
            }
            Ok(())
        }
        _ => Err(PathError::ScalarAccess {
            path: path.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    fn doc(yaml: &str) -> Tree {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn patch(operation: PatchOperation, path: &str, value: Option<Tree>) -> CustomizationPatch {
        CustomizationPatch {
            operation,
            path: path.to_string(),
            missing_behavior: MissingBehavior::Throw,
            value,
        }
    }

    #[test]
    fn add_then_remove_roundtrips_an_empty_mapping() {
        let mut document = doc("{}");
        apply_patch(
            &mut document,
            &patch(PatchOperation::Add, "/foo", Some(Value::String("x".into()))),
        )
        .unwrap();
        assert_eq!(document, doc("{foo: x}"));

        apply_patch(&mut document, &patch(PatchOperation::Remove, "/foo", None)).unwrap();
        assert_eq!(document, doc("{}"));
    }

    #[test]
    fn escaped_segments_decode_to_literal_slashes() {
        let mut document = doc("{}");
        apply_patch(
            &mut document,
            &patch(
                PatchOperation::Add,
                "/specmash~1root-type",
                Some(Value::Bool(true)),
            ),
        )
        .unwrap();
        assert_eq!(document, doc("{specmash/root-type: true}"));
    }

    #[test]
    fn deep_auto_creation_is_an_error() {
        let mut document = doc("{}");
        let error = apply_patch(
            &mut document,
            &patch(
                PatchOperation::Replace,
                "/a/b/c",
                Some(Value::String("x".into())),
            ),
        )
        .unwrap_err();
        assert!(matches!(error, PathError::AutoCreateDepth { .. }));
    }

    #[test]
    fn scalar_subscripting_is_an_error() {
        let mut document = doc("{a: plain}");
        let error = apply_patch(
            &mut document,
            &patch(PatchOperation::Replace, "/a/b", Some(Value::Null)),
        )
        .unwrap_err();
        assert!(matches!(error, PathError::ScalarAccess { .. }));
    }

    #[test]
    fn non_numeric_sequence_index_is_an_error() {
        let mut document = doc("{xs: [1, 2]}");
        let error = apply_patch(
            &mut document,
            &patch(PatchOperation::Replace, "/xs/first", Some(Value::Null)),
        )
        .unwrap_err();
        assert!(matches!(error, PathError::SequenceIndex { .. }));
    }

    #[test]
    fn append_creates_the_sequence_when_absent() {
        let mut document = doc("{}");
        apply_patch(
            &mut document,
            &patch(PatchOperation::Append, "/xs", Some(Value::from(1))),
        )
        .unwrap();
        apply_patch(
            &mut document,
            &patch(PatchOperation::Append, "/xs", Some(Value::from(2))),
        )
        .unwrap();
        assert_eq!(document, doc("{xs: [1, 2]}"));
    }

    #[test]
    fn append_to_a_non_sequence_is_an_error() {
        let mut document = doc("{xs: plain}");
        let error = apply_patch(
            &mut document,
            &patch(PatchOperation::Append, "/xs", Some(Value::from(1))),
        )
        .unwrap_err();
        assert!(matches!(error, PathError::NotASequence { .. }));
    }

    #[test]
    fn remove_never_auto_creates_its_parent() {
        let mut document = doc("{}");
        let error = apply_patch(
            &mut document,
            &patch(PatchOperation::Remove, "/missing/field", None),
        )
        .unwrap_err();
        assert!(matches!(error, PathError::Missing { .. }));
        assert_eq!(document, doc("{}"));
    }

    #[test]
    fn remove_of_an_absent_final_key_is_a_no_op() {
        let mut document = doc("{a: 1}");
        apply_patch(&mut document, &patch(PatchOperation::Remove, "/b", None)).unwrap();
        assert_eq!(document, doc("{a: 1}"));
    }

    #[test]
    fn sequence_indices_resolve_in_paths() {
        let mut document = doc("{xs: [{a: 1}, {a: 2}]}");
        apply_patch(
            &mut document,
            &patch(PatchOperation::Replace, "/xs/1/a", Some(Value::from(9))),
        )
        .unwrap();
        assert_eq!(document, doc("{xs: [{a: 1}, {a: 9}]}"));

        apply_patch(&mut document, &patch(PatchOperation::Remove, "/xs/0", None)).unwrap();
        assert_eq!(document, doc("{xs: [{a: 9}]}"));
    }
}
