//! The standard annotation processors.

use std::collections::BTreeMap;

use serde::Deserialize;

use specmash_core::{
    PrimitiveKind, Spec, SpecAlias, SpecEnumeration, SpecKind, SpecMetadata,
};

use crate::keys;
use crate::pipeline::{AnnotationProcessor, PipelineDelegate};

/// Extracts a nested node into a standalone root type, leaving an alias in
/// its place.
///
/// A node annotated with [`keys::EXTRACTED_TYPE_NAME`] is replaced by an
/// alias named after the original node and pointing at the lift name; a
/// clone of the node, renamed to the lift name and stripped of the
/// annotation, is reported as a newly created spec.
pub struct TypeLiftingProcessor;

impl AnnotationProcessor for TypeLiftingProcessor {
    fn annotation_keys(&self) -> &[&'static str] {
        &[keys::EXTRACTED_TYPE_NAME]
    }

    fn kinds(&self) -> &[SpecKind] {
        &[SpecKind::Object]
    }

    fn process(&self, spec: Spec, delegate: &mut dyn PipelineDelegate) -> Option<Spec> {
        let Spec::Node(node) = spec else {
            return Some(spec);
        };
        let Some(lift_name) = node.metadata.annotation(keys::EXTRACTED_TYPE_NAME) else {
            return Some(Spec::Node(node));
        };
        let lift_name = lift_name.to_string();

        let mut lifted = node.clone();
        lifted.name = lift_name.clone();
        lifted.metadata.strip_annotations(&[keys::EXTRACTED_TYPE_NAME]);
        delegate.created_spec(Spec::Node(lifted));

        let mut alias = SpecAlias::new(node.name.clone(), lift_name, SpecKind::Object);
        alias.metadata.inherit_from(&node.metadata);
        alias.metadata.strip_annotations(&[keys::EXTRACTED_TYPE_NAME]);
        Some(Spec::Alias(alias))
    }
}

// The annotation payload of an open/closed enumeration declaration.
#[derive(Debug, Deserialize)]
struct EnumDeclaration {
    #[serde(rename = "enumerationKind")]
    enumeration_kind: PrimitiveKind,
    #[serde(default)]
    metadata: Option<SpecMetadata>,
    name: String,
    cases: BTreeMap<String, String>,
}

/// Turns an annotated primitive into an alias to a synthesized enumeration.
///
/// The [`keys::OPEN_ENUMERATION`] / [`keys::CLOSED_ENUMERATION`] annotation
/// value holds a YAML enum declaration. On a successful parse the
/// enumeration is reported as a created spec (extensible iff the open key
/// was used) and the primitive becomes an alias to it, inheriting the
/// primitive's description and annotations minus the two enum keys.
///
/// Soft failures: a malformed declaration passes the primitive through
/// unchanged, and so does carrying *both* keys at once — the ambiguity is
/// treated as neither.
pub struct EnumSynthesisProcessor;

impl AnnotationProcessor for EnumSynthesisProcessor {
    fn annotation_keys(&self) -> &[&'static str] {
        &[keys::OPEN_ENUMERATION, keys::CLOSED_ENUMERATION]
    }

    fn kinds(&self) -> &[SpecKind] {
        &[SpecKind::Primitive]
    }

    fn process(&self, spec: Spec, delegate: &mut dyn PipelineDelegate) -> Option<Spec> {
        let Spec::Primitive(primitive) = &spec else {
            return Some(spec);
        };

        let open = primitive
            .metadata
            .annotation(keys::OPEN_ENUMERATION)
            .map(String::from);
        let closed = primitive
            .metadata
            .annotation(keys::CLOSED_ENUMERATION)
            .map(String::from);
        let (declaration_text, extensible) = match (open, closed) {
            (Some(_), Some(_)) | (None, None) => return Some(spec),
            (Some(value), None) => (value, true),
            (None, Some(value)) => (value, false),
        };

        let Ok(declaration) = serde_yaml::from_str::<EnumDeclaration>(&declaration_text) else {
            return Some(spec);
        };

        let enumeration = SpecEnumeration {
            name: declaration.name.clone(),
            extensible,
            enumeration_kind: declaration.enumeration_kind,
            cases: declaration.cases,
            metadata: declaration.metadata.unwrap_or_default(),
        };

        let mut alias = SpecAlias::new(
            declaration.name.clone(),
            declaration.name,
            SpecKind::Enumeration,
        );
        alias.metadata.inherit_from(&primitive.metadata);
        alias
            .metadata
            .strip_annotations(&[keys::OPEN_ENUMERATION, keys::CLOSED_ENUMERATION]);

        delegate.created_spec(Spec::Enumeration(enumeration));
        Some(Spec::Alias(alias))
    }
}

/// Reports node children that belong to a type-group aggregate.
///
/// Kind-only and purely observational: every node passes through, and each
/// immediate child carrying [`keys::TYPE_GROUP`] is reported (field name
/// plus an owned snapshot) under the annotation's value.
pub struct TypeGroupCollector;

impl AnnotationProcessor for TypeGroupCollector {
    fn kinds(&self) -> &[SpecKind] {
        &[SpecKind::Object]
    }

    fn process(&self, spec: Spec, delegate: &mut dyn PipelineDelegate) -> Option<Spec> {
        if let Spec::Node(node) = &spec {
            for (field, child) in &node.children {
                let Some(group) = child.metadata().and_then(|m| m.annotation(keys::TYPE_GROUP))
                else {
                    continue;
                };
                delegate.found_group_member(group, field, child.clone());
            }
        }
        Some(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specmash_core::{SpecNode, SpecPrimitive};

    #[derive(Default)]
    struct Recorder {
        created: Vec<Spec>,
        group_members: Vec<(String, String, Spec)>,
    }

    impl PipelineDelegate for Recorder {
        fn created_spec(&mut self, spec: Spec) {
            self.created.push(spec);
        }

        fn found_group_member(&mut self, group: &str, field: &str, spec: Spec) {
            self.group_members
                .push((group.to_string(), field.to_string(), spec));
        }
    }

    fn enum_declaration() -> String {
        "enumerationKind: String\nname: Status\ncases:\n  ok: OK\n  bad: BAD\n".to_string()
    }

    #[test]
    fn lifting_replaces_node_with_alias_and_reports_the_lifted_type() {
        let node = SpecNode::new("artwork")
            .with_child(
                "url",
                Spec::Primitive(SpecPrimitive::new(PrimitiveKind::String)),
            )
            .with_annotation(keys::EXTRACTED_TYPE_NAME, "Artwork");

        let mut recorder = Recorder::default();
        let result = TypeLiftingProcessor
            .process(Spec::Node(node), &mut recorder)
            .unwrap();

        let Spec::Alias(alias) = result else {
            panic!("expected an alias");
        };
        assert_eq!(alias.name, "artwork");
        assert_eq!(alias.aliased_name, "Artwork");
        assert_eq!(alias.aliased_kind, SpecKind::Object);
        assert!(alias.metadata.annotation(keys::EXTRACTED_TYPE_NAME).is_none());

        assert_eq!(recorder.created.len(), 1);
        let lifted = recorder.created[0].as_node().unwrap();
        assert_eq!(lifted.name, "Artwork");
        assert!(lifted.children.contains_key("url"));
        assert!(lifted.metadata.annotation(keys::EXTRACTED_TYPE_NAME).is_none());
    }

    #[test]
    fn closed_enum_synthesis_creates_an_inextensible_enumeration() {
        let mut primitive = SpecPrimitive::new(PrimitiveKind::String);
        primitive.metadata.description = Some("current status".into());
        primitive
            .metadata
            .annotations
            .insert(keys::CLOSED_ENUMERATION.into(), enum_declaration());

        let mut recorder = Recorder::default();
        let result = EnumSynthesisProcessor
            .process(Spec::Primitive(primitive), &mut recorder)
            .unwrap();

        let Spec::Alias(alias) = result else {
            panic!("expected an alias");
        };
        assert_eq!(alias.aliased_name, "Status");
        assert_eq!(alias.aliased_kind, SpecKind::Enumeration);
        assert_eq!(alias.metadata.description.as_deref(), Some("current status"));
        assert!(alias.metadata.annotation(keys::CLOSED_ENUMERATION).is_none());

        let Spec::Enumeration(enumeration) = &recorder.created[0] else {
            panic!("expected an enumeration");
        };
        assert!(!enumeration.extensible);
        assert_eq!(enumeration.cases["ok"], "OK");
        assert_eq!(enumeration.cases["bad"], "BAD");
    }

    #[test]
    fn open_enum_synthesis_is_extensible() {
        let mut primitive = SpecPrimitive::new(PrimitiveKind::String);
        primitive
            .metadata
            .annotations
            .insert(keys::OPEN_ENUMERATION.into(), enum_declaration());

        let mut recorder = Recorder::default();
        EnumSynthesisProcessor
            .process(Spec::Primitive(primitive), &mut recorder)
            .unwrap();

        let Spec::Enumeration(enumeration) = &recorder.created[0] else {
            panic!("expected an enumeration");
        };
        assert!(enumeration.extensible);
    }

    #[test]
    fn both_enum_keys_present_is_treated_as_neither() {
        let mut primitive = SpecPrimitive::new(PrimitiveKind::String);
        primitive
            .metadata
            .annotations
            .insert(keys::OPEN_ENUMERATION.into(), enum_declaration());
        primitive
            .metadata
            .annotations
            .insert(keys::CLOSED_ENUMERATION.into(), enum_declaration());

        let mut recorder = Recorder::default();
        let result = EnumSynthesisProcessor
            .process(Spec::Primitive(primitive.clone()), &mut recorder)
            .unwrap();

        // passes through unchanged, with both annotations intact
        assert!(result.is_equal(&Spec::Primitive(primitive)));
        assert!(result
            .metadata()
            .unwrap()
            .annotation(keys::OPEN_ENUMERATION)
            .is_some());
        assert!(recorder.created.is_empty());
    }

    #[test]
    fn malformed_enum_declaration_passes_through_unchanged() {
        let mut primitive = SpecPrimitive::new(PrimitiveKind::String);
        primitive
            .metadata
            .annotations
            .insert(keys::CLOSED_ENUMERATION.into(), "cases: [not, a, mapping]".into());

        let mut recorder = Recorder::default();
        let result = EnumSynthesisProcessor
            .process(Spec::Primitive(primitive.clone()), &mut recorder)
            .unwrap();

        assert!(result.is_equal(&Spec::Primitive(primitive)));
        assert!(recorder.created.is_empty());
    }

    #[test]
    fn group_collector_reports_annotated_children_without_mutation() {
        let annotated_child = {
            let mut child = SpecNode::new("addr");
            child
                .metadata
                .annotations
                .insert(keys::TYPE_GROUP.into(), "Address".into());
            Spec::Node(child)
        };
        let node = SpecNode::new("Person")
            .with_child("addr", annotated_child)
            .with_child(
                "name",
                Spec::Primitive(SpecPrimitive::new(PrimitiveKind::String)),
            );

        let mut recorder = Recorder::default();
        let result = TypeGroupCollector
            .process(Spec::Node(node.clone()), &mut recorder)
            .unwrap();

        assert!(result.is_equal(&Spec::Node(node)));
        assert_eq!(recorder.group_members.len(), 1);
        let (group, field, _) = &recorder.group_members[0];
        assert_eq!(group, "Address");
        assert_eq!(field, "addr");
    }
}
