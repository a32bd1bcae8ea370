//! Round-trip coverage for the persisted document layout.

use std::collections::BTreeMap;

use specmash_core::{
    CustomizationPatch, CustomizationTarget, GenerationStyle, MissingBehavior, PatchOperation,
    PrimitiveKind, Spec, SpecAlias, SpecCluster, SpecCustomization, SpecEnumeration, SpecKind,
    SpecMetadata, SpecNode, SpecPrimitive, Tree, TypeGroup, TypeGroupSettings,
};

fn roundtrip(spec: &Spec) -> Spec {
    let yaml = serde_yaml::to_string(spec).unwrap();
    serde_yaml::from_str(&yaml).unwrap()
}

fn string_primitive() -> Spec {
    Spec::Primitive(SpecPrimitive::new(PrimitiveKind::String))
}

#[test]
fn primitive_roundtrip() {
    let mut primitive = SpecPrimitive::new(PrimitiveKind::Date);
    primitive.metadata.description = Some("release date".into());
    let spec = Spec::Primitive(primitive);

    let decoded = roundtrip(&spec);
    assert!(decoded.is_equal(&spec));
    assert_eq!(
        decoded.metadata().unwrap().description.as_deref(),
        Some("release date")
    );
}

#[test]
fn cluster_roundtrip_preserves_shape() {
    let array = Spec::Cluster(SpecCluster::array(string_primitive()));
    assert_eq!(roundtrip(&array).kind(), SpecKind::Array);

    let dictionary = Spec::Cluster(SpecCluster::dictionary(
        string_primitive(),
        Spec::Node(SpecNode::new("Entry").with_child("id", string_primitive())),
    ));
    let decoded = roundtrip(&dictionary);
    assert_eq!(decoded.kind(), SpecKind::Dictionary);
    assert!(decoded.is_equal(&dictionary));
}

#[test]
fn node_roundtrip_with_annotations() {
    let node = SpecNode::new("Album")
        .with_child("title", string_primitive())
        .with_child(
            "tracks",
            Spec::Cluster(SpecCluster::array(Spec::Node(
                SpecNode::new("Track").with_child("title", string_primitive()),
            ))),
        )
        .with_annotation("specmash/root-type", "true");
    let spec = Spec::Node(node);

    let decoded = roundtrip(&spec);
    assert!(decoded.is_equal(&spec));
    assert_eq!(
        decoded.metadata().unwrap().annotation("specmash/root-type"),
        Some("true")
    );
}

#[test]
fn alias_roundtrip() {
    let spec = Spec::Alias(SpecAlias::new("artwork", "Artwork", SpecKind::Object));
    let decoded = roundtrip(&spec);
    assert!(decoded.is_equal(&spec));
    assert_eq!(decoded.name(), Some("artwork"));
}

#[test]
fn enumeration_roundtrip_keeps_extensible() {
    let mut cases = BTreeMap::new();
    cases.insert("ok".to_string(), "OK".to_string());
    cases.insert("bad".to_string(), "BAD".to_string());
    let spec = Spec::Enumeration(SpecEnumeration {
        name: "Status".into(),
        extensible: true,
        enumeration_kind: PrimitiveKind::String,
        cases,
        metadata: SpecMetadata::default(),
    });

    let Spec::Enumeration(decoded) = roundtrip(&spec) else {
        panic!("expected an enumeration");
    };
    assert!(decoded.extensible);
    assert_eq!(decoded.cases.len(), 2);
}

#[test]
fn type_group_roundtrip_with_settings() {
    let spec = Spec::TypeGroup(TypeGroup {
        name: "Address".into(),
        settings: TypeGroupSettings {
            generation_style: GenerationStyle::Abstract,
            explicitly_extends: vec!["Location".into()],
        },
        metadata: SpecMetadata::default(),
    });

    let Spec::TypeGroup(decoded) = roundtrip(&spec) else {
        panic!("expected a type group");
    };
    assert_eq!(decoded.settings.generation_style, GenerationStyle::Abstract);
    assert_eq!(decoded.settings.explicitly_extends, vec!["Location"]);
}

#[test]
fn type_group_default_settings_are_omitted() {
    let spec = Spec::TypeGroup(TypeGroup::new("Plain"));
    let yaml = serde_yaml::to_string(&spec).unwrap();
    assert!(!yaml.contains("settings"));

    let Spec::TypeGroup(decoded) = roundtrip(&spec) else {
        panic!("expected a type group");
    };
    assert!(decoded.settings.is_default());
}

#[test]
fn customization_roundtrip() {
    let mut fragment = BTreeMap::new();
    fragment.insert("id".to_string(), string_primitive());

    let spec = Spec::Customization(SpecCustomization {
        name: "retitle".into(),
        target: CustomizationTarget {
            name: Some("Album".into()),
            kind: Some(SpecKind::Object),
            hashes: Some(vec!["cafe".into()]),
            children: Some(vec![fragment]),
            metadata: None,
        },
        patches: vec![
            CustomizationPatch {
                operation: PatchOperation::Replace,
                path: "children/title/metadata/description".into(),
                missing_behavior: MissingBehavior::Skip,
                value: Some(Tree::String("the title".into())),
            },
            CustomizationPatch {
                operation: PatchOperation::Remove,
                path: "children/legacy".into(),
                missing_behavior: MissingBehavior::Throw,
                value: None,
            },
        ],
    });

    let decoded = roundtrip(&spec);
    assert!(decoded.is_equal(&spec));

    let Spec::Customization(decoded) = decoded else {
        panic!("expected a customization");
    };
    assert_eq!(decoded.patches[0].missing_behavior, MissingBehavior::Skip);
    assert_eq!(decoded.patches[1].missing_behavior, MissingBehavior::Throw);
}

#[test]
fn specs_roundtrip_through_json_too() {
    let node = Spec::Node(
        SpecNode::new("Person")
            .with_child("name", string_primitive())
            .with_child(
                "age",
                Spec::Primitive(SpecPrimitive::new(PrimitiveKind::Integer)),
            ),
    );

    let json = serde_json::to_string(&node).unwrap();
    let decoded: Spec = serde_json::from_str(&json).unwrap();
    assert!(decoded.is_equal(&node));
}

#[test]
fn content_hash_survives_roundtrip() {
    let node = Spec::Node(
        SpecNode::new("Person")
            .with_child("name", string_primitive())
            .with_child("tags", Spec::Cluster(SpecCluster::array(string_primitive()))),
    );
    assert_eq!(node.content_hash(), roundtrip(&node).content_hash());
}
