//! The builder protocol: scaffolding a spec tree while parsing arbitrary
//! sample data.
//!
//! Format parsers (XML, property lists, whatever) walk their input and
//! drive a [`SpecBuilder`] cursor: descend into dictionaries, arrays, and
//! primitives, then move back out. The core is agnostic to the source
//! format — it only requires that an import eventually produces a
//! well-formed root node tree.
//!
//! # Example
//!
//! ```
//! use specmash_core::PrimitiveKind;
//! use specmash_importer::SpecBuilder;
//!
//! let mut builder = SpecBuilder::new("Track");
//! builder.push_primitive(PrimitiveKind::String, Some("title")).unwrap();
//! builder.move_out().unwrap();
//! builder.push_array(Some("tags")).unwrap();
//! builder.push_primitive(PrimitiveKind::String, None).unwrap();
//!
//! let root = builder.finish().unwrap();
//! assert_eq!(root.children.len(), 2);
//! ```

use thiserror::Error;

use specmash_core::{PrimitiveKind, Spec, SpecCluster, SpecNode, SpecPrimitive};

/// Violations of the builder protocol. All are fatal to the one import in
/// progress; the caller decides whether to skip that source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BuilderError {
    /// A dictionary context requires a key for every descent.
    #[error("a key is required when descending from a dictionary context")]
    KeyRequired,

    /// An array context forbids keys.
    #[error("a key is forbidden when descending from an array context")]
    KeyForbidden,

    /// Primitive contexts are terminal; move back out of them.
    #[error("cannot write into or descend from a primitive context")]
    PrimitiveAbuse,

    /// An array's element shape, once established, must stay consistent.
    #[error("array element shape conflicts with previously built elements")]
    ElementConflict,
}

/// Convenience alias for results with [`BuilderError`].
pub type Result<T> = std::result::Result<T, BuilderError>;

// Coarse element category an array has committed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementShape {
    Array,
    Node,
    Primitive,
}

// One level of the cursor. `key` is the slot in the parent frame (None for
// the root and for array elements).
enum Frame {
    Node {
        node: SpecNode,
        key: Option<String>,
    },
    Array {
        element: Option<Spec>,
        shape: Option<ElementShape>,
        key: Option<String>,
    },
    Primitive {
        primitive: SpecPrimitive,
        key: Option<String>,
    },
}

/// Cursor-style builder over an explicit frame stack.
///
/// Every `push_*` descends one level; [`move_out`](SpecBuilder::move_out)
/// ascends, attaching the finished frame to its parent.
/// [`finish`](SpecBuilder::finish) unwinds whatever is still open and
/// returns the root node.
pub struct SpecBuilder {
    stack: Vec<Frame>,
}

impl SpecBuilder {
    /// Starts a build rooted at a node with the given name.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            stack: vec![Frame::Node {
                node: SpecNode::new(root_name),
                key: None,
            }],
        }
    }

    /// Descends into a dictionary (node) context.
    pub fn push_dictionary(&mut self, key: Option<&str>) -> Result<()> {
        let frame = match self.current() {
            Frame::Node { .. } => {
                let key = key.ok_or(BuilderError::KeyRequired)?;
                Frame::Node {
                    node: SpecNode::new(key),
                    key: Some(key.to_string()),
                }
            }
            Frame::Array {
                shape, key: array_key, ..
            } => {
                if key.is_some() {
                    return Err(BuilderError::KeyForbidden);
                }
                if shape.is_some_and(|shape| shape != ElementShape::Node) {
                    return Err(BuilderError::ElementConflict);
                }
                // array-element nodes are named after the enclosing key
                let name = array_key.clone().unwrap_or_else(|| "element".to_string());
                Frame::Node {
                    node: SpecNode::new(name),
                    key: None,
                }
            }
            Frame::Primitive { .. } => return Err(BuilderError::PrimitiveAbuse),
        };
        self.stack.push(frame);
        Ok(())
    }

    /// Descends into an array context.
    pub fn push_array(&mut self, key: Option<&str>) -> Result<()> {
        let frame = match self.current() {
            Frame::Node { .. } => {
                let key = key.ok_or(BuilderError::KeyRequired)?;
                Frame::Array {
                    element: None,
                    shape: None,
                    key: Some(key.to_string()),
                }
            }
            Frame::Array { shape, .. } => {
                if key.is_some() {
                    return Err(BuilderError::KeyForbidden);
                }
                if shape.is_some_and(|shape| shape != ElementShape::Array) {
                    return Err(BuilderError::ElementConflict);
                }
                Frame::Array {
                    element: None,
                    shape: None,
                    key: None,
                }
            }
            Frame::Primitive { .. } => return Err(BuilderError::PrimitiveAbuse),
        };
        self.stack.push(frame);
        Ok(())
    }

    /// Descends into a primitive context. The context is terminal; move
    /// back out of it (or let [`finish`](SpecBuilder::finish) unwind).
    pub fn push_primitive(&mut self, kind: PrimitiveKind, key: Option<&str>) -> Result<()> {
        let frame = match self.current() {
            Frame::Node { .. } => {
                let key = key.ok_or(BuilderError::KeyRequired)?;
                Frame::Primitive {
                    primitive: SpecPrimitive::new(kind),
                    key: Some(key.to_string()),
                }
            }
            Frame::Array { shape, .. } => {
                if key.is_some() {
                    return Err(BuilderError::KeyForbidden);
                }
                if shape.is_some_and(|shape| shape != ElementShape::Primitive) {
                    return Err(BuilderError::ElementConflict);
                }
                Frame::Primitive {
                    primitive: SpecPrimitive::new(kind),
                    key: None,
                }
            }
            Frame::Primitive { .. } => return Err(BuilderError::PrimitiveAbuse),
        };
        self.stack.push(frame);
        Ok(())
    }

    /// Ascends one level, attaching the finished frame to its parent.
    /// At the root this is a no-op, matching the protocol's "returns the
    /// parent, or self if this is the top".
    pub fn move_out(&mut self) -> Result<()> {
        if self.stack.len() < 2 {
            return Ok(());
        }
        let Some(frame) = self.stack.pop() else {
            return Ok(());
        };
        let (spec, shape, key) = match frame {
            Frame::Node { node, key } => (Spec::Node(node), ElementShape::Node, key),
            Frame::Array { element, key, .. } => {
                let element = element
                    .unwrap_or_else(|| Spec::Primitive(SpecPrimitive::new(PrimitiveKind::Never)));
                (
                    Spec::Cluster(SpecCluster::array(element)),
                    ElementShape::Array,
                    key,
                )
            }
            Frame::Primitive { primitive, key } => {
                (Spec::Primitive(primitive), ElementShape::Primitive, key)
            }
        };
        self.attach(spec, shape, key);
        Ok(())
    }

    /// Unwinds every open frame and returns the root node.
    pub fn finish(mut self) -> Result<SpecNode> {
        while self.stack.len() > 1 {
            self.move_out()?;
        }
        match self.stack.pop() {
            Some(Frame::Node { node, .. }) => Ok(node),
            _ => unreachable!("the root frame is always a node"),
        }
    }

    fn current(&mut self) -> &mut Frame {
        // the stack is never empty: the root frame is created in `new` and
        // `move_out` refuses to pop it
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn attach(&mut self, spec: Spec, shape: ElementShape, key: Option<String>) {
        match self.current() {
            Frame::Node { node, .. } => {
                if let Some(key) = key {
                    node.children.insert(key, spec);
                }
            }
            Frame::Array {
                element,
                shape: element_shape,
                ..
            } => {
                *element = Some(spec);
                *element_shape = Some(shape);
            }
            Frame::Primitive { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specmash_core::SpecKind;

    #[test]
    fn builds_a_nested_tree() {
        let mut builder = SpecBuilder::new("Library");
        builder.push_dictionary(Some("owner")).unwrap();
        builder
            .push_primitive(PrimitiveKind::String, Some("name"))
            .unwrap();
        builder.move_out().unwrap();
        builder.move_out().unwrap();
        builder.push_array(Some("albums")).unwrap();
        builder.push_dictionary(None).unwrap();
        builder
            .push_primitive(PrimitiveKind::String, Some("title"))
            .unwrap();

        let root = builder.finish().unwrap();
        assert_eq!(root.name, "Library");

        let owner = root.children["owner"].as_node().unwrap();
        assert!(owner.children.contains_key("name"));

        let Spec::Cluster(albums) = &root.children["albums"] else {
            panic!("expected an array cluster");
        };
        assert_eq!(albums.kind(), SpecKind::Array);
        let element = albums.element.as_node().unwrap();
        // array-element nodes take the enclosing key as their name
        assert_eq!(element.name, "albums");
        assert!(element.children.contains_key("title"));
    }

    #[test]
    fn dictionary_context_requires_a_key() {
        let mut builder = SpecBuilder::new("T");
        assert_eq!(builder.push_array(None), Err(BuilderError::KeyRequired));
        assert_eq!(
            builder.push_dictionary(None),
            Err(BuilderError::KeyRequired)
        );
        assert_eq!(
            builder.push_primitive(PrimitiveKind::String, None),
            Err(BuilderError::KeyRequired)
        );
    }

    #[test]
    fn array_context_forbids_keys() {
        let mut builder = SpecBuilder::new("T");
        builder.push_array(Some("xs")).unwrap();
        assert_eq!(
            builder.push_primitive(PrimitiveKind::String, Some("oops")),
            Err(BuilderError::KeyForbidden)
        );
        assert_eq!(
            builder.push_dictionary(Some("oops")),
            Err(BuilderError::KeyForbidden)
        );
        assert_eq!(builder.push_array(Some("oops")), Err(BuilderError::KeyForbidden));
    }

    #[test]
    fn primitive_contexts_are_terminal() {
        let mut builder = SpecBuilder::new("T");
        builder
            .push_primitive(PrimitiveKind::String, Some("x"))
            .unwrap();
        assert_eq!(
            builder.push_primitive(PrimitiveKind::String, Some("y")),
            Err(BuilderError::PrimitiveAbuse)
        );
        assert_eq!(builder.push_array(None), Err(BuilderError::PrimitiveAbuse));
        assert_eq!(
            builder.push_dictionary(None),
            Err(BuilderError::PrimitiveAbuse)
        );

        builder.move_out().unwrap();
        builder
            .push_primitive(PrimitiveKind::Integer, Some("y"))
            .unwrap();
        let root = builder.finish().unwrap();
        assert_eq!(root.children.len(), 2);
    }

    #[test]
    fn array_element_shape_must_stay_consistent() {
        let mut builder = SpecBuilder::new("T");
        builder.push_array(Some("xs")).unwrap();
        builder.push_primitive(PrimitiveKind::String, None).unwrap();
        builder.move_out().unwrap();
        assert_eq!(
            builder.push_dictionary(None),
            Err(BuilderError::ElementConflict)
        );
        // same shape is fine; the element evidence is replaced
        builder
            .push_primitive(PrimitiveKind::Integer, None)
            .unwrap();
    }

    #[test]
    fn empty_arrays_fall_back_to_a_never_element() {
        let mut builder = SpecBuilder::new("T");
        builder.push_array(Some("xs")).unwrap();
        let root = builder.finish().unwrap();

        let Spec::Cluster(cluster) = &root.children["xs"] else {
            panic!("expected a cluster");
        };
        let Spec::Primitive(primitive) = cluster.element.as_ref() else {
            panic!("expected a primitive element");
        };
        assert_eq!(primitive.primitive, PrimitiveKind::Never);
    }

    #[test]
    fn move_out_at_the_root_is_a_no_op() {
        let mut builder = SpecBuilder::new("T");
        builder.move_out().unwrap();
        builder.move_out().unwrap();
        assert_eq!(builder.finish().unwrap().name, "T");
    }
}
