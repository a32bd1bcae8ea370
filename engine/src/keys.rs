//! Annotation keys recognized by the standard processors and the masher.

/// Boolean annotation marking a node as eligible for the declared-type
/// table. Nodes without it exist only for their side effects.
pub const ROOT_TYPE: &str = "specmash/root-type";

/// Names the standalone type a nested node should be lifted into.
pub const EXTRACTED_TYPE_NAME: &str = "specmash/extracted-type-name";

/// Declares an extensible enumeration over a primitive. The value is a YAML
/// enum declaration (`enumerationKind`, `name`, `cases`, optional
/// `metadata`).
pub const OPEN_ENUMERATION: &str = "specmash/open-enumeration";

/// Declares a closed enumeration over a primitive. Same payload as
/// [`OPEN_ENUMERATION`].
pub const CLOSED_ENUMERATION: &str = "specmash/closed-enumeration";

/// Marks a field as a member of the named type-group aggregate.
pub const TYPE_GROUP: &str = "specmash/type-group";
