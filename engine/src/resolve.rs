//! Alias resolution with cycle detection.
//!
//! Aliases resolve lazily by (kind, name) lookup, so they can dangle — and,
//! if authored carelessly, cycle. Resolution tracks the set of tags already
//! visited; revisiting one is a fatal cyclic-alias error rather than an
//! infinite loop.

use std::collections::BTreeSet;

use thiserror::Error;

use specmash_core::{Spec, SpecAlias, SpecKind};

use crate::registry::SpecRegistry;

/// Errors raised while resolving an alias.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Following the alias chain revisited a tag.
    #[error("alias `{name}` participates in a reference cycle")]
    CyclicAlias { name: String },
}

/// Follows an alias chain through the registry to its terminal spec.
///
/// Returns `Ok(None)` for a dangling alias (nothing stored under the
/// target tag) and [`ResolveError::CyclicAlias`] when the chain loops.
///
/// # Examples
///
/// ```
/// use specmash_core::{Spec, SpecAlias, SpecKind, SpecNode};
/// use specmash_engine::{SpecRegistry, resolve_alias};
///
/// let mut registry = SpecRegistry::new();
/// registry.store(Spec::Node(SpecNode::new("Artwork"))).unwrap();
///
/// let alias = SpecAlias::new("artwork", "Artwork", SpecKind::Object);
/// let resolved = resolve_alias(&registry, &alias).unwrap().unwrap();
/// assert_eq!(resolved.name(), Some("Artwork"));
/// ```
pub fn resolve_alias<'a>(
    registry: &'a SpecRegistry,
    alias: &SpecAlias,
) -> Result<Option<&'a Spec>, ResolveError> {
    let mut visited: BTreeSet<(SpecKind, String)> = BTreeSet::new();
    let mut kind = alias.aliased_kind;
    let mut name = alias.aliased_name.clone();

    loop {
        if !visited.insert((kind, name.clone())) {
            return Err(ResolveError::CyclicAlias {
                name: alias.name.clone(),
            });
        }
        match registry.query(kind, &name) {
            None => return Ok(None),
            Some(Spec::Alias(next)) => {
                kind = next.aliased_kind;
                name = next.aliased_name.clone();
            }
            Some(spec) => return Ok(Some(spec)),
        }
    }
}
