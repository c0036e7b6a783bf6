//! Transitive closure over relations and field targets.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::model::TypeId;
use crate::registry::Registry;
use crate::resolver::{resolve, Resolution};

/// Round bound after which closure is reported as divergent.
pub const MAX_CLOSURE_ROUNDS: usize = 100;

/// Closure settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosureOptions {
    /// Keep abstract types in the result.
    pub include_abstract: bool,
    /// Round bound.
    pub max_rounds: usize,
}

impl Default for ClosureOptions {
    fn default() -> Self {
        Self {
            include_abstract: false,
            max_rounds: MAX_CLOSURE_ROUNDS,
        }
    }
}

/// Types reachable from a set of roots, partitioned by kind, in discovery
/// order. Marker types never appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Closure {
    /// Relation types.
    pub relations: Vec<TypeId>,
    /// Entity and value types.
    pub entities: Vec<TypeId>,
}

impl Closure {
    /// Whether `t` was reached.
    #[must_use]
    pub fn contains(&self, t: TypeId) -> bool {
        self.relations.contains(&t) || self.entities.contains(&t)
    }

    /// Total number of types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.relations.len() + self.entities.len()
    }

    /// Whether nothing was reached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entities that are value types.
    #[must_use]
    pub fn values(&self, registry: &Registry) -> Vec<TypeId> {
        self.entities
            .iter()
            .copied()
            .filter(|&t| registry.is_value(t))
            .collect()
    }

    /// Entities that are not value types.
    #[must_use]
    pub fn non_values(&self, registry: &Registry) -> Vec<TypeId> {
        self.entities
            .iter()
            .copied()
            .filter(|&t| !registry.is_value(t))
            .collect()
    }
}

/// Closure of `roots` with default options.
///
/// # Errors
///
/// Returns [`Error::Definition`] if a relation cannot be inferred and
/// [`Error::Divergence`] if no fixpoint is reached within
/// [`MAX_CLOSURE_ROUNDS`].
pub fn closure(registry: &Registry, roots: &[TypeId]) -> Result<Closure> {
    closure_with(registry, roots, ClosureOptions::default())
}

/// Closure of `roots`.
///
/// # Errors
///
/// See [`closure`]; the round bound is taken from `options`.
pub fn closure_with(
    registry: &Registry,
    roots: &[TypeId],
    options: ClosureOptions,
) -> Result<Closure> {
    let mut seen: HashSet<TypeId> = HashSet::new();
    let mut order = Vec::new();
    let mut frontier = Vec::new();
    for &root in roots {
        if seen.insert(root) {
            order.push(root);
            frontier.push(root);
        }
    }

    let mut expanded = HashSet::new();
    let mut rounds = 0;
    while !frontier.is_empty() {
        if rounds == options.max_rounds {
            return Err(Error::Divergence { rounds });
        }
        rounds += 1;
        let mut next = Vec::new();
        for t in frontier {
            if !expanded.insert(t) {
                continue;
            }
            for n in neighbours(registry, t)? {
                if seen.insert(n) {
                    order.push(n);
                    next.push(n);
                }
            }
        }
        tracing::debug!(round = rounds, discovered = next.len(), "closure round");
        frontier = next;
    }

    let markers = registry.markers();
    let mut result = Closure::default();
    for t in order {
        if markers.contains(t) || (registry.get(t).is_abstract && !options.include_abstract) {
            continue;
        }
        if registry.is_relation(t) {
            result.relations.push(t);
        } else if registry.is_entity(t) {
            result.entities.push(t);
        }
    }
    Ok(result)
}

/// Relations and field targets of one type.
fn neighbours(registry: &Registry, t: TypeId) -> Result<Vec<TypeId>> {
    let mut out = Vec::new();
    for field in registry.fields(t) {
        if !field.templatize {
            continue;
        }
        if let Resolution::Relation(relation) = resolve(registry, t, field)? {
            out.push(relation);
        }
        if let Some(target) = field.value_type.target(t).type_id() {
            out.push(target);
        }
    }
    for link in registry.inter_field_relations(t) {
        out.push(link.relation);
    }
    Ok(out)
}
