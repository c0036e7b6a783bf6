//! Relation inference.
//!
//! A field either names its relation, suppresses it, or leaves it to be
//! inferred from explicit relation tables. Inference walks the ancestry of
//! the type being processed; the first ancestor that has a table at all is
//! the only one consulted. Within it, entries are scanned in declaration
//! order and the first whose target is the field target or one of the field
//! target's ancestors wins. Source specificity therefore dominates, and
//! table order dominates target specificity.

use crate::error::DefinitionError;
use crate::model::{Field, RelationBinding, Target, TypeId};
use crate::registry::Registry;

/// The outcome of resolving one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The field is connected by this relation.
    Relation(TypeId),
    /// The field has no graph relation.
    Suppressed,
}

impl Resolution {
    /// The relation, unless suppressed.
    #[must_use]
    pub fn relation(self) -> Option<TypeId> {
        match self {
            Resolution::Relation(r) => Some(r),
            Resolution::Suppressed => None,
        }
    }
}

/// Resolves the relation of `field` as seen from type `context`.
///
/// `context` is the type being serialized, queried or shaped; for a field
/// declared on that type it is the declaring type.
///
/// # Errors
///
/// Returns [`DefinitionError::UnresolvedRelation`] when inference finds no
/// matching table entry.
pub fn resolve(
    registry: &Registry,
    context: TypeId,
    field: &Field,
) -> Result<Resolution, DefinitionError> {
    match field.relation {
        RelationBinding::Explicit(relation) => return Ok(Resolution::Relation(relation)),
        RelationBinding::Suppressed => return Ok(Resolution::Suppressed),
        RelationBinding::Infer => {}
    }

    let target = field.value_type.target(context);
    let found = registry
        .ancestry(context)
        .iter()
        .map(|&source| registry.relation_table(source))
        .find(|table| !table.is_empty())
        .and_then(|table| {
            table
                .iter()
                .find(|entry| matches(registry, target, entry.target))
                .map(|entry| entry.relation)
        });

    match found {
        Some(relation) => {
            tracing::trace!(
                field = field.name,
                context = %registry.display(context),
                relation = %registry.display(relation),
                "inferred relation"
            );
            Ok(Resolution::Relation(relation))
        }
        None => Err(DefinitionError::UnresolvedRelation {
            field: field.name.to_owned(),
            declaring_type: registry.display(context),
            target: registry.display_target(target),
        }),
    }
}

/// Whether an entry targeting `allowed` accepts a field targeting `actual`.
fn matches(registry: &Registry, actual: Target, allowed: Target) -> bool {
    match (actual, allowed) {
        (Target::Primitive(a), Target::Primitive(b)) => a == b,
        (Target::Type(a), Target::Type(b)) => registry.is_a(a, b),
        _ => false,
    }
}

/// Resolves every applicable templatized field of `context`, in field order,
/// skipping suppressed ones.
///
/// # Errors
///
/// Returns the first [`DefinitionError`] encountered.
pub fn field_relations<'r>(
    registry: &'r Registry,
    context: TypeId,
) -> Result<Vec<(&'r Field, TypeId)>, DefinitionError> {
    let mut out = Vec::new();
    for field in registry.fields(context) {
        if !field.templatize {
            continue;
        }
        if let Resolution::Relation(relation) = resolve(registry, context, field)? {
            out.push((field, relation));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Namespace, Primitive, ValueType};
    use crate::registry::{FieldDecl, TypeDecl};

    const EX: Namespace = Namespace::new("ex", "urn:ex#");

    #[test]
    fn box_width_resolves_to_has_dimension() {
        let mut b = Registry::builder();
        let m = b.markers();
        let has_dimension = b
            .declare(TypeDecl::new("hasDimension", EX).extends(m.predicate))
            .expect("rel");
        let length = b
            .declare(TypeDecl::new("Length", EX).extends(m.value))
            .expect("length");
        let boxed = b
            .declare(
                TypeDecl::new("Box", EX)
                    .extends(m.node)
                    .allows(has_dimension, length)
                    .field(FieldDecl::required("width", ValueType::Type(length))),
            )
            .expect("box");
        let registry = b.build();
        let width = registry.field(boxed, "width").expect("width");

        let first = resolve(&registry, boxed, width).expect("resolves");
        let second = resolve(&registry, boxed, width).expect("resolves");
        assert_eq!(first, Resolution::Relation(has_dimension));
        assert_eq!(first, second);
    }

    #[test]
    fn explicit_relation_ignores_tables() {
        let mut b = Registry::builder();
        let m = b.markers();
        let r1 = b
            .declare(TypeDecl::new("r1", EX).extends(m.predicate))
            .expect("r1");
        let r2 = b
            .declare(TypeDecl::new("r2", EX).extends(m.predicate))
            .expect("r2");
        let t = b
            .declare(
                TypeDecl::new("T", EX)
                    .extends(m.node)
                    .allows(r1, m.node)
                    .field(FieldDecl::required("x", ValueType::Type(m.node)).relation(r2))
                    .field(FieldDecl::required("y", ValueType::Type(m.node)).no_relation()),
            )
            .expect("t");
        let registry = b.build();
        let x = registry.field(t, "x").expect("x");
        let y = registry.field(t, "y").expect("y");
        assert_eq!(resolve(&registry, t, x), Ok(Resolution::Relation(r2)));
        assert_eq!(resolve(&registry, t, y), Ok(Resolution::Suppressed));
    }

    #[test]
    fn own_table_beats_ancestor_table() {
        let mut b = Registry::builder();
        let m = b.markers();
        let r1 = b
            .declare(TypeDecl::new("r1", EX).extends(m.predicate))
            .expect("r1");
        let r2 = b
            .declare(TypeDecl::new("r2", EX).extends(m.predicate))
            .expect("r2");
        let x = b
            .declare(TypeDecl::new("X", EX).extends(m.node))
            .expect("x");
        let parent = b
            .declare(TypeDecl::new("Parent", EX).extends(m.node).allows(r2, x))
            .expect("parent");
        let t = b
            .declare(
                TypeDecl::new("T", EX)
                    .extends(parent)
                    .allows(r1, x)
                    .field(FieldDecl::required("f", ValueType::Type(x))),
            )
            .expect("t");
        let registry = b.build();
        let f = registry.field(t, "f").expect("f");
        assert_eq!(resolve(&registry, t, f), Ok(Resolution::Relation(r1)));
    }

    #[test]
    fn table_order_beats_target_specificity() {
        let mut b = Registry::builder();
        let m = b.markers();
        let general = b
            .declare(TypeDecl::new("general", EX).extends(m.predicate))
            .expect("general");
        let specific = b
            .declare(TypeDecl::new("specific", EX).extends(m.predicate))
            .expect("specific");
        let animal = b
            .declare(TypeDecl::new("Animal", EX).extends(m.node))
            .expect("animal");
        let dog = b
            .declare(TypeDecl::new("Dog", EX).extends(animal))
            .expect("dog");
        let owner = b
            .declare(
                TypeDecl::new("Owner", EX)
                    .extends(m.node)
                    .allows(general, animal)
                    .allows(specific, dog)
                    .field(FieldDecl::required("pet", ValueType::Type(dog))),
            )
            .expect("owner");
        let registry = b.build();
        let pet = registry.field(owner, "pet").expect("pet");
        assert_eq!(resolve(&registry, owner, pet), Ok(Resolution::Relation(general)));
    }

    #[test]
    fn first_table_stops_the_walk() {
        let mut b = Registry::builder();
        let m = b.markers();
        let r = b
            .declare(TypeDecl::new("r", EX).extends(m.predicate))
            .expect("r");
        let other = b
            .declare(TypeDecl::new("Other", EX).extends(m.node))
            .expect("other");
        let x = b
            .declare(TypeDecl::new("X", EX).extends(m.node))
            .expect("x");
        let grand = b
            .declare(TypeDecl::new("Grand", EX).extends(m.node).allows(r, x))
            .expect("grand");
        let t = b
            .declare(
                TypeDecl::new("T", EX)
                    .extends(grand)
                    .allows(r, other)
                    .field(FieldDecl::required("f", ValueType::Type(x))),
            )
            .expect("t");
        let registry = b.build();
        let f = registry.field(t, "f").expect("f");
        let err = resolve(&registry, t, f).unwrap_err();
        assert!(matches!(err, DefinitionError::UnresolvedRelation { ref field, .. } if field == "f"));
    }

    #[test]
    fn self_reference_and_primitives() {
        let mut b = Registry::builder();
        let m = b.markers();
        let contains = b
            .declare(TypeDecl::new("contains", EX).extends(m.predicate))
            .expect("contains");
        let has_value = b
            .declare(TypeDecl::new("hasValue", EX).extends(m.predicate))
            .expect("hasValue");
        let space = b
            .declare(
                TypeDecl::new("Space", EX)
                    .extends(m.node)
                    .allows_self(contains)
                    .allows(has_value, Primitive::Decimal)
                    .field(FieldDecl::optional(
                        "parts",
                        ValueType::collection(ValueType::SelfRef),
                    ))
                    .field(FieldDecl::required(
                        "volume",
                        ValueType::Primitive(Primitive::Decimal),
                    ))
                    .field(FieldDecl::required(
                        "note",
                        ValueType::Primitive(Primitive::String),
                    )),
            )
            .expect("space");
        let registry = b.build();
        let parts = registry.field(space, "parts").expect("parts");
        let volume = registry.field(space, "volume").expect("volume");
        let note = registry.field(space, "note").expect("note");
        assert_eq!(resolve(&registry, space, parts), Ok(Resolution::Relation(contains)));
        assert_eq!(resolve(&registry, space, volume), Ok(Resolution::Relation(has_value)));
        assert!(resolve(&registry, space, note).is_err());
    }

    #[test]
    fn missing_tables_name_the_field_and_types() {
        let mut b = Registry::builder();
        let m = b.markers();
        let t = b
            .declare(
                TypeDecl::new("T", EX)
                    .extends(m.node)
                    .field(FieldDecl::required("f", ValueType::Type(m.node))),
            )
            .expect("t");
        let registry = b.build();
        let f = registry.field(t, "f").expect("f");
        let msg = resolve(&registry, t, f).unwrap_err().to_string();
        assert!(msg.contains("'f'") && msg.contains("ex:T") && msg.contains("so:Node"));
    }
}
