//! Concrete triples of an instance.
//!
//! The forward half of the round trip: an [`Instance`] becomes the same
//! shape its type's template describes, with placeholders replaced by
//! identities in an instance namespace and literals. Nested instances are
//! serialized once each, so shared and cyclic values are safe.

use std::collections::HashSet;

use crate::error::Result;
use crate::instance::{Instance, Value};
use crate::model::{Namespace, Primitive, Target};
use crate::namespaces::rdf_type;
use crate::registry::Registry;
use crate::resolver::{resolve, Resolution};
use crate::term::{Iri, Literal, Term, Triple};

/// Triples of `instance` and everything it references, identities minted
/// in `namespace`.
///
/// # Errors
///
/// Returns [`Error::Definition`](crate::Error::Definition) if a relation
/// cannot be resolved or a referenced type is abstract.
pub fn instance_triples(
    registry: &Registry,
    instance: &Instance,
    namespace: Namespace,
) -> Result<Vec<Triple>> {
    let mut out = Vec::new();
    let mut done = HashSet::new();
    emit(registry, instance, namespace, &mut out, &mut done)?;
    Ok(out)
}

fn emit(
    registry: &Registry,
    instance: &Instance,
    ns: Namespace,
    out: &mut Vec<Triple>,
    done: &mut HashSet<String>,
) -> Result<()> {
    if !done.insert(instance.id().to_owned()) {
        return Ok(());
    }
    let ty = instance.type_id();
    let subject = ns.iri(instance.id());
    out.push(Triple::new(subject.clone(), rdf_type(), registry.identity(ty)?));

    let links = registry.inter_field_relations(ty);
    let sources: HashSet<&str> = links.iter().map(|l| l.source).collect();

    for field in registry.fields(ty) {
        let Some(value) = instance.get(field.name) else {
            continue;
        };
        let mut objects = Vec::new();
        collect_objects(registry, value, field.value_type.target(ty), ns, &mut objects)?;

        if field.templatize && !sources.contains(field.name) {
            if let Resolution::Relation(relation) = resolve(registry, ty, field)? {
                let relation = registry.identity(relation)?;
                for object in &objects {
                    out.push(Triple::new(subject.clone(), relation.clone(), object.clone()));
                }
            }
        }
        for nested in nested_instances(value) {
            emit(registry, nested, ns, out, done)?;
        }
    }

    for link in links {
        let (Some(source), Some(target)) = (instance.get(link.source), instance.get(link.target))
        else {
            continue;
        };
        let relation = registry.identity(link.relation)?;
        for s in identities(source, ns) {
            for o in identities(target, ns) {
                out.push(Triple::new(s.clone(), relation.clone(), o));
            }
        }
    }
    Ok(())
}

/// Object terms of a value, flattened over lists.
fn collect_objects(
    registry: &Registry,
    value: &Value,
    target: Target,
    ns: Namespace,
    out: &mut Vec<Term>,
) -> Result<()> {
    match value {
        Value::List(items) => {
            for item in items {
                collect_objects(registry, item, target, ns, out)?;
            }
        }
        Value::Named(t) => out.push(registry.identity(*t)?.into()),
        Value::Resource(inst) => out.push(ns.iri(inst.id()).into()),
        Value::CircularRef(id) => out.push(ns.iri(id.as_str()).into()),
        scalar => {
            let datatype = match target {
                Target::Primitive(p) => p,
                Target::Type(_) => Primitive::String,
            };
            if let Some(lexical) = scalar.lexical() {
                out.push(Literal::new(lexical, datatype).into());
            }
        }
    }
    Ok(())
}

fn nested_instances(value: &Value) -> Vec<&Instance> {
    match value {
        Value::Resource(inst) => vec![inst.as_ref()],
        Value::List(items) => items.iter().flat_map(nested_instances).collect(),
        _ => Vec::new(),
    }
}

fn identities(value: &Value, ns: Namespace) -> Vec<Iri> {
    match value {
        Value::Resource(inst) => vec![ns.iri(inst.id())],
        Value::CircularRef(id) => vec![ns.iri(id.as_str())],
        Value::List(items) => items.iter().flat_map(|v| identities(v, ns)).collect(),
        _ => Vec::new(),
    }
}
