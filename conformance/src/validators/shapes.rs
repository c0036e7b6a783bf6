//! SHACL shape validator.
//!
//! Every shape and property definition in the closure must parse as Turtle,
//! refer only to declared classes and values, and carry consistent
//! cardinalities.

use semobj::closure::closure;
use semobj::serializer::turtle::to_turtle;
use semobj::shape::{property_definition, shape, QualifiedShape, Restriction};
use semobj::{Iri, NodeShape, Registry, TypeId};

use super::parse_turtle;
use crate::report::{ConformanceReport, TestResult};
use crate::vocabulary::Vocabulary;

/// Validates node shapes and property definitions for `roots`.
pub fn validate(vocab: &Vocabulary, roots: &[TypeId]) -> ConformanceReport {
    let mut report = ConformanceReport::new();
    let registry = &vocab.registry;
    let found = match closure(registry, roots) {
        Ok(found) => found,
        Err(e) => {
            report.push(TestResult::fail("shapes", format!("closure failed: {e}")));
            return report;
        }
    };

    let mut syntax = Vec::new();
    let mut references = Vec::new();
    let mut cardinality = Vec::new();
    for &t in &found.entities {
        if !registry.get(t).templatize {
            continue;
        }
        let name = registry.display(t);
        let node = match shape(registry, t, true) {
            Ok(node) => node,
            Err(e) => {
                syntax.push(format!("{name}: {e}"));
                continue;
            }
        };
        let expected = node.to_triples().len();
        match parse_turtle(&node.to_turtle()) {
            Ok(n) if n == expected => {}
            Ok(n) => syntax.push(format!("{name}: {n} triples read back, {expected} emitted")),
            Err(e) => syntax.push(format!("{name}: {e}")),
        }
        references.extend(
            unresolved(registry, &node)
                .into_iter()
                .map(|iri| format!("{name}: {iri} is not declared")),
        );
        for property in &node.properties {
            if let Some(max) = property.max_count {
                if max < property.min_count {
                    cardinality.push(format!(
                        "{name}: {} allows at most {max} but requires {}",
                        property.path, property.min_count
                    ));
                }
            }
        }
    }

    for &r in &found.relations {
        let name = registry.display(r);
        match property_definition(registry, r) {
            Ok(triples) => {
                if let Err(e) = parse_turtle(&to_turtle(&triples)) {
                    syntax.push(format!("{name}: {e}"));
                }
            }
            Err(e) => syntax.push(format!("{name}: {e}")),
        }
    }

    report.push(TestResult::from_problems(
        "shapes/turtle",
        format!("{} shapes and definitions parse as Turtle", found.len()),
        "shapes or definitions are not valid Turtle",
        syntax,
    ));
    report.push(TestResult::from_problems(
        "shapes/references",
        "shapes refer only to declared types",
        "shapes refer to undeclared types",
        references,
    ));
    report.push(TestResult::from_problems(
        "shapes/cardinality",
        "property cardinalities are consistent",
        "inconsistent property cardinalities",
        cardinality,
    ));
    report
}

/// IRIs named by `node` that the registry does not know.
fn unresolved(registry: &Registry, node: &NodeShape) -> Vec<Iri> {
    let mut named: Vec<&Iri> = vec![&node.class];
    named.extend(&node.parent);
    for property in &node.properties {
        named.push(&property.path);
        for restriction in &property.restrictions {
            match restriction {
                Restriction::Class(c)
                | Restriction::Qualified {
                    shape: QualifiedShape::Class(c) | QualifiedShape::HasValue(c),
                    ..
                } => named.push(c),
                Restriction::Datatype(_) => {}
            }
        }
    }
    named
        .into_iter()
        .filter(|iri| registry.find_by_iri(iri).is_none())
        .cloned()
        .collect()
}
