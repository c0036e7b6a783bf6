//! Turtle 1.1 serializer for triple sets.
//!
//! Declares only the prefixes the triples actually use and groups
//! statements by subject in first-seen order.

use std::collections::BTreeSet;

use crate::model::{Namespace, Primitive};
use crate::namespaces::{RDF, XSD};
use crate::term::{Iri, Literal, Term, Triple};

/// Serializes triples to a Turtle document.
///
/// # Errors
///
/// This function is infallible; it always returns a valid Turtle string.
#[must_use]
pub fn to_turtle(triples: &[Triple]) -> String {
    let mut out = String::with_capacity(64 * triples.len() + 256);

    // Prefix declarations
    for ns in used_namespaces(triples) {
        out.push_str(&format!("@prefix {}: <{}> .\n", ns.prefix, ns.iri));
    }
    out.push('\n');

    let mut subjects: Vec<&Term> = Vec::new();
    for t in triples {
        if !subjects.contains(&&t.subject) {
            subjects.push(&t.subject);
        }
    }

    for subject in subjects {
        let statements: Vec<String> = triples
            .iter()
            .filter(|t| &t.subject == subject)
            .map(|t| {
                let predicate = if t.predicate == RDF.iri("type") {
                    "a".to_owned()
                } else {
                    t.predicate.to_compact()
                };
                format!("{} {}", predicate, term(&t.object))
            })
            .collect();
        out.push_str(&format!(
            "{} {} .\n\n",
            term(subject),
            statements.join(" ;\n    ")
        ));
    }

    out
}

/// Namespaces referenced through prefixed names, in prefix order.
#[must_use]
pub fn used_namespaces(triples: &[Triple]) -> BTreeSet<Namespace> {
    let mut used = BTreeSet::new();
    let mut note = |iri: &Iri| {
        if iri.prefixed().is_some() {
            used.insert(iri.namespace());
        }
    };
    for t in triples {
        for position in [&t.subject, &t.object] {
            match position {
                Term::Iri(iri) => note(iri),
                Term::Literal(lit) if lit.datatype != Primitive::String => {
                    note(&lit.datatype.datatype());
                }
                _ => {}
            }
        }
        if t.predicate != RDF.iri("type") {
            note(&t.predicate);
        }
    }
    used
}

/// A term in Turtle syntax.
#[must_use]
pub fn term(t: &Term) -> String {
    match t {
        Term::Iri(iri) => iri.to_compact(),
        Term::Blank(label) => format!("_:{label}"),
        Term::Literal(lit) => literal(lit),
    }
}

fn literal(lit: &Literal) -> String {
    match lit.datatype {
        Primitive::String => turtle_string(&lit.lexical),
        other => format!(
            "{}^^{}:{}",
            turtle_string(&lit.lexical),
            XSD.prefix,
            other.as_str()
        ),
    }
}

/// A quoted, escaped Turtle string.
#[must_use]
pub fn turtle_string(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r");
    format!("\"{}\"", escaped)
}
