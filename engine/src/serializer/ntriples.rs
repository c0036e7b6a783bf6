//! N-Triples serializer.
//!
//! One triple per line with absolute IRIs; suitable for bulk loading and
//! diff-friendly storage of instance graphs.

use crate::model::Primitive;
use crate::term::{Term, Triple};

/// Serializes triples to an N-Triples document.
///
/// # Errors
///
/// This function is infallible; it always returns a valid N-Triples string.
#[must_use]
pub fn to_ntriples(triples: &[Triple]) -> String {
    let mut out = String::with_capacity(128 * triples.len());
    for t in triples {
        triple(&mut out, &term(&t.subject), &iri(&t.predicate.to_string()), &term(&t.object));
    }
    out
}

fn triple(out: &mut String, subj: &str, pred: &str, obj: &str) {
    out.push_str(subj);
    out.push(' ');
    out.push_str(pred);
    out.push(' ');
    out.push_str(obj);
    out.push_str(" .\n");
}

fn iri(s: &str) -> String {
    format!("<{}>", s)
}

fn lit(s: &str, datatype: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r");
    format!("\"{}\"^^<{}>", escaped, datatype)
}

fn term(t: &Term) -> String {
    match t {
        Term::Iri(i) => iri(&i.to_string()),
        Term::Blank(label) => format!("_:{label}"),
        Term::Literal(l) => lit(&l.lexical, &datatype(l.datatype)),
    }
}

fn datatype(p: Primitive) -> String {
    p.datatype().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Namespace;
    use crate::namespaces::rdf_type;
    use crate::term::Literal;

    const EX: Namespace = Namespace::new("ex", "urn:ex#");

    #[test]
    fn every_line_ends_with_period() {
        let nt = to_ntriples(&[
            Triple::new(EX.iri("b"), rdf_type(), EX.iri("Box")),
            Triple::new(EX.iri("b"), EX.iri("label"), Literal::new("a\nb", Primitive::String)),
        ]);
        assert_eq!(nt.lines().count(), 2);
        for line in nt.lines() {
            assert!(line.ends_with(" ."), "Line does not end with ' .': {line}");
        }
        assert!(nt.contains(r#""a\nb"^^<http://www.w3.org/2001/XMLSchema#string>"#));
    }

    #[test]
    fn iris_are_absolute() {
        let nt = to_ntriples(&[Triple::new(EX.iri("b"), rdf_type(), EX.iri("Box"))]);
        assert_eq!(
            nt,
            "<urn:ex#b> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <urn:ex#Box> .\n"
        );
    }
}
