//! RDF terms and triples.
//!
//! Everything the engine emits or reads back is expressed with these four
//! types. Placeholders are ordinary IRIs in the [`PARAM`](crate::namespaces::PARAM)
//! namespace, so templates and instance graphs share one representation.

use std::fmt;

use crate::model::{Namespace, Primitive};
use crate::namespaces::PARAM;

/// An IRI split into namespace and local part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Iri {
    namespace: Namespace,
    local: String,
}

impl Iri {
    /// Creates an IRI from a namespace and a local name.
    pub fn new(namespace: Namespace, local: impl Into<String>) -> Self {
        Self {
            namespace,
            local: local.into(),
        }
    }

    /// The namespace half.
    #[must_use]
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// The local half.
    #[must_use]
    pub fn local(&self) -> &str {
        &self.local
    }

    /// Whether this IRI is a template placeholder.
    #[must_use]
    pub fn is_param(&self) -> bool {
        self.namespace == PARAM
    }

    /// `prefix:local` when the local part is a legal prefixed-name suffix.
    #[must_use]
    pub fn prefixed(&self) -> Option<String> {
        is_local_name(&self.local).then(|| format!("{}:{}", self.namespace.prefix, self.local))
    }

    /// Prefixed form if possible, `<full>` otherwise.
    #[must_use]
    pub fn to_compact(&self) -> String {
        self.prefixed().unwrap_or_else(|| format!("<{self}>"))
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.namespace.iri, self.local)
    }
}

/// Conservative check for a Turtle / SPARQL `PN_LOCAL`.
fn is_local_name(s: &str) -> bool {
    let Some(first) = s.chars().next() else {
        return false;
    };
    if first == '-' || first == '.' || s.ends_with('.') {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

/// A typed literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal {
    /// Lexical form, unescaped.
    pub lexical: String,
    /// Datatype of the literal.
    pub datatype: Primitive,
}

impl Literal {
    /// Creates a literal.
    pub fn new(lexical: impl Into<String>, datatype: Primitive) -> Self {
        Self {
            lexical: lexical.into(),
            datatype,
        }
    }
}

/// Subject or object position of a triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    /// A named resource.
    Iri(Iri),
    /// A blank node label (without `_:`).
    Blank(String),
    /// A typed literal.
    Literal(Literal),
}

impl Term {
    /// The IRI, if this term is one.
    #[must_use]
    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// The literal, if this term is one.
    #[must_use]
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(lit) => Some(lit),
            _ => None,
        }
    }
}

impl From<Iri> for Term {
    fn from(iri: Iri) -> Self {
        Term::Iri(iri)
    }
}

impl From<Literal> for Term {
    fn from(lit: Literal) -> Self {
        Term::Literal(lit)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "{iri}"),
            Term::Blank(label) => write!(f, "_:{label}"),
            Term::Literal(lit) => write!(f, "{}", lit.lexical),
        }
    }
}

/// One statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triple {
    /// Subject.
    pub subject: Term,
    /// Predicate.
    pub predicate: Iri,
    /// Object.
    pub object: Term,
}

impl Triple {
    /// Creates a triple.
    pub fn new(subject: impl Into<Term>, predicate: Iri, object: impl Into<Term>) -> Self {
        Self {
            subject: subject.into(),
            predicate,
            object: object.into(),
        }
    }
}

/// A placeholder IRI in the parameter namespace.
pub fn param(name: impl Into<String>) -> Iri {
    Iri::new(PARAM, name)
}
