//! Well-known namespaces.
//!
//! Vocabulary namespaces used by every generated artifact, plus the two
//! engine-reserved ones: [`PARAM`] for template placeholders and [`CORE`]
//! for the marker types seeded into each registry.

use crate::model::Namespace;
use crate::term::Iri;

/// RDF 1.1 concepts (`rdf:`).
pub const RDF: Namespace = Namespace::new("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#");
/// RDF Schema (`rdfs:`).
pub const RDFS: Namespace = Namespace::new("rdfs", "http://www.w3.org/2000/01/rdf-schema#");
/// OWL 2 (`owl:`).
pub const OWL: Namespace = Namespace::new("owl", "http://www.w3.org/2002/07/owl#");
/// SHACL (`sh:`).
pub const SH: Namespace = Namespace::new("sh", "http://www.w3.org/ns/shacl#");
/// XML Schema datatypes (`xsd:`).
pub const XSD: Namespace = Namespace::new("xsd", "http://www.w3.org/2001/XMLSchema#");

/// Template parameters (`P:`). Never used for data.
pub const PARAM: Namespace = Namespace::new("P", "urn:___param___#");

/// Engine marker types such as `Resource` and `Node` (`so:`).
pub const CORE: Namespace = Namespace::new("so", "urn:semantic-objects#");

/// Default namespace for instance identities (`model:`).
pub const MODEL: Namespace = Namespace::new("model", "urn:model#");

/// `rdf:type`.
#[must_use]
pub fn rdf_type() -> Iri {
    RDF.iri("type")
}

/// `rdfs:subClassOf`.
#[must_use]
pub fn subclass_of() -> Iri {
    RDFS.iri("subClassOf")
}

/// Every namespace this module declares, in declaration order.
#[must_use]
pub fn standard() -> [Namespace; 8] {
    [RDF, RDFS, OWL, SH, XSD, PARAM, CORE, MODEL]
}
