//! SHACL class and constraint definitions.
//!
//! A [`NodeShape`] declares the type as both `rdfs:Class` and
//! `sh:NodeShape`, links it to its nearest non-marker ancestor and carries
//! one [`PropertyShape`] per distinct relation used by the selected fields.
//! Cardinality is counted per relation: two required fields sharing
//! `hasDimension` yield `sh:minCount 2`.

use std::collections::HashMap;

use crate::error::DefinitionError;
use crate::model::{Field, Primitive, Target, TypeId};
use crate::namespaces::{rdf_type, subclass_of, RDF, RDFS, SH};
use crate::registry::Registry;
use crate::resolver::{resolve, Resolution};
use crate::serializer::turtle::to_turtle;
use crate::term::{Iri, Literal, Term, Triple};

/// What a value on the path must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Restriction {
    /// `sh:class`.
    Class(Iri),
    /// `sh:datatype`.
    Datatype(Primitive),
    /// `sh:qualifiedValueShape` with qualified counts.
    Qualified {
        /// The nested constraint.
        shape: QualifiedShape,
        /// `sh:qualifiedMinCount`.
        min: u32,
        /// `sh:qualifiedMaxCount`.
        max: Option<u32>,
    },
}

/// Body of a qualified value shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualifiedShape {
    /// `[ sh:class C ]`.
    Class(Iri),
    /// `[ sh:hasValue v ]`.
    HasValue(Iri),
}

/// Constraints on one relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyShape {
    /// `sh:path`.
    pub path: Iri,
    /// Supplied or generated rationale.
    pub comment: String,
    /// Number of required or fixed fields using this relation. Optional
    /// fields are intentionally not counted.
    pub min_count: u32,
    /// First declared maximum, or `0` when a field forbids the relation
    /// through an empty exact-value set.
    pub max_count: Option<u32>,
    /// One entry per contributing field value.
    pub restrictions: Vec<Restriction>,
}

/// Class definition with its property constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeShape {
    /// The class.
    pub class: Iri,
    /// `rdfs:label`.
    pub label: Option<String>,
    /// `rdfs:comment`.
    pub comment: Option<String>,
    /// `rdfs:subClassOf`.
    pub parent: Option<Iri>,
    /// Extra `rdf:type` assertions.
    pub extra_types: Vec<Iri>,
    /// Property shapes in first-seen relation order.
    pub properties: Vec<PropertyShape>,
}

/// Builds the shape of `ty`.
///
/// With `include_inherited` every applicable field contributes; otherwise
/// only the type's own declarations (including fixed overrides) do.
///
/// # Errors
///
/// Returns a [`DefinitionError`] if a field's relation cannot be inferred or
/// a fixed value or exact value has no identity.
pub fn shape(
    registry: &Registry,
    ty: TypeId,
    include_inherited: bool,
) -> Result<NodeShape, DefinitionError> {
    let declared = registry.get(ty);
    let fields = if include_inherited {
        registry.fields(ty)
    } else {
        registry.own_fields(ty)
    };

    let mut properties: Vec<PropertyShape> = Vec::new();
    let mut index: HashMap<TypeId, usize> = HashMap::new();
    for field in fields {
        if !field.templatize {
            continue;
        }
        let Resolution::Relation(relation) = resolve(registry, ty, field)? else {
            continue;
        };
        let slot = *index.entry(relation).or_insert_with(|| {
            properties.push(PropertyShape {
                path: registry.get(relation).iri(),
                comment: String::new(),
                min_count: 0,
                max_count: None,
                restrictions: Vec::new(),
            });
            properties.len() - 1
        });
        let property = &mut properties[slot];

        if field.exact_values.as_ref().is_some_and(Vec::is_empty) {
            property.max_count = Some(0);
        } else {
            if field.is_required() || field.is_fixed() {
                property.min_count += 1;
            }
            if property.max_count.is_none() {
                property.max_count = field.max;
            }
        }
        if property.comment.is_empty() {
            property.comment = rationale(registry, ty, field, relation);
        }
        property.restrictions.extend(restrictions(registry, ty, field)?);
    }

    tracing::debug!(
        shape = %registry.display(ty),
        properties = properties.len(),
        "generated shape"
    );
    Ok(NodeShape {
        class: declared.iri(),
        label: declared.label.map(str::to_owned),
        comment: declared.comment.map(str::to_owned),
        parent: registry
            .meaningful_parent(ty)
            .map(|p| registry.get(p).iri()),
        extra_types: declared.extra_types.clone(),
        properties,
    })
}

fn rationale(registry: &Registry, ty: TypeId, field: &Field, relation: TypeId) -> String {
    if let Some(comment) = field.comment {
        return comment.to_owned();
    }
    let target = match field.fixed_value() {
        Some(v) => registry.get(v).name.to_owned(),
        None => match field.value_type.target(ty) {
            Target::Type(t) => registry.get(t).name.to_owned(),
            Target::Primitive(p) => p.as_str().to_owned(),
        },
    };
    format!(
        "A {} must be associated with {} using the relation {}.",
        registry.get(ty).name,
        target,
        registry.get(relation).name
    )
}

fn restrictions(
    registry: &Registry,
    ty: TypeId,
    field: &Field,
) -> Result<Vec<Restriction>, DefinitionError> {
    if let Some(fixed) = field.fixed_value() {
        return Ok(vec![Restriction::Qualified {
            shape: QualifiedShape::HasValue(registry.identity(fixed)?),
            min: 1,
            max: Some(1),
        }]);
    }
    if let Some(exact) = &field.exact_values {
        return exact
            .iter()
            .map(|&v| {
                Ok(Restriction::Qualified {
                    shape: QualifiedShape::HasValue(registry.identity(v)?),
                    min: 1,
                    max: Some(1),
                })
            })
            .collect();
    }
    let restriction = match field.value_type.target(ty) {
        Target::Primitive(p) => Restriction::Datatype(p),
        Target::Type(t) if field.qualified => Restriction::Qualified {
            shape: QualifiedShape::Class(registry.get(t).iri()),
            min: field.min,
            max: field.max,
        },
        Target::Type(t) => Restriction::Class(registry.get(t).iri()),
    };
    Ok(vec![restriction])
}

impl NodeShape {
    /// The shape as triples; property and qualified shapes are blank nodes
    /// labelled after the class.
    #[must_use]
    pub fn to_triples(&self) -> Vec<Triple> {
        let subject = Term::Iri(self.class.clone());
        let mut out = vec![
            Triple::new(subject.clone(), rdf_type(), RDFS.iri("Class")),
            Triple::new(subject.clone(), rdf_type(), SH.iri("NodeShape")),
        ];
        for extra in &self.extra_types {
            out.push(Triple::new(subject.clone(), rdf_type(), extra.clone()));
        }
        if let Some(parent) = &self.parent {
            out.push(Triple::new(subject.clone(), subclass_of(), parent.clone()));
        }
        if let Some(label) = &self.label {
            out.push(Triple::new(subject.clone(), RDFS.iri("label"), string(label)));
        }
        if let Some(comment) = &self.comment {
            out.push(Triple::new(subject.clone(), RDFS.iri("comment"), string(comment)));
        }

        let base = self.class.local().replace(|c: char| !c.is_ascii_alphanumeric(), "_");
        let mut nested = Vec::new();
        for (i, property) in self.properties.iter().enumerate() {
            let node = Term::Blank(format!("{base}_p{i}"));
            out.push(Triple::new(subject.clone(), SH.iri("property"), node.clone()));
            nested.push(Triple::new(node.clone(), SH.iri("path"), property.path.clone()));
            nested.push(Triple::new(
                node.clone(),
                RDFS.iri("comment"),
                string(&property.comment),
            ));
            for (j, restriction) in property.restrictions.iter().enumerate() {
                match restriction {
                    Restriction::Class(class) => {
                        nested.push(Triple::new(node.clone(), SH.iri("class"), class.clone()));
                    }
                    Restriction::Datatype(p) => {
                        nested.push(Triple::new(node.clone(), SH.iri("datatype"), p.datatype()));
                    }
                    Restriction::Qualified { shape, min, max } => {
                        let q = Term::Blank(format!("{base}_p{i}_q{j}"));
                        nested.push(Triple::new(
                            node.clone(),
                            SH.iri("qualifiedValueShape"),
                            q.clone(),
                        ));
                        nested.push(Triple::new(
                            node.clone(),
                            SH.iri("qualifiedMinCount"),
                            integer(*min),
                        ));
                        if let Some(max) = max {
                            nested.push(Triple::new(
                                node.clone(),
                                SH.iri("qualifiedMaxCount"),
                                integer(*max),
                            ));
                        }
                        match shape {
                            QualifiedShape::Class(c) => {
                                nested.push(Triple::new(q, SH.iri("class"), c.clone()));
                            }
                            QualifiedShape::HasValue(v) => {
                                nested.push(Triple::new(q, SH.iri("hasValue"), v.clone()));
                            }
                        }
                    }
                }
            }
            if property.min_count > 0 {
                nested.push(Triple::new(
                    node.clone(),
                    SH.iri("minCount"),
                    integer(property.min_count),
                ));
            }
            if let Some(max) = property.max_count {
                nested.push(Triple::new(node, SH.iri("maxCount"), integer(max)));
            }
        }
        out.extend(nested);
        out
    }

    /// The shape as a Turtle document.
    #[must_use]
    pub fn to_turtle(&self) -> String {
        to_turtle(&self.to_triples())
    }
}

fn string(s: &str) -> Literal {
    Literal::new(s, Primitive::String)
}

fn integer(n: u32) -> Literal {
    Literal::new(n.to_string(), Primitive::Integer)
}

/// `rdf:Property` definition of a relation type with its metadata.
///
/// # Errors
///
/// Returns [`DefinitionError::InvalidDeclaration`] if `relation` is not a
/// relation type.
pub fn property_definition(
    registry: &Registry,
    relation: TypeId,
) -> Result<Vec<Triple>, DefinitionError> {
    let declared = registry.get(relation);
    if !registry.is_relation(relation) {
        return Err(DefinitionError::InvalidDeclaration {
            type_name: registry.display(relation),
            reason: "not a relation type".to_owned(),
        });
    }
    let subject = declared.iri();
    let mut out = vec![Triple::new(subject.clone(), rdf_type(), RDF.iri("Property"))];
    if let Some(meta) = declared.relation_meta {
        let edges = [
            (RDFS.iri("subPropertyOf"), meta.sub_property_of),
            (RDFS.iri("domain"), meta.domain),
            (RDFS.iri("range"), meta.range),
        ];
        for (predicate, value) in edges {
            if let Some(v) = value {
                out.push(Triple::new(subject.clone(), predicate, registry.get(v).iri()));
            }
        }
    }
    if let Some(label) = declared.label {
        out.push(Triple::new(subject.clone(), RDFS.iri("label"), string(label)));
    }
    if let Some(comment) = declared.comment {
        out.push(Triple::new(subject, RDFS.iri("comment"), string(comment)));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Namespace, ValueType};
    use crate::registry::{FieldDecl, TypeDecl};

    const EX: Namespace = Namespace::new("ex", "urn:ex#");

    struct Fixture {
        registry: Registry,
        boxed: TypeId,
        cube: TypeId,
        has_length: TypeId,
    }

    fn fixture() -> Fixture {
        let mut b = Registry::builder();
        let m = b.markers();
        let has_dimension = b
            .declare(TypeDecl::new("hasDimension", EX).extends(m.predicate))
            .expect("rel");
        let has_length = b
            .declare(
                TypeDecl::new("hasLength", EX)
                    .extends(m.predicate)
                    .sub_property_of(has_dimension)
                    .label("has length"),
            )
            .expect("rel");
        let has_unit = b
            .declare(TypeDecl::new("hasUnit", EX).extends(m.predicate))
            .expect("rel");
        let unit = b
            .declare(TypeDecl::new("Unit", EX).extends(m.named_node).abstract_type())
            .expect("unit");
        let meter = b
            .declare(TypeDecl::new("M", EX).extends(unit))
            .expect("meter");
        let length = b
            .declare(
                TypeDecl::new("Length", EX)
                    .extends(m.value)
                    .allows(has_unit, unit)
                    .field(FieldDecl::required("unit", ValueType::Type(unit))),
            )
            .expect("length");
        let boxed = b
            .declare(
                TypeDecl::new("Box", EX)
                    .extends(m.node)
                    .label("Box")
                    .allows(has_dimension, length)
                    .field(
                        FieldDecl::required("width", ValueType::Type(length))
                            .comment("Width of the box."),
                    )
                    .field(FieldDecl::required("height", ValueType::Type(length)).max(2))
                    .field(FieldDecl::optional("depth", ValueType::Type(length))),
            )
            .expect("box");
        let metric = b
            .declare(TypeDecl::new("MetricLength", EX).extends(length).fix("unit", meter))
            .expect("metric");
        let cube = b
            .declare(
                TypeDecl::new("Cube", EX)
                    .extends(boxed)
                    .field(FieldDecl::required("side", ValueType::Type(metric)).qualified(false)),
            )
            .expect("cube");
        Fixture {
            registry: b.build(),
            boxed,
            cube,
            has_length,
        }
    }

    #[test]
    fn min_count_aggregates_required_fields_per_relation() {
        let f = fixture();
        let s = shape(&f.registry, f.boxed, true).expect("shape");
        assert_eq!(s.properties.len(), 1);
        let p = &s.properties[0];
        assert_eq!(p.path, EX.iri("hasDimension"));
        assert_eq!(p.min_count, 2);
        assert_eq!(p.max_count, Some(2));
        assert_eq!(p.comment, "Width of the box.");
        assert_eq!(p.restrictions.len(), 3);
        assert!(s.parent.is_none());
    }

    #[test]
    fn own_fields_only_without_inheritance() {
        let f = fixture();
        let own = shape(&f.registry, f.cube, false).expect("shape");
        assert_eq!(own.parent, Some(EX.iri("Box")));
        assert_eq!(own.properties[0].min_count, 1);
        assert_eq!(
            own.properties[0].restrictions,
            [Restriction::Class(EX.iri("MetricLength"))]
        );
        assert!(own.properties[0].comment.contains("Cube"));

        let all = shape(&f.registry, f.cube, true).expect("shape");
        assert_eq!(all.properties[0].min_count, 3);
    }

    #[test]
    fn fixed_fields_become_qualified_has_value() {
        let f = fixture();
        let metric = f.registry.find(EX, "MetricLength").expect("metric");
        let s = shape(&f.registry, metric, true).expect("shape");
        assert_eq!(
            s.properties[0].restrictions,
            [Restriction::Qualified {
                shape: QualifiedShape::HasValue(EX.iri("M")),
                min: 1,
                max: Some(1),
            }]
        );
        assert_eq!(s.parent, Some(EX.iri("Length")));
    }

    #[test]
    fn turtle_declares_class_and_node_shape() {
        let f = fixture();
        let ttl = shape(&f.registry, f.boxed, true).expect("shape").to_turtle();
        assert!(ttl.contains("ex:Box a rdfs:Class ;\n    a sh:NodeShape ;"));
        assert!(ttl.contains("sh:minCount \"2\"^^xsd:integer"));
        assert!(ttl.contains("sh:qualifiedValueShape _:Box_p0_q0"));
        assert!(ttl.contains("_:Box_p0_q0 sh:class ex:Length ."));
        assert!(ttl.contains("@prefix sh: <http://www.w3.org/ns/shacl#> ."));
    }

    #[test]
    fn property_definitions_carry_metadata() {
        let f = fixture();
        let triples = property_definition(&f.registry, f.has_length).expect("property");
        assert!(triples.contains(&Triple::new(
            EX.iri("hasLength"),
            RDFS.iri("subPropertyOf"),
            EX.iri("hasDimension")
        )));
        assert!(triples.contains(&Triple::new(
            EX.iri("hasLength"),
            rdf_type(),
            RDF.iri("Property")
        )));
        assert!(property_definition(&f.registry, f.boxed).is_err());
    }
}
