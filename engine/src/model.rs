//! Core type model.
//!
//! These types describe declared resource types as plain data: each
//! [`ResourceType`] records its parents, its own [`Field`]s, its own explicit
//! relation table and its inter-field links. Records are created once by the
//! [`RegistryBuilder`](crate::RegistryBuilder) and never mutated afterwards;
//! resolution, serialization and loading all operate over them.

use crate::namespaces::XSD;
use crate::term::Iri;

/// A namespace: prefix plus base IRI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    /// The prefix used in Turtle and SPARQL (e.g., `"s223"`).
    pub prefix: &'static str,
    /// The full base IRI (e.g., `"http://data.ashrae.org/standard223#"`).
    pub iri: &'static str,
}

impl Namespace {
    /// Creates a namespace.
    #[must_use]
    pub const fn new(prefix: &'static str, iri: &'static str) -> Self {
        Self { prefix, iri }
    }

    /// An IRI in this namespace.
    pub fn iri(self, local: impl Into<String>) -> Iri {
        Iri::new(self, local)
    }
}

/// Handle to a type declared in a [`Registry`](crate::Registry).
///
/// Two handles are equal iff they name the same declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    /// Position of the declaration in its registry.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Scalar value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    /// `xsd:string`.
    String,
    /// `xsd:integer`.
    Integer,
    /// `xsd:decimal`.
    Decimal,
    /// `xsd:boolean`.
    Boolean,
}

impl Primitive {
    /// Lower-case name used in messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Integer => "integer",
            Primitive::Decimal => "decimal",
            Primitive::Boolean => "boolean",
        }
    }

    /// The XSD datatype IRI.
    #[must_use]
    pub fn datatype(self) -> Iri {
        XSD.iri(self.as_str())
    }
}

/// Declared value type of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    /// A scalar.
    Primitive(Primitive),
    /// Another declared type.
    Type(TypeId),
    /// The type being processed.
    SelfRef,
    /// Optional-of.
    Optional(Box<ValueType>),
    /// Collection-of.
    Collection(Box<ValueType>),
}

impl ValueType {
    /// Wraps `inner` as optional.
    #[must_use]
    pub fn optional(inner: ValueType) -> Self {
        ValueType::Optional(Box::new(inner))
    }

    /// Wraps `inner` as a collection.
    #[must_use]
    pub fn collection(inner: ValueType) -> Self {
        ValueType::Collection(Box::new(inner))
    }

    /// Strips wrappers; a self-reference becomes `context`.
    #[must_use]
    pub fn target(&self, context: TypeId) -> Target {
        match self {
            ValueType::Primitive(p) => Target::Primitive(*p),
            ValueType::Type(t) => Target::Type(*t),
            ValueType::SelfRef => Target::Type(context),
            ValueType::Optional(inner) | ValueType::Collection(inner) => inner.target(context),
        }
    }

    /// Whether an optional wrapper appears anywhere.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        match self {
            ValueType::Optional(_) => true,
            ValueType::Collection(inner) => inner.is_optional(),
            _ => false,
        }
    }

    /// Whether a collection wrapper appears anywhere.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        match self {
            ValueType::Collection(_) => true,
            ValueType::Optional(inner) => inner.is_collection(),
            _ => false,
        }
    }
}

/// An unwrapped field target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// A scalar.
    Primitive(Primitive),
    /// A declared type.
    Type(TypeId),
}

impl Target {
    /// The type handle, if the target is not a scalar.
    #[must_use]
    pub fn type_id(self) -> Option<TypeId> {
        match self {
            Target::Type(t) => Some(t),
            Target::Primitive(_) => None,
        }
    }
}

/// How a field names its graph relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationBinding {
    /// Infer from the relation tables of the declaring type's ancestry.
    Infer,
    /// Always this relation.
    Explicit(TypeId),
    /// No graph relation; the field is skipped.
    Suppressed,
}

/// Whether a field's value is supplied per instance or baked into the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldBinding {
    /// Supplied per instance; a placeholder in templates.
    Parameterized,
    /// Fixed to the identity of this type.
    Fixed(TypeId),
}

/// A named, typed member of a resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field name; also the placeholder and query-variable name.
    pub name: &'static str,
    /// Declared value type.
    pub value_type: ValueType,
    /// Minimum cardinality.
    pub min: u32,
    /// Maximum cardinality, if bounded.
    pub max: Option<u32>,
    /// Nest the class restriction in a qualified value shape.
    pub qualified: bool,
    /// Participates in templates, closure and queries.
    pub templatize: bool,
    /// Declared with the optional helper; may stay unset.
    pub optional: bool,
    /// Relation binding.
    pub relation: RelationBinding,
    /// Parameterized or fixed.
    pub binding: FieldBinding,
    /// Closed set of allowed identities, if any. An empty set means "none".
    pub exact_values: Option<Vec<TypeId>>,
    /// Human-readable label.
    pub label: Option<&'static str>,
    /// Description; used as the shape comment.
    pub comment: Option<&'static str>,
    /// Type whose declaration created this record.
    pub declared_by: TypeId,
}

impl Field {
    /// The fixed identity, if any.
    #[must_use]
    pub fn fixed_value(&self) -> Option<TypeId> {
        match self.binding {
            FieldBinding::Fixed(t) => Some(t),
            FieldBinding::Parameterized => None,
        }
    }

    /// Whether the value is baked into the type.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.fixed_value().is_some()
    }

    /// Whether an instance must supply a value.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.min > 0 && !self.optional && !self.value_type.is_optional()
    }

    /// Whether the relation is explicitly suppressed.
    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        self.relation == RelationBinding::Suppressed
    }
}

/// An explicit relation table entry: `relation` is legal toward `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationEntry {
    /// The relation type.
    pub relation: TypeId,
    /// The target it is legal toward.
    pub target: Target,
}

/// A relation connecting two fields of the same type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterFieldRelation {
    /// Field on the subject side.
    pub source: &'static str,
    /// The relation type.
    pub relation: TypeId,
    /// Field on the object side.
    pub target: &'static str,
    /// Minimum cardinality.
    pub min: u32,
    /// Maximum cardinality, if bounded.
    pub max: Option<u32>,
    /// Nest the class restriction in a qualified value shape.
    pub qualified: bool,
    /// Human-readable label.
    pub label: Option<&'static str>,
    /// Description.
    pub comment: Option<&'static str>,
}

impl InterFieldRelation {
    /// A required link `source --relation--> target`.
    #[must_use]
    pub fn new(source: &'static str, relation: TypeId, target: &'static str) -> Self {
        Self {
            source,
            relation,
            target,
            min: 1,
            max: None,
            qualified: true,
            label: None,
            comment: None,
        }
    }
}

/// Property metadata carried by relation types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationMeta {
    /// Parent relation (`rdfs:subPropertyOf`).
    pub sub_property_of: Option<TypeId>,
    /// `rdfs:domain`.
    pub domain: Option<TypeId>,
    /// `rdfs:range`.
    pub range: Option<TypeId>,
}

/// A declared entity, value or relation type.
#[derive(Debug, Clone)]
pub struct ResourceType {
    /// Registry handle.
    pub id: TypeId,
    /// Symbolic name, unique within the namespace.
    pub name: &'static str,
    /// Namespace of the type IRI.
    pub namespace: Namespace,
    /// Human-readable label.
    pub label: Option<&'static str>,
    /// Description.
    pub comment: Option<&'static str>,
    /// Abstract types have no identity and are left out of collections.
    pub is_abstract: bool,
    /// Whether the type gets a template of its own.
    pub templatize: bool,
    /// Direct parents, left to right.
    pub parents: Vec<TypeId>,
    /// Own field declarations, in declaration order.
    pub fields: Vec<Field>,
    /// Own explicit relation table, in declaration order.
    pub relations: Vec<RelationEntry>,
    /// Own inter-field links.
    pub links: Vec<InterFieldRelation>,
    /// Present on relation types that declare property metadata.
    pub relation_meta: Option<RelationMeta>,
    /// Additional `rdf:type`s asserted by the shape.
    pub extra_types: Vec<Iri>,
    pub(crate) ancestry: Vec<TypeId>,
}

impl ResourceType {
    /// The type IRI, regardless of abstractness.
    #[must_use]
    pub fn iri(&self) -> Iri {
        self.namespace.iri(self.name)
    }

    /// `prefix:Name`, for messages.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.namespace.prefix, self.name)
    }

    /// An own field declaration by name.
    #[must_use]
    pub fn own_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// The marker types seeded into every registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Markers {
    /// Root of the hierarchy.
    pub resource: TypeId,
    /// Ancestor of every relation type.
    pub predicate: TypeId,
    /// Ancestor of every entity and value type.
    pub node: TypeId,
    /// Ancestor of value types (a `Node`).
    pub value: TypeId,
    /// Ancestor of named, non-templatized identities such as units (a `Node`).
    pub named_node: TypeId,
}

impl Markers {
    /// Whether `t` is one of the markers.
    #[must_use]
    pub fn contains(&self, t: TypeId) -> bool {
        [
            self.resource,
            self.predicate,
            self.node,
            self.value,
            self.named_node,
        ]
        .contains(&t)
    }
}
