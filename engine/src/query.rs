//! Query patterns that find instances of a type.
//!
//! The query mirrors the template: fixed fields are constant patterns,
//! parameterized fields are variables bound by their relation edge, and
//! complex targets get a type assertion. Optional fields move into
//! `OPTIONAL` groups so unset values do not hide an instance.
//!
//! Two closed-world filters are supported. A field with exact values binds a
//! fresh `?<field>_in` variable restricted with `IN (...)`, or, when the set
//! is empty, forbids the relation with `FILTER NOT EXISTS`. A
//! [`QualifierPolicy`] applies the same treatment to the qualifier edges of
//! every variable asserted to be one of its types.
//!
//! ```
//! use semobj::{query, FieldDecl, Namespace, Registry, TypeDecl, ValueType};
//!
//! const EX: Namespace = Namespace::new("ex", "urn:ex#");
//! let mut b = Registry::builder();
//! let m = b.markers();
//! let has_dimension = b.declare(TypeDecl::new("hasDimension", EX).extends(m.predicate)).unwrap();
//! let length = b.declare(TypeDecl::new("Length", EX).extends(m.value)).unwrap();
//! let boxed = b
//!     .declare(
//!         TypeDecl::new("Box", EX)
//!             .extends(m.node)
//!             .allows(has_dimension, length)
//!             .field(FieldDecl::required("width", ValueType::Type(length))),
//!     )
//!     .unwrap();
//! let registry = b.build();
//! let sparql = query::query(&registry, boxed).unwrap().to_string();
//! assert!(sparql.starts_with("PREFIX ex: <urn:ex#>\n"));
//! assert!(sparql.contains("?name ex:hasDimension ?width ."));
//! ```

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::error::DefinitionError;
use crate::model::{Field, Namespace, Target, TypeId};
use crate::namespaces::{rdf_type, RDF};
use crate::registry::Registry;
use crate::resolver::{resolve, Resolution};
use crate::serializer::template::SUBJECT;
use crate::term::Iri;

/// Closed-world qualifier handling for property-like types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifierPolicy {
    /// The qualifier relation (e.g., `s223:hasAspect`).
    pub relation: TypeId,
    /// Types, and their descendants, the policy applies to.
    pub applies_to: Vec<TypeId>,
}

/// Query settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Root variable name.
    pub subject: String,
    /// Optional qualifier policy.
    pub qualifier: Option<QualifierPolicy>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            subject: SUBJECT.to_owned(),
            qualifier: None,
        }
    }
}

/// Subject or object of a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternTerm {
    /// A variable, without `?`.
    Var(String),
    /// A constant.
    Iri(Iri),
}

impl PatternTerm {
    fn var(name: &str) -> Self {
        PatternTerm::Var(name.to_owned())
    }
}

/// A triple pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    /// Subject.
    pub subject: PatternTerm,
    /// Predicate.
    pub predicate: Iri,
    /// Object.
    pub object: PatternTerm,
}

impl Pattern {
    /// Creates a pattern.
    #[must_use]
    pub fn new(subject: PatternTerm, predicate: Iri, object: PatternTerm) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

/// A filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `FILTER(?var IN (...))`.
    In {
        /// Variable name, without `?`.
        var: String,
        /// Allowed identities.
        values: Vec<Iri>,
    },
    /// `FILTER NOT EXISTS { ... }`.
    NotExists(Vec<Pattern>),
}

/// Patterns and filters evaluated together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Group {
    /// Triple patterns.
    pub patterns: Vec<Pattern>,
    /// Filters scoped to this group.
    pub filters: Vec<Filter>,
}

impl Group {
    fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.filters.is_empty()
    }

    fn append(&mut self, other: Group) {
        self.patterns.extend(other.patterns);
        self.filters.extend(other.filters);
    }
}

/// A `SELECT DISTINCT *` query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectQuery {
    /// The required group.
    pub required: Group,
    /// `OPTIONAL` groups, left-joined in order.
    pub optional: Vec<Group>,
}

impl SelectQuery {
    /// Variables bound by patterns, in first-seen order.
    #[must_use]
    pub fn variables(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let groups = std::iter::once(&self.required).chain(&self.optional);
        for p in groups.flat_map(|g| &g.patterns) {
            for term in [&p.subject, &p.object] {
                if let PatternTerm::Var(v) = term {
                    if seen.insert(v.clone()) {
                        out.push(v.clone());
                    }
                }
            }
        }
        out
    }

    /// Namespaces dereferenced through prefixed names.
    #[must_use]
    pub fn prefixes(&self) -> BTreeSet<Namespace> {
        let mut used = BTreeSet::new();
        for group in std::iter::once(&self.required).chain(&self.optional) {
            for p in &group.patterns {
                note_pattern(&mut used, p);
            }
            for filter in &group.filters {
                match filter {
                    Filter::In { values, .. } => {
                        for v in values {
                            note(&mut used, v);
                        }
                    }
                    Filter::NotExists(patterns) => {
                        for p in patterns {
                            note_pattern(&mut used, p);
                        }
                    }
                }
            }
        }
        used
    }
}

fn note(used: &mut BTreeSet<Namespace>, iri: &Iri) {
    if iri.prefixed().is_some() {
        used.insert(iri.namespace());
    }
}

fn note_pattern(used: &mut BTreeSet<Namespace>, p: &Pattern) {
    if p.predicate != rdf_type() {
        note(used, &p.predicate);
    }
    for term in [&p.subject, &p.object] {
        if let PatternTerm::Iri(iri) = term {
            note(used, iri);
        }
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ns in self.prefixes() {
            writeln!(f, "PREFIX {}: <{}>", ns.prefix, ns.iri)?;
        }
        writeln!(f, "SELECT DISTINCT * WHERE {{")?;
        for p in &self.required.patterns {
            writeln!(f, "    {} .", pattern(p))?;
        }
        for group in &self.optional {
            writeln!(f, "    OPTIONAL {{")?;
            for p in &group.patterns {
                writeln!(f, "        {} .", pattern(p))?;
            }
            for filter in &group.filters {
                writeln!(f, "        {}", render_filter(filter))?;
            }
            writeln!(f, "    }}")?;
        }
        for filter in &self.required.filters {
            writeln!(f, "    {}", render_filter(filter))?;
        }
        write!(f, "}}")
    }
}

fn term(t: &PatternTerm) -> String {
    match t {
        PatternTerm::Var(v) => format!("?{v}"),
        PatternTerm::Iri(iri) => iri.to_compact(),
    }
}

fn pattern(p: &Pattern) -> String {
    let predicate = if p.predicate.namespace() == RDF && p.predicate.local() == "type" {
        "a".to_owned()
    } else {
        p.predicate.to_compact()
    };
    format!("{} {} {}", term(&p.subject), predicate, term(&p.object))
}

fn render_filter(filter: &Filter) -> String {
    match filter {
        Filter::In { var, values } => {
            let list: Vec<String> = values.iter().map(Iri::to_compact).collect();
            format!("FILTER(?{} IN ({}))", var, list.join(", "))
        }
        Filter::NotExists(patterns) => {
            let body: Vec<String> = patterns.iter().map(|p| format!("{} .", pattern(p))).collect();
            format!("FILTER NOT EXISTS {{ {} }}", body.join(" "))
        }
    }
}

/// The query variable of a field.
#[must_use]
pub fn variable(field: &str) -> String {
    field.replace('-', "_")
}

/// The variable bound by an exact-values field.
#[must_use]
pub fn exact_variable(field: &str) -> String {
    format!("{}_in", variable(field))
}

/// Query for instances of `ty` with default options.
///
/// # Errors
///
/// Returns a [`DefinitionError`] if a relation cannot be inferred or an
/// abstract type's identity is needed.
pub fn query(registry: &Registry, ty: TypeId) -> Result<SelectQuery, DefinitionError> {
    query_with(registry, ty, &QueryOptions::default())
}

/// Query for instances of `ty`.
///
/// # Errors
///
/// See [`query`].
pub fn query_with(
    registry: &Registry,
    ty: TypeId,
    options: &QueryOptions,
) -> Result<SelectQuery, DefinitionError> {
    let root = options.subject.as_str();
    let mut q = SelectQuery::default();
    q.required.patterns.push(Pattern::new(
        PatternTerm::var(root),
        rdf_type(),
        PatternTerm::Iri(registry.identity(ty)?),
    ));
    q.required.append(qualifiers(registry, options, root, ty)?);

    let links = registry.inter_field_relations(ty);
    let sources: HashSet<&str> = links.iter().map(|l| l.source).collect();
    let linked: HashSet<&str> = links.iter().flat_map(|l| [l.source, l.target]).collect();

    for field in registry.fields(ty) {
        if !field.templatize {
            continue;
        }
        let resolution = resolve(registry, ty, field)?;
        let var = variable(field.name);
        let mut group = Group::default();

        match resolution {
            Resolution::Relation(relation) if !sources.contains(field.name) => {
                let relation = registry.identity(relation)?;
                field_group(registry, options, root, ty, field, &var, relation, &mut group)?;
            }
            _ if linked.contains(field.name) => {
                group.append(type_assertion(registry, options, ty, field, &var)?);
            }
            _ => continue,
        }

        if field.is_required() || field.is_fixed() {
            q.required.append(group);
        } else if !group.is_empty() {
            q.optional.push(group);
        }
    }

    for link in links {
        let p = Pattern::new(
            PatternTerm::var(&variable(link.source)),
            registry.identity(link.relation)?,
            PatternTerm::var(&variable(link.target)),
        );
        if link.min > 0 {
            q.required.patterns.push(p);
        } else {
            q.optional.push(Group {
                patterns: vec![p],
                filters: Vec::new(),
            });
        }
    }

    tracing::debug!(
        query = %registry.display(ty),
        patterns = q.required.patterns.len(),
        optional = q.optional.len(),
        "generated query"
    );
    Ok(q)
}

#[allow(clippy::too_many_arguments)]
fn field_group(
    registry: &Registry,
    options: &QueryOptions,
    root: &str,
    ty: TypeId,
    field: &Field,
    var: &str,
    relation: Iri,
    group: &mut Group,
) -> Result<(), DefinitionError> {
    if let Some(fixed) = field.fixed_value() {
        group.patterns.push(Pattern::new(
            PatternTerm::var(root),
            relation,
            PatternTerm::Iri(registry.identity(fixed)?),
        ));
        return Ok(());
    }
    if let Some(exact) = &field.exact_values {
        let bound = exact_variable(field.name);
        let edge = Pattern::new(PatternTerm::var(root), relation, PatternTerm::var(&bound));
        if exact.is_empty() {
            group.filters.push(Filter::NotExists(vec![edge]));
        } else {
            let values = exact
                .iter()
                .map(|&v| registry.identity(v))
                .collect::<Result<Vec<_>, _>>()?;
            group.patterns.push(edge);
            group.filters.push(Filter::In { var: bound, values });
        }
        return Ok(());
    }
    group.patterns.push(Pattern::new(
        PatternTerm::var(root),
        relation,
        PatternTerm::var(var),
    ));
    group.append(type_assertion(registry, options, ty, field, var)?);
    Ok(())
}

/// `?var a Target` for concrete targets that carry instances of their own,
/// plus the target's qualifier constraints.
fn type_assertion(
    registry: &Registry,
    options: &QueryOptions,
    ty: TypeId,
    field: &Field,
    var: &str,
) -> Result<Group, DefinitionError> {
    let mut group = Group::default();
    let Target::Type(target) = field.value_type.target(ty) else {
        return Ok(group);
    };
    let declared = registry.get(target);
    if declared.is_abstract || !declared.templatize {
        return Ok(group);
    }
    group.patterns.push(Pattern::new(
        PatternTerm::var(var),
        rdf_type(),
        PatternTerm::Iri(declared.iri()),
    ));
    group.append(qualifiers(registry, options, var, target)?);
    Ok(group)
}

/// Qualifier constraints for a variable asserted to be of type `t`.
fn qualifiers(
    registry: &Registry,
    options: &QueryOptions,
    var: &str,
    t: TypeId,
) -> Result<Group, DefinitionError> {
    let mut group = Group::default();
    let Some(policy) = &options.qualifier else {
        return Ok(group);
    };
    if !policy.applies_to.iter().any(|&p| registry.is_a(t, p)) {
        return Ok(group);
    }

    let mut declared = Vec::new();
    for field in registry.fields(t) {
        if resolve(registry, t, field)? != Resolution::Relation(policy.relation) {
            continue;
        }
        declared.extend(field.fixed_value());
        declared.extend(field.exact_values.iter().flatten().copied());
    }
    let mut values = Vec::new();
    for v in declared {
        let iri = registry.identity(v)?;
        if !values.contains(&iri) {
            values.push(iri);
        }
    }

    let bound = format!("{var}_qualifiers_in");
    let edge = Pattern::new(
        PatternTerm::var(var),
        registry.identity(policy.relation)?,
        PatternTerm::var(&bound),
    );
    if values.is_empty() {
        group.filters.push(Filter::NotExists(vec![edge]));
    } else {
        group.patterns.push(edge);
        group.filters.push(Filter::In { var: bound, values });
    }
    Ok(group)
}
