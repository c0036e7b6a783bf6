//! Parameterized templates.
//!
//! A template is the graph shape of one type with placeholders in the
//! [`PARAM`](crate::namespaces::PARAM) namespace: `P:name` for the subject
//! and `P:<field>` for every parameterized field. Fixed fields become
//! constant triples. Every complex placeholder used in the body has a
//! dependency naming the template that fills it.

use std::collections::{BTreeMap, HashSet};

use crate::error::DefinitionError;
use crate::model::{Field, TypeId};
use crate::namespaces::rdf_type;
use crate::registry::Registry;
use crate::resolver::{resolve, Resolution};
use crate::term::{param, Iri, Term, Triple};

/// Default subject placeholder.
pub const SUBJECT: &str = "name";

/// Object placeholder of relation templates.
pub const RELATION_TARGET: &str = "target";

/// Another template this one needs, with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Type whose template fills the placeholder.
    pub target: TypeId,
    /// Argument mapping; `name` is bound to the field placeholder.
    pub args: BTreeMap<String, String>,
}

/// The template of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// The type.
    pub root: TypeId,
    /// Subject placeholder name.
    pub subject: String,
    /// Body triples, in emission order.
    pub body: Vec<Triple>,
    /// Dependencies, in field order.
    pub dependencies: Vec<Dependency>,
    /// Parameters that may be left unbound.
    pub optional: Vec<&'static str>,
}

impl Template {
    /// Placeholder IRIs used in the body, first-seen order.
    #[must_use]
    pub fn parameters(&self) -> Vec<&Iri> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for t in &self.body {
            for term in [&t.subject, &t.object] {
                if let Term::Iri(iri) = term {
                    if iri.is_param() && seen.insert(iri) {
                        out.push(iri);
                    }
                }
            }
        }
        out
    }
}

/// Template of `ty` with the default subject placeholder.
///
/// # Errors
///
/// Returns a [`DefinitionError`] if a relation cannot be inferred or a
/// required identity belongs to an abstract type.
pub fn template(registry: &Registry, ty: TypeId) -> Result<Template, DefinitionError> {
    template_for(registry, ty, SUBJECT)
}

/// Template of `ty` with subject placeholder `subject`.
///
/// # Errors
///
/// See [`template`].
pub fn template_for(
    registry: &Registry,
    ty: TypeId,
    subject: &str,
) -> Result<Template, DefinitionError> {
    let identity = registry.identity(ty)?;
    let subject_iri = param(subject);

    if registry.is_relation(ty) {
        return Ok(Template {
            root: ty,
            subject: subject.to_owned(),
            body: vec![Triple::new(subject_iri, identity, param(RELATION_TARGET))],
            dependencies: Vec::new(),
            optional: Vec::new(),
        });
    }

    let links = registry.inter_field_relations(ty);
    let sources: HashSet<&str> = links.iter().map(|l| l.source).collect();

    let mut body = vec![Triple::new(subject_iri.clone(), rdf_type(), identity)];
    let mut optional = Vec::new();
    let fields = registry.fields(ty);
    for field in &fields {
        if !field.templatize {
            continue;
        }
        if field.optional && !field.is_fixed() {
            optional.push(field.name);
        }
        if sources.contains(field.name) {
            continue;
        }
        let Resolution::Relation(relation) = resolve(registry, ty, field)? else {
            continue;
        };
        let relation = registry.identity(relation)?;

        if let Some(fixed) = field.fixed_value() {
            body.push(Triple::new(
                subject_iri.clone(),
                relation,
                registry.identity(fixed)?,
            ));
        } else if let Some(exact) = &field.exact_values {
            for &value in exact {
                body.push(Triple::new(
                    subject_iri.clone(),
                    relation.clone(),
                    registry.identity(value)?,
                ));
            }
        } else {
            body.push(Triple::new(subject_iri.clone(), relation, param(field.name)));
        }
    }

    for link in &links {
        body.push(Triple::new(
            param(link.source),
            registry.identity(link.relation)?,
            param(link.target),
        ));
    }

    let used: HashSet<Term> = body
        .iter()
        .flat_map(|t| [t.subject.clone(), t.object.clone()])
        .collect();
    let dependencies = fields
        .iter()
        .filter(|f| used.contains(&Term::Iri(param(f.name))))
        .filter_map(|f| dependency(registry, ty, f))
        .collect();

    tracing::debug!(
        template = %registry.display(ty),
        triples = body.len(),
        "generated template"
    );
    Ok(Template {
        root: ty,
        subject: subject.to_owned(),
        body,
        dependencies,
        optional,
    })
}

/// The dependency of a parameterized field, if its target has a template.
fn dependency(registry: &Registry, context: TypeId, field: &Field) -> Option<Dependency> {
    if field.is_fixed() || field.exact_values.is_some() {
        return None;
    }
    let target = field.value_type.target(context).type_id()?;
    if !registry.get(target).templatize {
        return None;
    }
    let args = BTreeMap::from([("name".to_owned(), field.name.to_owned())]);
    Some(Dependency { target, args })
}
