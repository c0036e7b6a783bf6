//! Reconstruction of typed instances from query results.
//!
//! The reverse half of the round trip. Each row of a [`ResultTable`] holds
//! the root identity in the root column and one binding per field variable.
//! Rows sharing a root identity describe one instance: a collection field
//! gathers the distinct bindings of its column across them. Complex
//! bindings become nested instances built from the store's own triples.
//! Within one [`Loader::load`] call, every identity is
//! materialized once and shared; an identity met again while it is still
//! being constructed becomes [`Value::CircularRef`].
//!
//! A root whose rows cannot be coerced is skipped and reported in
//! [`LoadReport::errors`]; definition errors abort the whole load.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::error::{CoercionError, Error, Result};
use crate::instance::{coerce_scalar, Instance, Value};
use crate::model::{Field, Namespace, Target, TypeId};
use crate::namespaces::{rdf_type, MODEL};
use crate::query::{query_with, variable, QueryOptions};
use crate::registry::Registry;
use crate::resolver::{resolve, Resolution};
use crate::serializer::template::SUBJECT;
use crate::store::{GraphStore, ResultTable, Row};
use crate::term::{Iri, Term};

/// Loader settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Namespace whose local names are instance identities.
    pub instance_namespace: Namespace,
    /// Column holding the root identity.
    pub root_column: String,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            instance_namespace: MODEL,
            root_column: SUBJECT.to_owned(),
        }
    }
}

/// A skipped row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// Index of the row in the table; the first of its rows for a root
    /// bound by several.
    pub row: usize,
    /// Why it was skipped.
    pub error: CoercionError,
}

/// Outcome of one load.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Root instances, one per distinct root identity, in first-row order.
    pub instances: Vec<Rc<Instance>>,
    /// Rows that failed coercion.
    pub errors: Vec<RowError>,
}

impl LoadReport {
    /// A root instance by identity.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Rc<Instance>> {
        self.instances.iter().find(|i| i.id() == id)
    }
}

/// Where the bindings of an instance come from: the result rows of one
/// root identity, or the store's triples about a nested identity.
enum Bindings<'t> {
    Rows(&'t [&'t Row]),
    Store(&'t Iri),
}

/// The result rows sharing one root identity.
struct RootRows<'t> {
    /// Index of the first row, used when reporting.
    first: usize,
    id: String,
    rows: Vec<&'t Row>,
}

/// Batch-scoped state.
#[derive(Default)]
struct Batch {
    cache: HashMap<String, Rc<Instance>>,
    in_progress: HashSet<String>,
}

/// Loads instances of declared types from a [`GraphStore`].
pub struct Loader<'a, S: GraphStore + ?Sized> {
    registry: &'a Registry,
    store: &'a S,
    options: LoaderOptions,
}

impl<'a, S: GraphStore + ?Sized> Loader<'a, S> {
    /// A loader with default options.
    #[must_use]
    pub fn new(registry: &'a Registry, store: &'a S) -> Self {
        Self {
            registry,
            store,
            options: LoaderOptions::default(),
        }
    }

    /// Replaces the options.
    #[must_use]
    pub fn with_options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    /// The options in use.
    #[must_use]
    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Builds one instance of `ty` per distinct root identity in `table`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Definition`] if `ty` or a nested type cannot be
    /// resolved; coercion failures are reported per row instead.
    pub fn load(&self, ty: TypeId, table: &ResultTable) -> Result<LoadReport> {
        let mut batch = Batch::default();
        let mut report = LoadReport::default();

        for RootRows { first, id, rows } in self.group_rows(table, &mut report) {
            if let Some(cached) = batch.cache.get(&id) {
                report.instances.push(Rc::clone(cached));
                continue;
            }
            batch.in_progress.clear();
            match self.construct(ty, id, Bindings::Rows(&rows), &mut batch) {
                Ok(instance) => report.instances.push(instance),
                Err(Error::Coercion(error)) => {
                    tracing::warn!(row = first, %error, "skipping row");
                    report.errors.push(RowError { row: first, error });
                }
                Err(other) => return Err(other),
            }
        }
        report.errors.sort_by_key(|e| e.row);
        tracing::debug!(
            ty = %self.registry.display(ty),
            instances = report.instances.len(),
            skipped = report.errors.len(),
            "loaded instances"
        );
        Ok(report)
    }

    /// Queries the store for `ty` and loads the result.
    ///
    /// # Errors
    ///
    /// Returns a definition error from query generation, a store error, or
    /// any error [`load`](Self::load) returns.
    pub fn query_and_load(&self, ty: TypeId) -> Result<LoadReport> {
        let options = QueryOptions {
            subject: self.options.root_column.clone(),
            ..QueryOptions::default()
        };
        let query = query_with(self.registry, ty, &options)?;
        let table = self.store.select(&query)?;
        self.load(ty, &table)
    }

    /// [`query_and_load`](Self::query_and_load) for several types; a
    /// failure for one type does not affect the others.
    #[must_use]
    pub fn load_many(&self, types: &[TypeId]) -> Vec<(TypeId, Result<LoadReport>)> {
        types
            .iter()
            .map(|&ty| (ty, self.query_and_load(ty)))
            .collect()
    }

    /// Rows grouped by root identity, in order of first appearance. Rows
    /// without a root identity are reported and dropped.
    fn group_rows<'t>(
        &self,
        table: &'t ResultTable,
        report: &mut LoadReport,
    ) -> Vec<RootRows<'t>> {
        let column = self.options.root_column.as_str();
        let mut groups: Vec<RootRows<'t>> = Vec::new();
        let mut slots: HashMap<String, usize> = HashMap::new();
        for (index, row) in table.rows.iter().enumerate() {
            let Some(Term::Iri(root)) = row.get(column) else {
                let error = CoercionError::MissingColumn {
                    column: column.to_owned(),
                };
                tracing::warn!(row = index, %error, "skipping row");
                report.errors.push(RowError { row: index, error });
                continue;
            };
            let id = self.identity_of(root);
            match slots.get(&id) {
                Some(&slot) => groups[slot].rows.push(row),
                None => {
                    slots.insert(id.clone(), groups.len());
                    groups.push(RootRows {
                        first: index,
                        id,
                        rows: vec![row],
                    });
                }
            }
        }
        groups
    }

    fn construct(
        &self,
        ty: TypeId,
        id: String,
        bindings: Bindings<'_>,
        batch: &mut Batch,
    ) -> Result<Rc<Instance>> {
        batch.in_progress.insert(id.clone());
        let built = self.build(ty, &id, &bindings, batch);
        batch.in_progress.remove(&id);

        let instance = Rc::new(built?);
        batch.cache.insert(id, Rc::clone(&instance));
        Ok(instance)
    }

    fn build(
        &self,
        ty: TypeId,
        id: &str,
        bindings: &Bindings<'_>,
        batch: &mut Batch,
    ) -> Result<Instance> {
        let registry = self.registry;
        let links = registry.inter_field_relations(ty);
        let mut builder = Instance::builder(registry, ty).id(id);

        for field in registry.fields(ty) {
            if field.is_fixed() || field.exact_values.is_some() || !field.templatize {
                continue;
            }
            let terms = match bindings {
                Bindings::Rows(rows) => {
                    let column = variable(field.name);
                    let mut terms: Vec<Term> = Vec::new();
                    for term in rows.iter().filter_map(|row| row.get(&column)) {
                        if !terms.contains(term) {
                            terms.push(term.clone());
                        }
                    }
                    if !field.value_type.is_collection() {
                        terms.truncate(1);
                    }
                    if terms.is_empty() {
                        if field.is_required() {
                            return Err(CoercionError::MissingColumn { column }.into());
                        }
                        continue;
                    }
                    terms
                }
                Bindings::Store(subject) => {
                    if links.iter().any(|l| l.source == field.name) {
                        continue;
                    }
                    let Resolution::Relation(relation) = resolve(registry, ty, field)? else {
                        continue;
                    };
                    let predicate = registry.identity(relation)?;
                    let found = self.store.objects(subject, &predicate);
                    let fitting = self.fitting(ty, field, found);
                    if fitting.is_empty() {
                        continue;
                    }
                    fitting
                }
            };

            let mut values = Vec::with_capacity(terms.len());
            for term in &terms {
                values.push(self.value(ty, field, term, batch)?);
            }
            let value = if field.value_type.is_collection() {
                Value::List(values)
            } else {
                match values.into_iter().next() {
                    Some(v) => v,
                    None => continue,
                }
            };
            builder = builder.set(field.name, value);
        }
        builder.build()
    }

    /// Store objects a field can take, for lookups that share a relation.
    fn fitting(&self, context: TypeId, field: &Field, found: Vec<Term>) -> Vec<Term> {
        let Target::Type(t) = field.value_type.target(context) else {
            return found
                .into_iter()
                .filter(|term| matches!(term, Term::Literal(_)))
                .collect();
        };
        let registry = self.registry;
        let named = !registry.get(t).templatize;
        found
            .into_iter()
            .filter(|term| match term {
                Term::Iri(iri) if named => registry
                    .find_by_iri(iri)
                    .is_some_and(|n| registry.is_a(n, t)),
                Term::Iri(iri) => self.concrete_type(iri, t).is_some(),
                _ => true,
            })
            .collect()
    }

    fn value(&self, context: TypeId, field: &Field, term: &Term, batch: &mut Batch) -> Result<Value> {
        let registry = self.registry;
        match (field.value_type.target(context), term) {
            (Target::Primitive(p), Term::Literal(lit)) => {
                let raw = Value::Str(lit.lexical.clone());
                coerce_scalar(p, &raw).ok_or_else(|| {
                    CoercionError::Uncoercible {
                        field: field.name.to_owned(),
                        value: lit.lexical.clone(),
                        expected: p.as_str().to_owned(),
                    }
                    .into()
                })
            }
            (Target::Type(_), Term::Literal(lit)) => Ok(Value::Str(lit.lexical.clone())),
            (Target::Type(t), Term::Iri(iri)) if !registry.get(t).templatize => {
                match registry.find_by_iri(iri) {
                    Some(named) if registry.is_a(named, t) => Ok(Value::Named(named)),
                    _ => Err(unknown_identity(field, term)),
                }
            }
            (Target::Type(t), Term::Iri(iri)) => {
                let id = self.identity_of(iri);
                if batch.in_progress.contains(&id) {
                    return Ok(Value::CircularRef(id));
                }
                if let Some(cached) = batch.cache.get(&id) {
                    return Ok(Value::Resource(Rc::clone(cached)));
                }
                let Some(concrete) = self.concrete_type(iri, t) else {
                    return Err(unknown_identity(field, term));
                };
                let nested = self.construct(concrete, id, Bindings::Store(iri), batch)?;
                Ok(Value::Resource(nested))
            }
            (target, _) => Err(CoercionError::Uncoercible {
                field: field.name.to_owned(),
                value: term.to_string(),
                expected: registry.display_target(target),
            }
            .into()),
        }
    }

    /// The most specific concrete type of `iri` that is a `t`, falling back
    /// to `t` itself when the store asserts no declared type for `iri`.
    fn concrete_type(&self, iri: &Iri, t: TypeId) -> Option<TypeId> {
        let registry = self.registry;
        let asserted: Vec<TypeId> = self
            .store
            .objects(iri, &rdf_type())
            .iter()
            .filter_map(Term::as_iri)
            .filter_map(|c| registry.find_by_iri(c))
            .collect();
        if asserted.is_empty() {
            return (!registry.get(t).is_abstract).then_some(t);
        }
        asserted
            .into_iter()
            .filter(|&c| registry.is_a(c, t) && !registry.get(c).is_abstract)
            .max_by_key(|&c| registry.ancestry(c).len())
    }

    fn identity_of(&self, iri: &Iri) -> String {
        if iri.namespace() == self.options.instance_namespace {
            iri.local().to_owned()
        } else {
            iri.to_string()
        }
    }
}

fn unknown_identity(field: &Field, term: &Term) -> Error {
    CoercionError::UnknownIdentity {
        field: field.name.to_owned(),
        identity: term.to_string(),
    }
    .into()
}
