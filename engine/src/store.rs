//! Graph store seam and an in-memory implementation.
//!
//! [`GraphStore`] is the interface to the external store: run a
//! [`SelectQuery`] to a complete [`ResultTable`], and look up the objects of
//! one subject/predicate pair. [`MemoryStore`] evaluates basic graph
//! patterns by backtracking, left-joins `OPTIONAL` groups, applies `IN` and
//! `NOT EXISTS` filters and removes duplicate rows.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::query::{Filter, Group, Pattern, PatternTerm, SelectQuery};
use crate::term::{Iri, Term, Triple};

/// One solution: variable name to bound term. Unbound variables are absent.
pub type Row = BTreeMap<String, Term>;

/// A complete query result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultTable {
    /// Projected variables, in query order.
    pub columns: Vec<String>,
    /// Solutions.
    pub rows: Vec<Row>,
}

impl ResultTable {
    /// An empty table with the given columns.
    #[must_use]
    pub fn new(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row.
    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether `column` is projected.
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// The external graph store.
pub trait GraphStore {
    /// Runs `query` to completion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`](crate::Error::Store) if the store cannot
    /// evaluate the query.
    fn select(&self, query: &SelectQuery) -> Result<ResultTable>;

    /// Objects of `(subject, predicate, ?)`, in store order.
    fn objects(&self, subject: &Iri, predicate: &Iri) -> Vec<Term>;
}

/// A graph held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    triples: Vec<Triple>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one triple; duplicates are ignored.
    pub fn insert(&mut self, triple: Triple) {
        if !self.triples.contains(&triple) {
            self.triples.push(triple);
        }
    }

    /// Number of distinct triples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// All triples, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    fn solve(&self, patterns: &[Pattern], seed: Row) -> Vec<Row> {
        let Some((first, rest)) = patterns.split_first() else {
            return vec![seed];
        };
        let mut out = Vec::new();
        for triple in &self.triples {
            if triple.predicate != first.predicate {
                continue;
            }
            let mut row = seed.clone();
            if bind(&mut row, &first.subject, &triple.subject)
                && bind(&mut row, &first.object, &triple.object)
            {
                out.extend(self.solve(rest, row));
            }
        }
        out
    }

    fn keep(&self, row: &Row, filters: &[Filter]) -> bool {
        filters.iter().all(|filter| match filter {
            Filter::In { var, values } => match row.get(var) {
                Some(Term::Iri(iri)) => values.contains(iri),
                _ => false,
            },
            Filter::NotExists(patterns) => self.solve(patterns, row.clone()).is_empty(),
        })
    }

    fn left_join(&self, rows: Vec<Row>, group: &Group) -> Vec<Row> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let extended: Vec<Row> = self
                .solve(&group.patterns, row.clone())
                .into_iter()
                .filter(|r| self.keep(r, &group.filters))
                .collect();
            if extended.is_empty() {
                out.push(row);
            } else {
                out.extend(extended);
            }
        }
        out
    }
}

impl FromIterator<Triple> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut store = MemoryStore::new();
        store.extend(iter);
        store
    }
}

impl Extend<Triple> for MemoryStore {
    fn extend<I: IntoIterator<Item = Triple>>(&mut self, iter: I) {
        for triple in iter {
            self.insert(triple);
        }
    }
}

impl GraphStore for MemoryStore {
    fn select(&self, query: &SelectQuery) -> Result<ResultTable> {
        let mut rows = self.solve(&query.required.patterns, Row::new());
        for group in &query.optional {
            rows = self.left_join(rows, group);
        }
        rows.retain(|r| self.keep(r, &query.required.filters));

        let mut table = ResultTable::new(query.variables());
        for row in rows {
            if !table.rows.contains(&row) {
                table.push(row);
            }
        }
        tracing::debug!(rows = table.len(), "evaluated query");
        Ok(table)
    }

    fn objects(&self, subject: &Iri, predicate: &Iri) -> Vec<Term> {
        self.triples
            .iter()
            .filter(|t| &t.predicate == predicate && t.subject.as_iri() == Some(subject))
            .map(|t| t.object.clone())
            .collect()
    }
}

/// Binds or checks one pattern position against a term.
fn bind(row: &mut Row, position: &PatternTerm, value: &Term) -> bool {
    match position {
        PatternTerm::Iri(iri) => value.as_iri() == Some(iri),
        PatternTerm::Var(var) => match row.get(var) {
            Some(bound) => bound == value,
            None => {
                row.insert(var.clone(), value.clone());
                true
            }
        },
    }
}
