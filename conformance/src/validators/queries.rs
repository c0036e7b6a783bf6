//! SPARQL query validator.
//!
//! Generates the closed-world query of every concrete entity in the closure
//! and checks the rendered text and the query structure:
//! - every prefixed name uses a declared prefix
//! - braces and parentheses balance
//! - the root variable is bound first
//! - every `IN` filter tests a variable its own group binds

use std::collections::HashSet;

use semobj::closure::closure;
use semobj::query::{query_with, Filter, Group, PatternTerm, QueryOptions};
use semobj::{SelectQuery, TypeId};

use crate::report::{ConformanceReport, TestResult};
use crate::vocabulary::Vocabulary;

/// Validates generated queries for `roots`.
pub fn validate(vocab: &Vocabulary, roots: &[TypeId]) -> ConformanceReport {
    let mut report = ConformanceReport::new();
    let registry = &vocab.registry;
    let found = match closure(registry, roots) {
        Ok(found) => found,
        Err(e) => {
            report.push(TestResult::fail("queries", format!("closure failed: {e}")));
            return report;
        }
    };
    let options = QueryOptions {
        qualifier: Some(vocab.qualifier_policy()),
        ..QueryOptions::default()
    };

    let mut text = Vec::new();
    let mut structure = Vec::new();
    let mut generated = 0;
    for &t in &found.entities {
        let declared = registry.get(t);
        if declared.is_abstract || !declared.templatize {
            continue;
        }
        let name = registry.display(t);
        let query = match query_with(registry, t, &options) {
            Ok(query) => query,
            Err(e) => {
                structure.push(format!("{name}: {e}"));
                continue;
            }
        };
        generated += 1;
        let rendered = query.to_string();
        text.extend(undeclared_prefixes(&rendered).into_iter().map(|p| {
            format!("{name}: prefix {p}: is used but not declared")
        }));
        if !balanced(&rendered) {
            text.push(format!("{name}: unbalanced braces or parentheses"));
        }
        structure.extend(
            structural_problems(&query, &options.subject)
                .into_iter()
                .map(|p| format!("{name}: {p}")),
        );
    }

    report.push(TestResult::from_problems(
        "queries/syntax",
        format!("{generated} queries are lexically well-formed"),
        "queries are not well-formed",
        text,
    ));
    report.push(TestResult::from_problems(
        "queries/structure",
        "query filters and root bindings are consistent",
        "inconsistent query structure",
        structure,
    ));
    report
}

/// Prefixes referenced in the query body without a `PREFIX` line.
fn undeclared_prefixes(rendered: &str) -> Vec<String> {
    let mut declared = HashSet::new();
    let mut missing = Vec::new();
    for line in rendered.lines() {
        if let Some(rest) = line.strip_prefix("PREFIX ") {
            if let Some((prefix, _)) = rest.split_once(':') {
                declared.insert(prefix.to_owned());
            }
            continue;
        }
        let tokens = line
            .split(|c: char| c.is_whitespace() || "(),{}".contains(c))
            .map(|tok| tok.trim_end_matches('.'));
        for tok in tokens {
            if tok.starts_with('?') || tok.starts_with('<') {
                continue;
            }
            if let Some((prefix, _)) = tok.split_once(':') {
                if !declared.contains(prefix) && !missing.iter().any(|m| m == prefix) {
                    missing.push(prefix.to_owned());
                }
            }
        }
    }
    missing
}

fn balanced(rendered: &str) -> bool {
    let mut stack = Vec::new();
    for c in rendered.chars() {
        match c {
            '{' | '(' => stack.push(c),
            '}' if stack.pop() != Some('{') => return false,
            ')' if stack.pop() != Some('(') => return false,
            _ => {}
        }
    }
    stack.is_empty()
}

fn structural_problems(query: &SelectQuery, root: &str) -> Vec<String> {
    let mut problems = Vec::new();
    if query.variables().first().map(String::as_str) != Some(root) {
        problems.push(format!("?{root} is not the first variable"));
    }
    let required = bound(&query.required);
    for group in std::iter::once(&query.required).chain(&query.optional) {
        let local = bound(group);
        for filter in &group.filters {
            if let Filter::In { var, .. } = filter {
                if !local.contains(var.as_str()) && !required.contains(var.as_str()) {
                    problems.push(format!("?{var} is filtered but never bound"));
                }
            }
        }
    }
    problems
}

fn bound(group: &Group) -> HashSet<&str> {
    group
        .patterns
        .iter()
        .flat_map(|p| [&p.subject, &p.object])
        .filter_map(|term| match term {
            PatternTerm::Var(v) => Some(v.as_str()),
            PatternTerm::Iri(_) => None,
        })
        .collect()
}
