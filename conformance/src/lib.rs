//! semobj conformance suite.
//!
//! Runs every generator of the engine over a reference building vocabulary
//! and validates what comes out: template bodies and their export
//! documents, SHACL shapes and property definitions, closed-world SPARQL
//! queries, and instance round trips through an in-memory store.
//!
//! # Conformance Scope
//!
//! | Artifact | Standard |
//! |----------|----------|
//! | Template bodies | Turtle 1.1, N-Triples |
//! | Template export | YAML 1.2, JSON |
//! | Shapes and property definitions | Turtle 1.1, SHACL Core |
//! | Queries | SPARQL 1.1 (lexical and structural checks) |
//! | Instances | serialize then load yields an equal instance |
//!
//! # Entry Point
//!
//! ```no_run
//! use semobj_conformance::{run_all, Options};
//!
//! let report = run_all(&Options::default()).expect("Failed to run conformance");
//! assert!(report.all_passed());
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod report;
pub mod validators;
pub mod vocabulary;

pub use report::{ConformanceReport, Severity, TestResult};
pub use vocabulary::{building, Vocabulary};

use anyhow::{anyhow, Context};

/// What to validate.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Root type names in the building namespace; empty means the
    /// vocabulary's default roots.
    pub roots: Vec<String>,
}

/// Runs all conformance validators and returns the aggregated report.
///
/// Validators are run in this order:
/// 1. Templates (Turtle, N-Triples, dependencies, YAML and JSON export)
/// 2. Shapes and property definitions
/// 3. Queries
/// 4. Instance round trips
///
/// # Errors
///
/// Returns an error if the vocabulary cannot be declared or a requested
/// root is unknown.
pub fn run_all(options: &Options) -> anyhow::Result<ConformanceReport> {
    let vocab = building().context("declaring the building vocabulary")?;
    let roots = if options.roots.is_empty() {
        vocab.default_roots()
    } else {
        options
            .roots
            .iter()
            .map(|name| {
                vocab
                    .root(name)
                    .ok_or_else(|| anyhow!("unknown root type {name}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    let mut report = ConformanceReport::new();

    // 1. Templates
    report.extend(validators::templates::validate(&vocab, &roots));

    // 2. Shapes
    report.extend(validators::shapes::validate(&vocab, &roots));

    // 3. Queries
    report.extend(validators::queries::validate(&vocab, &roots));

    // 4. Round trips
    report.extend(validators::round_trip::validate(&vocab));

    Ok(report)
}

#[cfg(test)]
mod tests_unit {
    use super::*;

    fn failures(report: &ConformanceReport) -> Vec<&TestResult> {
        report.results.iter().filter(|r| r.is_failure()).collect()
    }

    #[test]
    fn full_suite_passes() {
        let report = run_all(&Options::default()).expect("conformance");
        assert!(
            report.all_passed(),
            "conformance failures: {:#?}",
            failures(&report)
        );
    }

    #[test]
    fn single_root_passes() {
        let options = Options {
            roots: vec!["Window".to_owned()],
        };
        let report = run_all(&options).expect("conformance");
        assert!(report.all_passed(), "{report}");
    }

    #[test]
    fn unknown_root_is_rejected() {
        let options = Options {
            roots: vec!["Atrium".to_owned()],
        };
        assert!(run_all(&options).is_err());
    }

    #[test]
    fn templates_cover_the_closure() {
        let vocab = building().expect("vocabulary");
        let report = validators::templates::validate(&vocab, &vocab.default_roots());
        assert!(
            failures(&report).is_empty(),
            "template failures: {:#?}",
            failures(&report)
        );
    }
}
