//! Template validator.
//!
//! Exports the templates of the closure of the roots and checks that:
//! - every body is well-formed Turtle
//! - every body round-trips through N-Triples with the same triple count
//! - every dependency names an exported template and binds a placeholder
//!   the body actually uses
//! - the YAML and JSON renderings parse back with one entry per template

use semobj::closure::closure;
use semobj::serializer::export::{export_templates, TemplateExport};
use semobj::serializer::ntriples::to_ntriples;
use semobj::serializer::template::template;
use semobj::{Iri, TypeId};

use super::{parse_ntriples, parse_turtle};
use crate::report::{ConformanceReport, TestResult};
use crate::vocabulary::Vocabulary;

const VALIDATOR: &str = "templates";

/// Validates the template export for `roots`.
pub fn validate(vocab: &Vocabulary, roots: &[TypeId]) -> ConformanceReport {
    let mut report = ConformanceReport::new();
    let export = match export_templates(&vocab.registry, roots) {
        Ok(export) => export,
        Err(e) => {
            report.push(TestResult::fail(
                VALIDATOR,
                format!("template export failed: {e}"),
            ));
            return report;
        }
    };
    if export.is_empty() {
        report.push(TestResult::fail(VALIDATOR, "no templates exported"));
        return report;
    }

    validate_bodies(&export, &mut report);
    validate_structure(vocab, roots, &export, &mut report);
    validate_documents(&export, &mut report);
    report
}

fn validate_bodies(export: &TemplateExport, report: &mut ConformanceReport) {
    let mut problems = Vec::new();
    let records = export
        .relations
        .iter()
        .chain(&export.entities)
        .chain(&export.values);
    for (name, record) in records {
        match parse_turtle(&record.body) {
            Ok(0) => problems.push(format!("{name}: empty body")),
            Ok(_) => {}
            Err(e) => problems.push(format!("{name}: {e}")),
        }
    }
    report.push(TestResult::from_problems(
        "templates/turtle",
        format!("{} template bodies parse as Turtle", export.len()),
        "template bodies are not valid Turtle",
        problems,
    ));
}

fn validate_structure(
    vocab: &Vocabulary,
    roots: &[TypeId],
    export: &TemplateExport,
    report: &mut ConformanceReport,
) {
    let registry = &vocab.registry;
    let found = match closure(registry, roots) {
        Ok(found) => found,
        Err(e) => {
            report.push(TestResult::fail(VALIDATOR, format!("closure failed: {e}")));
            return;
        }
    };

    let mut syntax = Vec::new();
    let mut dangling = Vec::new();
    for &t in found.relations.iter().chain(&found.entities) {
        let declared = registry.get(t);
        if !declared.templatize {
            continue;
        }
        let generated = match template(registry, t) {
            Ok(generated) => generated,
            Err(e) => {
                syntax.push(format!("{}: {e}", declared.name));
                continue;
            }
        };

        match parse_ntriples(&to_ntriples(&generated.body)) {
            Ok(n) if n == generated.body.len() => {}
            Ok(n) => syntax.push(format!(
                "{}: {n} N-Triples read back, {} generated",
                declared.name,
                generated.body.len()
            )),
            Err(e) => syntax.push(format!("{}: {e}", declared.name)),
        }

        let placeholders: Vec<&str> = generated.parameters().into_iter().map(Iri::local).collect();
        for dependency in &generated.dependencies {
            let target = registry.get(dependency.target).name;
            if export.get(target).is_none() {
                dangling.push(format!("{}: depends on unexported {target}", declared.name));
            }
            for bound in dependency.args.values() {
                if !placeholders.contains(&bound.as_str()) {
                    dangling.push(format!(
                        "{}: argument {bound} of {target} is not a placeholder",
                        declared.name
                    ));
                }
            }
        }
    }

    report.push(TestResult::from_problems(
        "templates/ntriples",
        "template bodies round-trip through N-Triples",
        "template bodies do not round-trip through N-Triples",
        syntax,
    ));
    report.push(TestResult::from_problems(
        "templates/dependencies",
        "every dependency resolves to an exported template",
        "dangling template dependencies",
        dangling,
    ));
}

fn validate_documents(export: &TemplateExport, report: &mut ConformanceReport) {
    let expected = export.len();

    let yaml = export
        .to_yaml()
        .map_err(|e| e.to_string())
        .and_then(|text| serde_yaml::from_str::<serde_yaml::Value>(&text).map_err(|e| e.to_string()))
        .map(|doc| count_entries(&doc));
    report.push(document_result("templates/yaml", "YAML", yaml, expected));

    let json = export
        .to_json()
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).map_err(|e| e.to_string()))
        .map(|doc| {
            ["relations", "entities", "values"]
                .iter()
                .filter_map(|k| doc.get(k).and_then(serde_json::Value::as_object))
                .map(serde_json::Map::len)
                .sum::<usize>()
        });
    report.push(document_result("templates/json", "JSON", json, expected));
}

fn count_entries(doc: &serde_yaml::Value) -> usize {
    ["relations", "entities", "values"]
        .iter()
        .filter_map(|k| doc.get(*k).and_then(serde_yaml::Value::as_mapping))
        .map(serde_yaml::Mapping::len)
        .sum()
}

fn document_result(
    validator: &str,
    format: &str,
    parsed: Result<usize, String>,
    expected: usize,
) -> TestResult {
    match parsed {
        Ok(n) if n == expected => TestResult::pass(
            validator,
            format!("{format} export holds {n} templates"),
        ),
        Ok(n) => TestResult::fail(
            validator,
            format!("{format} export holds {n} templates, expected {expected}"),
        ),
        Err(e) => TestResult::fail(validator, format!("{format} export does not parse: {e}")),
    }
}
