//! Round-trip validator.
//!
//! Serializes sample instances of the reference vocabulary into an
//! in-memory store, queries them back through the loader and compares the
//! reconstructed instances with the originals.

use std::rc::Rc;

use semobj::namespaces::MODEL;
use semobj::serializer::instance::instance_triples;
use semobj::{Instance, Loader, MemoryStore, Result, TypeId};

use crate::report::{ConformanceReport, TestResult};
use crate::vocabulary::Vocabulary;

const VALIDATOR: &str = "round_trip";

/// Builds the samples and checks that each one survives the round trip.
pub fn validate(vocab: &Vocabulary) -> ConformanceReport {
    let mut report = ConformanceReport::new();
    let samples = match samples(vocab) {
        Ok(samples) => samples,
        Err(e) => {
            report.push(TestResult::fail(
                VALIDATOR,
                format!("sample instances rejected: {e}"),
            ));
            return report;
        }
    };
    for sample in &samples {
        report.push(check(vocab, sample));
    }
    report
}

fn check(vocab: &Vocabulary, sample: &Instance) -> TestResult {
    let registry = &vocab.registry;
    let name = registry.display(sample.type_id());
    let validator = format!("{VALIDATOR}/{}", registry.get(sample.type_id()).name);

    let store: MemoryStore = match instance_triples(registry, sample, MODEL) {
        Ok(triples) => triples.into_iter().collect(),
        Err(e) => return TestResult::fail(validator, format!("{name}: serialization failed: {e}")),
    };
    let loaded = match Loader::new(registry, &store).query_and_load(sample.type_id()) {
        Ok(loaded) => loaded,
        Err(e) => return TestResult::fail(validator, format!("{name}: loading failed: {e}")),
    };

    let mut problems: Vec<String> = loaded
        .errors
        .iter()
        .map(|e| format!("row {}: {}", e.row, e.error))
        .collect();
    match loaded.get(sample.id()) {
        Some(back) if back.as_ref() == sample => {}
        Some(back) => problems.push(format!(
            "reconstructed {} differs: {} vs {}",
            sample.id(),
            back.field_values(registry, true),
            sample.field_values(registry, true)
        )),
        None => problems.push(format!("{} was not reconstructed", sample.id())),
    }
    TestResult::from_problems(
        validator,
        format!("{name} survives the round trip ({} triples)", store.len()),
        format!("{name} does not survive the round trip"),
        problems,
    )
}

/// One sample per root of the vocabulary, nested values included.
fn samples(vocab: &Vocabulary) -> Result<Vec<Instance>> {
    let registry = &vocab.registry;
    let h = vocab.handles;
    let property = |ty: TypeId, value: f64, unit: TypeId| {
        Instance::builder(registry, ty)
            .set("value", value)
            .set("unit", unit)
            .build()
            .map(Rc::new)
    };

    let space = Instance::builder(registry, h.space)
        .id("lobby")
        .set("area", property(h.area, 42.5, h.square_metre)?)
        .build()?;
    let window = Instance::builder(registry, h.window)
        .id("south_window")
        .set("area", property(h.area, 1.5, h.square_metre)?)
        .set("azimuth", property(h.azimuth, 180.0, h.degree)?)
        .set("tilt", property(h.tilt, 90.0, h.degree)?)
        .build()?;
    let zone = Instance::builder(registry, h.zone)
        .id("south_zone")
        .set("space", Rc::new(space.clone()))
        .set("window", Rc::new(window.clone()))
        .build()?;
    Ok(vec![space, window, zone])
}
