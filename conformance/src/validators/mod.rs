//! Validators over the artifacts generated for the reference vocabulary.

pub mod queries;
pub mod round_trip;
pub mod shapes;
pub mod templates;

use sophia_api::source::TripleSource;

/// Parses `text` as Turtle and returns the number of triples read.
pub(crate) fn parse_turtle(text: &str) -> Result<usize, String> {
    let mut count = 0;
    sophia_turtle::parser::turtle::parse_str(text)
        .for_each_triple(|_| count += 1)
        .map_err(|e| e.to_string())?;
    Ok(count)
}

/// Parses `text` as N-Triples and returns the number of triples read.
pub(crate) fn parse_ntriples(text: &str) -> Result<usize, String> {
    let mut count = 0;
    sophia_turtle::parser::nt::parse_str(text)
        .for_each_triple(|_| count += 1)
        .map_err(|e| e.to_string())?;
    Ok(count)
}
