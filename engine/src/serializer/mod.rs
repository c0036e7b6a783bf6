//! Serializers from declared types and instances to graph text.
//!
//! - **Templates** ([`template`]): parameterized triple sets plus dependencies
//! - **Turtle** ([`turtle`]): template bodies and shapes for RDF tooling
//! - **N-Triples** ([`ntriples`]): instance graphs for bulk loading
//! - **Instances** ([`instance`]): concrete triples of an [`Instance`](crate::Instance)
//! - **Export** ([`export`]): per-category template records as YAML or JSON

pub mod export;
pub mod instance;
pub mod ntriples;
pub mod template;
pub mod turtle;
