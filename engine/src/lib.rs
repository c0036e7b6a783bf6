//! Declarative type-to-graph mapping.
//!
//! Types are declared once in a [`Registry`]: a hierarchy of entities,
//! values and relations whose fields carry cardinality, fixed values and
//! relation bindings. From those declarations the crate derives
//! parameterized triple templates, SHACL shapes and SPARQL queries, and
//! reconstructs typed [`Instance`]s from query results so that a serialized
//! instance loads back unchanged.
//!
//! # Entry Point
//!
//! ```
//! use semobj::{FieldDecl, Namespace, Primitive, Registry, TypeDecl, ValueType};
//!
//! const EX: Namespace = Namespace::new("ex", "urn:ex#");
//!
//! let mut b = Registry::builder();
//! let m = b.markers();
//! let has_dimension = b.declare(TypeDecl::new("hasDimension", EX).extends(m.predicate)).unwrap();
//! let has_value = b.declare(TypeDecl::new("hasValue", EX).extends(m.predicate)).unwrap();
//! let length = b
//!     .declare(
//!         TypeDecl::new("Length", EX)
//!             .extends(m.value)
//!             .allows(has_value, Primitive::Decimal)
//!             .field(FieldDecl::required("value", ValueType::Primitive(Primitive::Decimal))),
//!     )
//!     .unwrap();
//! let boxed = b
//!     .declare(
//!         TypeDecl::new("Box", EX)
//!             .extends(m.node)
//!             .allows(has_dimension, length)
//!             .field(FieldDecl::required("width", ValueType::Type(length))),
//!     )
//!     .unwrap();
//! let registry = b.build();
//!
//! let template = semobj::serializer::template::template(&registry, boxed).unwrap();
//! assert_eq!(template.dependencies[0].target, length);
//! ```
//!
//! # Round Trip
//!
//! ```
//! # use semobj::{FieldDecl, Namespace, Primitive, Registry, TypeDecl, ValueType};
//! use semobj::{namespaces::MODEL, Instance, Loader, MemoryStore};
//! # const EX: Namespace = Namespace::new("ex", "urn:ex#");
//! # let mut b = Registry::builder();
//! # let m = b.markers();
//! # let has_value = b.declare(TypeDecl::new("hasValue", EX).extends(m.predicate)).unwrap();
//! # let length = b
//! #     .declare(
//! #         TypeDecl::new("Length", EX)
//! #             .extends(m.value)
//! #             .allows(has_value, Primitive::Decimal)
//! #             .field(FieldDecl::required("value", ValueType::Primitive(Primitive::Decimal))),
//! #     )
//! #     .unwrap();
//! # let registry = b.build();
//! let side = Instance::builder(&registry, length).id("side").set("value", 2.5).build().unwrap();
//! let triples = semobj::serializer::instance::instance_triples(&registry, &side, MODEL).unwrap();
//! let store: MemoryStore = triples.into_iter().collect();
//!
//! let report = Loader::new(&registry, &store).query_and_load(length).unwrap();
//! assert_eq!(report.instances[0].as_ref(), &side);
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod closure;
pub mod error;
pub mod instance;
pub mod loader;
pub mod model;
pub mod namespaces;
pub mod query;
pub mod registry;
pub mod resolver;
pub mod serializer;
pub mod shape;
pub mod store;
pub mod term;

pub use closure::{Closure, ClosureOptions};
pub use error::{CoercionError, DefinitionError, Error, Result};
pub use instance::{Instance, InstanceBuilder, Value};
pub use loader::{LoadReport, Loader, LoaderOptions, RowError};
pub use model::{
    Field, InterFieldRelation, Markers, Namespace, Primitive, ResourceType, Target, TypeId,
    ValueType,
};
pub use query::{QualifierPolicy, QueryOptions, SelectQuery};
pub use registry::{FieldDecl, Registry, RegistryBuilder, TypeDecl};
pub use resolver::Resolution;
pub use shape::NodeShape;
pub use store::{GraphStore, MemoryStore, ResultTable};
pub use term::{Iri, Literal, Term, Triple};
