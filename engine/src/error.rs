//! Error types.
//!
//! Definition errors are author-facing and stop generation; coercion errors
//! are row-scoped and recoverable by the loader; divergence is its own fatal
//! variant so it is never mistaken for "nothing found".

use thiserror::Error;

/// The type declarations are incomplete or inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// No relation table entry matches a field.
    #[error("no relation found for field '{field}' with target '{target}' on {declaring_type}; set it explicitly")]
    UnresolvedRelation {
        /// Offending field.
        field: String,
        /// Type the field was resolved on.
        declaring_type: String,
        /// Unwrapped target of the field.
        target: String,
    },

    /// An abstract type was asked for an identity.
    #[error("{type_name} is abstract and has no identity")]
    MissingIdentity {
        /// The abstract type.
        type_name: String,
    },

    /// A name+namespace pair was declared twice.
    #[error("type {type_name} is already declared")]
    DuplicateType {
        /// The duplicated type.
        type_name: String,
    },

    /// A field name is not applicable to a type.
    #[error("{type_name} has no field '{field}'")]
    UnknownField {
        /// The type.
        type_name: String,
        /// The missing field.
        field: String,
    },

    /// A name or IRI does not belong to any declared type.
    #[error("unknown type {0}")]
    UnknownType(String),

    /// A declaration violates a structural rule.
    #[error("invalid declaration of {type_name}: {reason}")]
    InvalidDeclaration {
        /// The type being declared.
        type_name: String,
        /// What is wrong.
        reason: String,
    },
}

/// A bound value cannot become a field value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    /// A required column is absent or unbound.
    #[error("missing required column '{column}'")]
    MissingColumn {
        /// Column (field) name.
        column: String,
    },

    /// A required field has no value at construction.
    #[error("{type_name}: required field '{field}' has no value")]
    MissingField {
        /// The type under construction.
        type_name: String,
        /// The missing field.
        field: String,
    },

    /// A value was given for a field the type does not have.
    #[error("{type_name} has no field '{field}'")]
    UnknownField {
        /// The type under construction.
        type_name: String,
        /// The unknown field.
        field: String,
    },

    /// A value does not fit the field's target.
    #[error("cannot coerce {value} into {expected} for field '{field}'")]
    Uncoercible {
        /// The field.
        field: String,
        /// Rendered offending value.
        value: String,
        /// What the field expects.
        expected: String,
    },

    /// A bound IRI names no declared type acceptable for the field.
    #[error("'{identity}' is not a known identity for field '{field}'")]
    UnknownIdentity {
        /// The field.
        field: String,
        /// The bound IRI.
        identity: String,
    },
}

/// Any engine failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Declarations are incomplete.
    #[error("definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// Closure did not converge within its round bound.
    #[error("closure diverged: no fixpoint after {rounds} rounds")]
    Divergence {
        /// Rounds executed before giving up.
        rounds: usize,
    },

    /// A value could not be coerced.
    #[error("coercion error: {0}")]
    Coercion(#[from] CoercionError),

    /// The graph store failed.
    #[error("store error: {0}")]
    Store(String),
}

impl Error {
    /// Whether the loader may skip the row and continue.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Coercion(_))
    }
}

/// Result alias over [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
