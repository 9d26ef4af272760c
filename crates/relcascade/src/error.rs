use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Validation failures never travel through this type; they are reported as
/// field errors on the owner record.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Assignment or lookup against a relation name the owner model never declared.
    pub fn unknown_relation(entity_path: &str, relation: &str) -> Self {
        Self::new(
            ErrorClass::Configuration,
            ErrorOrigin::Relation,
            format!("unknown relation: entity={entity_path} relation={relation}"),
        )
    }

    /// Construct a relation-origin configuration error.
    pub(crate) fn relation_config(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Configuration, ErrorOrigin::Relation, message)
    }

    /// Construct a coercion-origin configuration error.
    pub(crate) fn coercion_config(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Configuration, ErrorOrigin::Coercion, message)
    }

    /// Construct a coercion-origin not-found error.
    pub(crate) fn coercion_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotFound, ErrorOrigin::Coercion, message)
    }

    /// Construct a cascade-origin conflict (a collaborator refused a child write).
    pub(crate) fn cascade_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Conflict, ErrorOrigin::Cascade, message)
    }

    /// Construct a cascade-origin invariant violation.
    pub(crate) fn cascade_invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvariantViolation, ErrorOrigin::Cascade, message)
    }

    /// Construct a delete-origin unsupported-operation error.
    pub(crate) fn delete_unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Delete, message)
    }

    /// Construct a store-origin internal error.
    pub fn store_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Store, message)
    }

    /// Construct a transaction-origin internal error.
    pub fn transaction_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Transaction, message)
    }

    pub fn store_not_found(key: impl Into<String>) -> Self {
        let key = key.into();

        Self::new(
            ErrorClass::NotFound,
            ErrorOrigin::Store,
            format!("record not found: {key}"),
        )
    }

    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self.class, ErrorClass::Configuration)
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
/// Error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Configuration,
    NotFound,
    Internal,
    Conflict,
    Unsupported,
    InvariantViolation,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
            Self::Conflict => "conflict",
            Self::Unsupported => "unsupported",
            Self::InvariantViolation => "invariant_violation",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Relation,
    Coercion,
    Cascade,
    Delete,
    Store,
    Transaction,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Relation => "relation",
            Self::Coercion => "coercion",
            Self::Cascade => "cascade",
            Self::Delete => "delete",
            Self::Store => "store",
            Self::Transaction => "transaction",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///
