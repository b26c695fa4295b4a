//! Error taxonomy for query building and execution.
//!
//! Every failure in this crate is deterministic: the same input fails the same
//! way, so nothing here is retried. Callers match on [`Error`] to tell a
//! malformed request ([`DataError`]) from an access denial
//! ([`PermissionError`]) or a backend failure ([`StoreError`]).

use crate::permission::Action;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error returned by every entry point.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Malformed or disallowed field/filter expression.
    #[error(transparent)]
    Data(#[from] DataError),
    /// The actor may not read the entity or one of its fields.
    #[error(transparent)]
    Permission(#[from] PermissionError),
    /// The record store failed to execute a statement or load a schema.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Options or permission rules could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Whether this is a [`DataError`].
    pub const fn is_data(&self) -> bool {
        matches!(self, Self::Data(_))
    }

    /// Whether this is a [`PermissionError`].
    pub const fn is_permission(&self) -> bool {
        matches!(self, Self::Permission(_))
    }
}

/// A request that can never succeed as written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DataError {
    /// A requested output field failed the sanitizer grammar.
    #[error("invalid field expression `{expr}`: {reason}")]
    InvalidFieldExpression {
        /// The expression as the caller wrote it.
        expr: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The record store has no such entity.
    #[error("unknown entity `{0}`")]
    UnknownEntity(String),
    /// The entity has no such field.
    #[error("unknown field `{field}` on entity `{entity}`")]
    UnknownField {
        /// Entity that was searched.
        entity: String,
        /// Field that was not found.
        field: String,
    },
    /// Operator text outside the supported set.
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),
    /// Filter input whose shape matches none of the accepted forms.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    /// A filter value the operator cannot use.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Field the value was given for.
        field: String,
        /// What was wrong with it.
        reason: String,
    },
    /// Malformed `order_by` or `group_by` clause.
    #[error("invalid {clause} `{expr}`: {reason}")]
    InvalidClause {
        /// Either `order_by` or `group_by`.
        clause: &'static str,
        /// The offending text.
        expr: String,
        /// Why it was rejected.
        reason: String,
    },
    /// Referenced entity cannot be joined to the queried one.
    #[error("cannot join `{joined}` into a query on `{entity}`: {reason}")]
    UnsupportedJoin {
        /// Entity being queried.
        entity: String,
        /// Entity that was referenced.
        joined: String,
        /// Why the join is not possible.
        reason: &'static str,
    },
    /// A configured limit was exceeded.
    #[error("{what} exceeds the limit of {max}")]
    LimitExceeded {
        /// What grew too large.
        what: &'static str,
        /// The configured maximum.
        max: usize,
    },
}

/// Access denied for the current actor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum PermissionError {
    /// No permission at all for the action on the entity.
    #[error("`{actor}` has no {action} permission on `{entity}`")]
    NoAccess {
        /// Actor identifier.
        actor: String,
        /// Entity that was requested.
        entity: String,
        /// Action that was attempted.
        action: Action,
    },
    /// Entity is readable but this field is not.
    #[error("`{actor}` may not read field `{field}` of `{entity}`")]
    FieldNotReadable {
        /// Actor identifier.
        actor: String,
        /// Entity that was requested.
        entity: String,
        /// Field outside the actor's allow-list.
        field: String,
    },
}

/// Failure reported by a [`RecordStore`](crate::RecordStore) implementation.
#[derive(Debug, thiserror::Error)]
#[error("record store error: {message}")]
pub struct StoreError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StoreError {
    /// Error with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a backend error.
    pub fn from_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The message given at construction.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Options or permission rules that failed to load.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// TOML syntax or schema error.
    #[error("invalid {what} configuration: {source}")]
    Toml {
        /// Which document failed (`options`, `permissions`).
        what: &'static str,
        /// Underlying parser error.
        #[source]
        source: toml::de::Error,
    },
    /// Parsed but semantically invalid.
    #[error("invalid {what} configuration: {reason}")]
    Invalid {
        /// Which document failed.
        what: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}
