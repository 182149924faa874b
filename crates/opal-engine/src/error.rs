//! Error types for the engine.

use crate::predicate::ParseError;

/// Errors surfaced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed predicate string.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Unknown table/column, duplicate name, or invalid type.
    #[error("schema error: {0}")]
    Schema(String),

    /// A row violated a constraint; carries the constraint name.
    #[error("constraint '{constraint}' violated: {reason}")]
    Constraint {
        /// User-visible constraint name.
        constraint: String,
        /// What went wrong.
        reason: String,
    },

    /// Begin-while-active, commit/rollback without an active transaction.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A table lock could not be granted.
    #[error("could not acquire {mode} lock on '{resource}'")]
    LockNotAcquired {
        /// Requested lock mode ("shared" or "exclusive").
        mode: &'static str,
        /// Resource name.
        resource: String,
    },

    /// A shared-to-exclusive upgrade was rejected because other holders
    /// exist.
    #[error("lock upgrade on '{0}' rejected")]
    UpgradeRejected(String),

    /// The deadlock detector found a cycle in the wait-for graph.
    #[error("deadlock detected")]
    DeadlockDetected,

    /// Authentication failure or privilege denial.
    #[error("authorization error: {0}")]
    Auth(String),

    /// Storage I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Unknown-table schema error.
    #[must_use]
    pub fn unknown_table(name: &str) -> Self {
        Self::Schema(format!("table '{name}' does not exist"))
    }

    /// Unknown-column schema error.
    #[must_use]
    pub fn unknown_column(table: &str, column: &str) -> Self {
        Self::Schema(format!("column '{column}' does not exist in table '{table}'"))
    }

    /// Duplicate-object schema error.
    #[must_use]
    pub fn duplicate(kind: &str, name: &str) -> Self {
        Self::Schema(format!("{kind} '{name}' already exists"))
    }

    /// Constraint violation with a named constraint.
    #[must_use]
    pub fn constraint(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Constraint {
            constraint: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
