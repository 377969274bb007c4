//! Error taxonomy for the schema-convention engine.
//!
//! Every fallible operation in this crate returns [`StackError`]. Lookups on
//! a missing uu are deliberately *not* errors — `get` returns `Ok(None)` —
//! so there is no NotFound variant here.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, StackError>;

/// Engine-level error classes.
#[derive(Error, Debug)]
pub enum StackError {
    /// A one-way lifecycle transition was attempted a second time, or on a
    /// record that does not exist.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller-supplied input could not be resolved or is ambiguous
    /// (unknown column, multiple type identifiers, malformed payload).
    #[error("validation: {0}")]
    Validation(String),

    /// A supplied uu does not belong to the expected table.
    #[error("referential: {0}")]
    Referential(String),

    /// A required precondition is missing (actor context, target table).
    #[error("precondition: {0}")]
    Precondition(String),

    /// Trigger-rule or type-synchronization configuration error. Fatal to
    /// the migration step that invoked provisioning.
    #[error("provisioning: {0}")]
    Provisioning(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StackError {
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn referential(msg: impl Into<String>) -> Self {
        Self::Referential(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn provisioning(msg: impl Into<String>) -> Self {
        Self::Provisioning(msg.into())
    }
}
