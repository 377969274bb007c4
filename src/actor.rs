//! Acting identity threaded through every mutating call.
//!
//! Audit columns (`created_by`, `updated_by`) are stamped from an explicit
//! [`ActorContext`] value, never from process-wide state. A blank identity
//! is a precondition failure at construction time, so mutating code paths
//! can rely on a non-empty name.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StackError};

/// The externally supplied identity performing a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    name: String,
}

impl ActorContext {
    /// Fails with [`StackError::Precondition`] when the name is empty or
    /// whitespace-only.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StackError::precondition(
                "acting identity is required for mutating operations",
            ));
        }
        Ok(Self { name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
