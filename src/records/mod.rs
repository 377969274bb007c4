//! Generic record operations: the canonical lifecycle shapes plus the CRUD,
//! type-resolution, and association primitives every per-entity wrapper
//! calls through to.

pub mod attach;
pub mod crud;
pub mod types;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

pub use attach::{resolve_target, reverse_lookup};
pub use crud::RecordService;
pub use types::{list_types, resolve_type, TypeRow};

/// Implicit cap applied when `list` is called without an explicit limit,
/// keeping interactive use bounded.
pub const DEFAULT_LIST_LIMIT: i64 = 10;

/// Polymorphic association: an inline reference to an arbitrary record.
///
/// Stored as JSONB with both keys defaulting to empty strings; set exactly
/// once at creation of the referencing record and never altered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub uu: String,
}

impl TableRef {
    pub fn new(table_name: impl Into<String>, uu: Uuid) -> Self {
        Self {
            table_name: table_name.into(),
            uu: uu.to_string(),
        }
    }

    /// True when neither key carries a value — the record is standalone.
    pub fn is_empty(&self) -> bool {
        self.table_name.is_empty() && self.uu.is_empty()
    }
}

/// Minimal identifying projection returned from `create`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecordSummary {
    pub uu: Uuid,
    pub search_key: String,
    pub name: Option<String>,
}

/// Parameters for the generic `create` operation. Every field is optional;
/// absent fields are *omitted* from the INSERT so column defaults (random
/// search_key, empty record_json) apply.
#[derive(Debug, Clone, Default)]
pub struct NewRecord {
    pub search_key: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Type identifiers: at most one may be supplied; none resolves the
    /// entity's default type.
    pub type_uu: Option<Uuid>,
    pub type_search_key: Option<String>,
    pub type_name: Option<String>,
    /// Self-reference for hierarchical entities.
    pub parent_uu: Option<Uuid>,
    /// Owning record for line tables.
    pub header_uu: Option<Uuid>,
    pub record_json: Option<JsonValue>,
    pub is_template: Option<bool>,
    pub is_valid: Option<bool>,
    /// Association target. `attach_uu` alone triggers a reverse lookup;
    /// `attach_table` qualifies it when the caller already knows the table.
    pub attach_uu: Option<Uuid>,
    pub attach_table: Option<String>,
}

/// Filters for the generic `list` operation.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Include soft-deleted rows. Default: excluded.
    pub include_revoked: bool,
    /// Return template records only. Default: templates excluded on tables
    /// that model them.
    pub templates_only: bool,
    /// Explicit row cap; [`DEFAULT_LIST_LIMIT`] when absent.
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_ref_defaults_to_empty_strings() {
        let blank = TableRef::default();
        assert!(blank.is_empty());
        let json = serde_json::to_value(&blank).unwrap();
        assert_eq!(json, serde_json::json!({"table_name": "", "uu": ""}));

        let parsed: TableRef = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn table_ref_round_trips() {
        let uu = Uuid::new_v4();
        let target = TableRef::new("business_partner", uu);
        let json = serde_json::to_value(&target).unwrap();
        let back: TableRef = serde_json::from_value(json).unwrap();
        assert_eq!(back, target);
        assert!(!back.is_empty());
    }
}
