//! Live-catalog introspection.
//!
//! The provisioner and the generic CRUD layer operate over tables they do
//! not know at compile time. This module is the only place that reads the
//! Postgres catalogs, and it feeds two consumers:
//!
//! - [`CatalogSnapshot`]: an immutable value the trigger provisioner resolves
//!   rule scopes against (pure, unit-testable resolution).
//! - [`convention_tables`] / [`table_columns`]: the allowlists the CRUD
//!   layer validates caller-supplied table and column names against.

use std::collections::{BTreeMap, BTreeSet};

use sqlx::{PgPool, Row};

use crate::error::Result;
use crate::ident::Allowlist;

/// Point-in-time view of the catalog state provisioning needs.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    /// All ordinary and partitioned tables in the convention schema,
    /// partition children included.
    pub base_tables: BTreeSet<String>,
    /// Tables that are partition children of some parent. Automation
    /// attaches at the parent, so these are excluded from every rule scope.
    pub partition_children: BTreeSet<String>,
    /// Existing non-internal trigger names, keyed by table.
    pub triggers: BTreeMap<String, BTreeSet<String>>,
}

impl CatalogSnapshot {
    pub async fn load(pool: &PgPool, schema: &str) -> Result<Self> {
        let base_tables = sqlx::query(
            r#"
            SELECT c.relname
            FROM pg_catalog.pg_class c
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1
              AND c.relkind IN ('r', 'p')
            "#,
        )
        .bind(schema)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| row.get::<String, _>("relname"))
        .collect();

        let partition_children = sqlx::query(
            r#"
            SELECT c.relname
            FROM pg_catalog.pg_inherits i
            JOIN pg_catalog.pg_class c ON c.oid = i.inhrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1
            "#,
        )
        .bind(schema)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| row.get::<String, _>("relname"))
        .collect();

        let mut triggers: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let rows = sqlx::query(
            r#"
            SELECT c.relname AS table_name, t.tgname AS trigger_name
            FROM pg_catalog.pg_trigger t
            JOIN pg_catalog.pg_class c ON c.oid = t.tgrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1
              AND NOT t.tgisinternal
            "#,
        )
        .bind(schema)
        .fetch_all(pool)
        .await?;
        for row in rows {
            triggers
                .entry(row.get::<String, _>("table_name"))
                .or_default()
                .insert(row.get::<String, _>("trigger_name"));
        }

        Ok(Self {
            base_tables,
            partition_children,
            triggers,
        })
    }

    /// Tables a trigger rule may attach to: base tables minus partition
    /// children.
    pub fn provisionable_tables(&self) -> impl Iterator<Item = &str> {
        self.base_tables
            .iter()
            .filter(|t| !self.partition_children.contains(*t))
            .map(String::as_str)
    }

    pub fn is_provisionable(&self, table: &str) -> bool {
        self.base_tables.contains(table) && !self.partition_children.contains(table)
    }

    pub fn has_trigger(&self, table: &str, trigger_name: &str) -> bool {
        self.triggers
            .get(table)
            .is_some_and(|set| set.contains(trigger_name))
    }
}

/// Whether a table exists in the given schema.
pub async fn table_exists(pool: &PgPool, schema: &str, table: &str) -> Result<bool> {
    let row = sqlx::query(
        r#"
        SELECT 1 AS present
        FROM pg_catalog.pg_class c
        JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = $1
          AND c.relname = $2
          AND c.relkind IN ('r', 'p')
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

/// Column names of a table, for validating caller-requested projections.
pub async fn table_columns(pool: &PgPool, schema: &str, table: &str) -> Result<BTreeSet<String>> {
    let rows = sqlx::query(
        r#"
        SELECT column_name
        FROM information_schema.columns
        WHERE table_schema = $1
          AND table_name = $2
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| row.get::<String, _>("column_name"))
        .collect())
}

/// Allowlist of entity tables implementing the record convention: base
/// tables (partition children excluded) carrying the `uu`, `created`, and
/// `revoked` lifecycle columns. This is the runtime registry of resolvable
/// polymorphic-association targets.
pub async fn convention_tables(pool: &PgPool, schema: &str) -> Result<Allowlist> {
    let rows = sqlx::query(
        r#"
        SELECT c.relname
        FROM pg_catalog.pg_class c
        JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = $1
          AND c.relkind IN ('r', 'p')
          AND c.oid NOT IN (SELECT inhrelid FROM pg_catalog.pg_inherits)
          AND EXISTS (
              SELECT 1 FROM information_schema.columns col
              WHERE col.table_schema = n.nspname
                AND col.table_name = c.relname
                AND col.column_name = 'uu'
          )
          AND EXISTS (
              SELECT 1 FROM information_schema.columns col
              WHERE col.table_schema = n.nspname
                AND col.table_name = c.relname
                AND col.column_name = 'revoked'
          )
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;
    Ok(Allowlist::new(
        rows.into_iter().map(|row| row.get::<String, _>("relname")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> CatalogSnapshot {
        CatalogSnapshot {
            base_tables: ["event", "item", "change_log", "change_log_default"]
                .into_iter()
                .map(String::from)
                .collect(),
            partition_children: ["change_log_default"].into_iter().map(String::from).collect(),
            triggers: BTreeMap::from([(
                "event".to_string(),
                BTreeSet::from(["t00100_stamp_updated".to_string()]),
            )]),
        }
    }

    #[test]
    fn partition_children_are_never_provisionable() {
        let snap = snapshot();
        let tables: Vec<&str> = snap.provisionable_tables().collect();
        assert_eq!(tables, vec!["change_log", "event", "item"]);
        assert!(!snap.is_provisionable("change_log_default"));
        assert!(snap.is_provisionable("change_log"));
    }

    #[test]
    fn trigger_lookup_is_per_table() {
        let snap = snapshot();
        assert!(snap.has_trigger("event", "t00100_stamp_updated"));
        assert!(!snap.has_trigger("item", "t00100_stamp_updated"));
        assert!(!snap.has_trigger("event", "t10100_change_log"));
    }
}
