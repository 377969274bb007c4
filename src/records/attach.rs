//! Polymorphic association resolution.
//!
//! A target is `{table_name, uu}` where the table is not statically known.
//! The set of resolvable target kinds is the runtime allowlist of
//! convention tables, derived from the live catalog — never a free-form
//! string taken from the caller.

use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::catalog;
use crate::error::{Result, StackError};
use crate::ident::{qualify, CONVENTION_SCHEMA};

use super::TableRef;

/// Resolves an association target for a record being created.
///
/// With `table_name` supplied the uu is verified to exist in that table
/// (referential failure otherwise); without it the convention tables are
/// scanned for the owner.
pub async fn resolve_target(
    pool: &PgPool,
    uu: Uuid,
    table_name: Option<&str>,
) -> Result<TableRef> {
    match table_name {
        Some(table) => {
            let allow = catalog::convention_tables(pool, CONVENTION_SCHEMA).await?;
            let table = allow.require(table)?;
            if !row_exists(pool, table, uu).await? {
                return Err(StackError::referential(format!(
                    "uu {uu} does not belong to {CONVENTION_SCHEMA}.{table}"
                )));
            }
            Ok(TableRef::new(table, uu))
        }
        None => reverse_lookup(pool, uu).await?.map_or_else(
            || {
                Err(StackError::referential(format!(
                    "uu {uu} not found in any convention table"
                )))
            },
            |table| Ok(TableRef::new(table, uu)),
        ),
    }
}

/// Scans the convention tables for the one owning `uu`. `None` when no
/// table holds it — uu values are globally unique, so the first hit wins.
pub async fn reverse_lookup(pool: &PgPool, uu: Uuid) -> Result<Option<String>> {
    let allow = catalog::convention_tables(pool, CONVENTION_SCHEMA).await?;
    for table in allow.iter() {
        if row_exists(pool, table, uu).await? {
            debug!("reverse lookup: uu {uu} belongs to {table}");
            return Ok(Some(table.to_string()));
        }
    }
    Ok(None)
}

async fn row_exists(pool: &PgPool, table: &str, uu: Uuid) -> Result<bool> {
    let qualified = qualify(CONVENTION_SCHEMA, table)?;
    let row = sqlx::query(&format!("SELECT 1 FROM {qualified} WHERE uu = $1"))
        .bind(uu)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}
