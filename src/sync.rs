//! Type Synchronizer: projects enum registry entries into type tables.
//!
//! Idempotent by construction — each member row is inserted with
//! `ON CONFLICT (search_key) DO NOTHING`, so re-running after the registry
//! grows inserts only the new members and an unchanged registry is a pure
//! no-op. Type row uu values are issued once by the column default and are
//! never touched on re-sync.

use sqlx::PgPool;
use tracing::{debug, info};

use crate::catalog;
use crate::error::{Result, StackError};
use crate::ident::{qualify, validate_identifier, CONVENTION_SCHEMA};
use crate::registry::{kebab_case, EnumId, EnumMember};

/// Synchronizes one type table from its registry enum, derived from the
/// table name by the `<entity>_type` convention. Returns the number of rows
/// inserted (zero when already converged).
pub async fn synchronize(pool: &PgPool, type_table: &str) -> Result<u64> {
    let table = validate_identifier(type_table)?;
    let enum_id = EnumId::from_type_table(table).ok_or_else(|| {
        StackError::validation(format!("'{table}' is not a registered type table"))
    })?;
    synchronize_members(pool, table, enum_id.members()).await
}

/// Projects an explicit member slice into a type table. The target table
/// must already exist — a missing table is a precondition violation, never a
/// silent skip.
pub async fn synchronize_members(
    pool: &PgPool,
    type_table: &str,
    members: &[EnumMember],
) -> Result<u64> {
    let table = validate_identifier(type_table)?;
    if !catalog::table_exists(pool, CONVENTION_SCHEMA, table).await? {
        return Err(StackError::precondition(format!(
            "type table {CONVENTION_SCHEMA}.{table} does not exist"
        )));
    }

    let qualified = qualify(CONVENTION_SCHEMA, table)?;
    let sql = format!(
        r#"
        INSERT INTO {qualified}
            (type_enum, search_key, name, description, is_default, record_json)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (search_key) DO NOTHING
        "#
    );

    let mut inserted = 0;
    for member in members {
        let payload: serde_json::Value = match member.payload {
            Some(raw) => serde_json::from_str(raw)?,
            None => serde_json::json!({}),
        };
        let result = sqlx::query(&sql)
            .bind(member.name)
            .bind(kebab_case(member.name))
            .bind(member.name)
            .bind(member.comment)
            .bind(member.is_default)
            .bind(&payload)
            .execute(pool)
            .await?;
        if result.rows_affected() > 0 {
            debug!("synchronized {table} member {}", member.name);
            inserted += result.rows_affected();
        }
    }

    if inserted > 0 {
        info!("type table {table}: inserted {inserted} member(s)");
    }
    Ok(inserted)
}

/// Synchronizes every registered type table; the convergence entry point
/// migrations call. Fails fast on the first error.
pub async fn synchronize_all(pool: &PgPool) -> Result<u64> {
    let mut inserted = 0;
    for enum_id in EnumId::ALL {
        inserted += synchronize(pool, enum_id.type_table()).await?;
    }
    Ok(inserted)
}
