//! Type-resolution operations over synchronized type tables.

use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::catalog;
use crate::error::{Result, StackError};
use crate::ident::{qualify, validate_identifier, CONVENTION_SCHEMA};

/// A row of a per-entity type table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TypeRow {
    pub uu: Uuid,
    pub type_enum: String,
    pub search_key: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_default: bool,
    pub record_json: JsonValue,
}

const TYPE_COLUMNS: &str =
    "uu, type_enum, search_key, name, description, is_default, record_json";

/// Resolves the type table backing an entity table and verifies it exists.
async fn type_table_for(pool: &PgPool, entity_table: &str) -> Result<String> {
    let entity = validate_identifier(entity_table)?;
    let type_table = format!("{entity}_type");
    if !catalog::table_exists(pool, CONVENTION_SCHEMA, &type_table).await? {
        return Err(StackError::precondition(format!(
            "entity '{entity}' has no type table ({CONVENTION_SCHEMA}.{type_table} missing)"
        )));
    }
    Ok(type_table)
}

/// All active type rows for an entity kind.
pub async fn list_types(pool: &PgPool, entity_table: &str) -> Result<Vec<TypeRow>> {
    let type_table = type_table_for(pool, entity_table).await?;
    let qualified = qualify(CONVENTION_SCHEMA, &type_table)?;
    let rows = sqlx::query_as::<_, TypeRow>(&format!(
        "SELECT {TYPE_COLUMNS} FROM {qualified} WHERE revoked IS NULL ORDER BY search_key"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Resolves exactly one type row for an entity.
///
/// At most one identifier may be supplied; more than one is ambiguous and
/// rejected. With none, the row flagged `is_default` is returned. An
/// identifier that matches nothing, a missing default, or more than one
/// default row is a validation failure.
pub async fn resolve_type(
    pool: &PgPool,
    entity_table: &str,
    type_uu: Option<Uuid>,
    type_search_key: Option<&str>,
    type_name: Option<&str>,
) -> Result<TypeRow> {
    let supplied = usize::from(type_uu.is_some())
        + usize::from(type_search_key.is_some())
        + usize::from(type_name.is_some());
    if supplied > 1 {
        return Err(StackError::validation(
            "supply at most one of type_uu, type_search_key, type_name",
        ));
    }

    let type_table = type_table_for(pool, entity_table).await?;
    let qualified = qualify(CONVENTION_SCHEMA, &type_table)?;

    let row = if let Some(uu) = type_uu {
        sqlx::query_as::<_, TypeRow>(&format!(
            "SELECT {TYPE_COLUMNS} FROM {qualified} WHERE revoked IS NULL AND uu = $1"
        ))
        .bind(uu)
        .fetch_optional(pool)
        .await?
    } else if let Some(search_key) = type_search_key {
        sqlx::query_as::<_, TypeRow>(&format!(
            "SELECT {TYPE_COLUMNS} FROM {qualified} WHERE revoked IS NULL AND search_key = $1"
        ))
        .bind(search_key)
        .fetch_optional(pool)
        .await?
    } else if let Some(name) = type_name {
        sqlx::query_as::<_, TypeRow>(&format!(
            "SELECT {TYPE_COLUMNS} FROM {qualified} WHERE revoked IS NULL AND name = $1"
        ))
        .bind(name)
        .fetch_optional(pool)
        .await?
    } else {
        let mut defaults = sqlx::query_as::<_, TypeRow>(&format!(
            "SELECT {TYPE_COLUMNS} FROM {qualified} WHERE revoked IS NULL AND is_default"
        ))
        .fetch_all(pool)
        .await?;
        if defaults.len() > 1 {
            return Err(StackError::validation(format!(
                "{type_table} declares more than one default type"
            )));
        }
        defaults.pop()
    };

    row.ok_or_else(|| match (type_uu, type_search_key, type_name) {
        (Some(uu), _, _) => {
            StackError::validation(format!("no {type_table} row with uu {uu}"))
        }
        (_, Some(key), _) => {
            StackError::validation(format!("no {type_table} row with search_key '{key}'"))
        }
        (_, _, Some(name)) => {
            StackError::validation(format!("no {type_table} row named '{name}'"))
        }
        _ => StackError::validation(format!("{type_table} declares no default type")),
    })
}
