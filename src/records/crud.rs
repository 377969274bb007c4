//! Generic CRUD over convention tables.
//!
//! Every operation validates the caller-supplied table name against the
//! catalog-derived allowlist and every column name against the table's live
//! column set before any identifier reaches a statement. Values are always
//! bound as parameters; absent optional parameters are omitted from the
//! INSERT entirely so column defaults apply.

use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::BTreeSet;
use tracing::{debug, info};
use uuid::Uuid;

use crate::actor::ActorContext;
use crate::catalog;
use crate::error::{Result, StackError};
use crate::ident::{qualify, validate_identifier, CONVENTION_SCHEMA};

use super::{attach, types, ListFilter, NewRecord, RecordSummary, DEFAULT_LIST_LIMIT};

/// Runtime-typed parameter for dynamically assembled statements.
enum BindValue {
    Text(String),
    Uuid(Uuid),
    Bool(bool),
    Json(JsonValue),
}

/// Service exposing the generic record operations to per-entity wrappers.
#[derive(Clone, Debug)]
pub struct RecordService {
    pool: PgPool,
}

impl RecordService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates a record, returning the minimal identifying projection.
    ///
    /// Tables carrying `type_uu` get their type resolved through the generic
    /// type-resolution rules (explicit identifier or entity default). An
    /// association target, when supplied, is resolved and stored before the
    /// insert; it is immutable afterwards.
    pub async fn create(
        &self,
        actor: &ActorContext,
        table: &str,
        params: NewRecord,
    ) -> Result<RecordSummary> {
        let allow = catalog::convention_tables(&self.pool, CONVENTION_SCHEMA).await?;
        let table = allow.require(table)?.to_string();
        let columns = catalog::table_columns(&self.pool, CONVENTION_SCHEMA, &table).await?;

        let mut insert: Vec<(&str, BindValue)> = vec![
            ("created_by", BindValue::Text(actor.name().to_string())),
            ("updated_by", BindValue::Text(actor.name().to_string())),
        ];

        push_present(&mut insert, &columns, "search_key", params.search_key.map(BindValue::Text))?;
        push_present(&mut insert, &columns, "name", params.name.map(BindValue::Text))?;
        push_present(
            &mut insert,
            &columns,
            "description",
            params.description.map(BindValue::Text),
        )?;
        push_present(&mut insert, &columns, "parent_uu", params.parent_uu.map(BindValue::Uuid))?;
        push_present(&mut insert, &columns, "header_uu", params.header_uu.map(BindValue::Uuid))?;
        push_present(
            &mut insert,
            &columns,
            "record_json",
            params.record_json.map(BindValue::Json),
        )?;
        push_present(
            &mut insert,
            &columns,
            "is_template",
            params.is_template.map(BindValue::Bool),
        )?;
        push_present(&mut insert, &columns, "is_valid", params.is_valid.map(BindValue::Bool))?;

        // Type resolution: every typed entity gets a concrete type_uu, the
        // entity default when the caller names none.
        if columns.contains("type_uu") {
            let resolved = types::resolve_type(
                &self.pool,
                &table,
                params.type_uu,
                params.type_search_key.as_deref(),
                params.type_name.as_deref(),
            )
            .await?;
            insert.push(("type_uu", BindValue::Uuid(resolved.uu)));
        } else if params.type_uu.is_some()
            || params.type_search_key.is_some()
            || params.type_name.is_some()
        {
            return Err(StackError::validation(format!(
                "entity '{table}' has no type column"
            )));
        }

        // Association target, set once at creation.
        match (params.attach_uu, params.attach_table.as_deref()) {
            (Some(uu), attach_table) => {
                if !columns.contains("attached_to") {
                    return Err(StackError::validation(format!(
                        "entity '{table}' does not support attachments"
                    )));
                }
                let target = attach::resolve_target(&self.pool, uu, attach_table).await?;
                insert.push(("attached_to", BindValue::Json(serde_json::to_value(target)?)));
            }
            (None, Some(_)) => {
                return Err(StackError::validation(
                    "attach_table supplied without attach_uu",
                ));
            }
            (None, None) => {}
        }

        let qualified = qualify(CONVENTION_SCHEMA, &table)?;
        let column_names: Vec<&str> = insert.iter().map(|(c, _)| *c).collect();
        let sql = build_insert(&qualified, &column_names);

        let mut query = sqlx::query_as::<_, RecordSummary>(&sql);
        for (_, value) in insert {
            query = match value {
                BindValue::Text(v) => query.bind(v),
                BindValue::Uuid(v) => query.bind(v),
                BindValue::Bool(v) => query.bind(v),
                BindValue::Json(v) => query.bind(v),
            };
        }
        let summary = query.fetch_one(&self.pool).await?;

        info!(
            "created {table} {} ({}) by {}",
            summary.uu,
            summary.search_key,
            actor.name()
        );
        Ok(summary)
    }

    /// Lists records as JSON projections, newest first.
    ///
    /// Revoked rows are excluded unless asked for; tables modeling templates
    /// exclude them by default (or return only them with `templates_only`).
    /// An implicit cap keeps unbounded listings out of interactive flows.
    pub async fn list(
        &self,
        table: &str,
        requested_columns: &[&str],
        filter: &ListFilter,
    ) -> Result<Vec<JsonValue>> {
        let allow = catalog::convention_tables(&self.pool, CONVENTION_SCHEMA).await?;
        let table = allow.require(table)?.to_string();
        let columns = catalog::table_columns(&self.pool, CONVENTION_SCHEMA, &table).await?;

        let projection = build_projection(requested_columns, &columns)?;
        let mut conditions: Vec<&str> = Vec::new();
        if !filter.include_revoked {
            conditions.push("revoked IS NULL");
        }
        if columns.contains("is_template") {
            conditions.push(if filter.templates_only {
                "is_template"
            } else {
                "NOT is_template"
            });
        } else if filter.templates_only {
            return Err(StackError::validation(format!(
                "entity '{table}' does not model templates"
            )));
        }

        let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        if limit <= 0 {
            return Err(StackError::validation("limit must be positive"));
        }

        let qualified = qualify(CONVENTION_SCHEMA, &table)?;
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT row_to_json(t) AS record FROM \
             (SELECT {projection} FROM {qualified}{where_clause} \
             ORDER BY created DESC LIMIT $1) t"
        );

        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;
        debug!("list {table}: {} row(s)", rows.len());
        rows.into_iter().map(record_json).collect()
    }

    /// Fetches one record by uu. A missing uu is `Ok(None)`, not an error.
    pub async fn get(
        &self,
        table: &str,
        requested_columns: &[&str],
        uu: Uuid,
    ) -> Result<Option<JsonValue>> {
        let allow = catalog::convention_tables(&self.pool, CONVENTION_SCHEMA).await?;
        let table = allow.require(table)?.to_string();
        let columns = catalog::table_columns(&self.pool, CONVENTION_SCHEMA, &table).await?;

        let projection = build_projection(requested_columns, &columns)?;
        let qualified = qualify(CONVENTION_SCHEMA, &table)?;
        let sql = format!(
            "SELECT row_to_json(t) AS record FROM \
             (SELECT {projection} FROM {qualified} WHERE uu = $1) t"
        );

        let row = sqlx::query(&sql).bind(uu).fetch_optional(&self.pool).await?;
        row.map(record_json).transpose()
    }

    /// One-way soft delete. Conflict when the row is already revoked or the
    /// uu does not exist; there is no un-revoke.
    pub async fn revoke(&self, actor: &ActorContext, table: &str, uu: Uuid) -> Result<()> {
        let allow = catalog::convention_tables(&self.pool, CONVENTION_SCHEMA).await?;
        let table = allow.require(table)?.to_string();
        self.finalize(actor, &table, uu, "revoked").await
    }

    /// One-way soft completion, for entity kinds that model it. Conflict on
    /// second invocation, validation on entities without the column.
    pub async fn process(&self, actor: &ActorContext, table: &str, uu: Uuid) -> Result<()> {
        let allow = catalog::convention_tables(&self.pool, CONVENTION_SCHEMA).await?;
        let table = allow.require(table)?.to_string();
        let columns = catalog::table_columns(&self.pool, CONVENTION_SCHEMA, &table).await?;
        if !columns.contains("processed") {
            return Err(StackError::validation(format!(
                "entity '{table}' does not model processed status"
            )));
        }
        self.finalize(actor, &table, uu, "processed").await
    }

    /// Shared check-then-set for the monotonic lifecycle timestamps. The
    /// nullable-timestamp guard inside a single UPDATE makes concurrent
    /// second attempts observe zero rows and fail as Conflict.
    ///
    /// `table` must already have passed the allowlist in the caller.
    async fn finalize(
        &self,
        actor: &ActorContext,
        table: &str,
        uu: Uuid,
        timestamp_column: &str,
    ) -> Result<()> {
        let column = validate_identifier(timestamp_column)?;
        let qualified = qualify(CONVENTION_SCHEMA, table)?;

        let sql = format!(
            "UPDATE {qualified} \
             SET {column} = now(), updated = now(), updated_by = $2 \
             WHERE uu = $1 AND {column} IS NULL \
             RETURNING uu"
        );
        let updated = sqlx::query(&sql)
            .bind(uu)
            .bind(actor.name())
            .fetch_optional(&self.pool)
            .await?;

        match updated {
            Some(_) => {
                info!("{table} {uu}: {column} set by {}", actor.name());
                Ok(())
            }
            None => Err(StackError::conflict(format!(
                "{table} record {uu} is already {column} or does not exist"
            ))),
        }
    }
}

/// Default projection when the caller names no columns.
const DEFAULT_COLUMNS: &[&str] = &[
    "uu",
    "search_key",
    "name",
    "description",
    "created",
    "created_by",
];

/// Assembles a validated SELECT projection, appending the derived lifecycle
/// flags for every nullable timestamp the table carries.
fn build_projection(requested: &[&str], columns: &BTreeSet<String>) -> Result<String> {
    let mut parts: Vec<String> = Vec::new();
    if requested.is_empty() {
        parts.extend(
            DEFAULT_COLUMNS
                .iter()
                .filter(|c| columns.contains(**c))
                .map(|c| (*c).to_string()),
        );
    } else {
        for column in requested {
            validate_identifier(column)?;
            if !columns.contains(*column) {
                return Err(StackError::validation(format!(
                    "unknown column '{column}'"
                )));
            }
            parts.push((*column).to_string());
        }
    }
    if columns.contains("revoked") {
        parts.push("(revoked IS NOT NULL) AS is_revoked".to_string());
    }
    if columns.contains("processed") {
        parts.push("(processed IS NOT NULL) AS is_processed".to_string());
    }
    Ok(parts.join(", "))
}

fn build_insert(qualified_table: &str, columns: &[&str]) -> String {
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
    format!(
        "INSERT INTO {qualified_table} ({}) VALUES ({}) RETURNING uu, search_key, name",
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// Adds an optional parameter to the insert list; supplying a parameter the
/// table has no column for is a caller error, not a silent drop.
fn push_present<'a>(
    insert: &mut Vec<(&'a str, BindValue)>,
    columns: &BTreeSet<String>,
    column: &'a str,
    value: Option<BindValue>,
) -> Result<()> {
    if let Some(value) = value {
        if !columns.contains(column) {
            return Err(StackError::validation(format!(
                "entity does not have a '{column}' column"
            )));
        }
        insert.push((column, value));
    }
    Ok(())
}

fn record_json(row: PgRow) -> Result<JsonValue> {
    Ok(row.try_get::<JsonValue, _>("record")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn insert_statement_numbers_placeholders() {
        let sql = build_insert("records.event", &["created_by", "updated_by", "name"]);
        assert_eq!(
            sql,
            "INSERT INTO records.event (created_by, updated_by, name) \
             VALUES ($1, $2, $3) RETURNING uu, search_key, name"
        );
    }

    #[test]
    fn default_projection_adapts_to_table_shape() {
        let cols = columns(&["uu", "search_key", "name", "created", "revoked"]);
        let projection = build_projection(&[], &cols).unwrap();
        assert_eq!(
            projection,
            "uu, search_key, name, created, (revoked IS NOT NULL) AS is_revoked"
        );
    }

    #[test]
    fn processed_flag_is_derived_when_modeled() {
        let cols = columns(&["uu", "created", "revoked", "processed"]);
        let projection = build_projection(&["uu"], &cols).unwrap();
        assert_eq!(
            projection,
            "uu, (revoked IS NOT NULL) AS is_revoked, (processed IS NOT NULL) AS is_processed"
        );
    }

    #[test]
    fn unknown_and_unsafe_columns_are_rejected() {
        let cols = columns(&["uu", "created", "revoked"]);
        assert!(matches!(
            build_projection(&["secret"], &cols),
            Err(StackError::Validation(_))
        ));
        assert!(build_projection(&["uu; --"], &cols).is_err());
    }

    #[test]
    fn absent_params_are_omitted_from_insert() {
        let cols = columns(&["uu", "name", "search_key"]);
        let mut insert: Vec<(&str, BindValue)> = Vec::new();
        push_present(&mut insert, &cols, "name", None).unwrap();
        assert!(insert.is_empty());
        push_present(&mut insert, &cols, "name", Some(BindValue::Text("x".into()))).unwrap();
        assert_eq!(insert.len(), 1);
        // a parameter the table cannot store is an error, not a silent drop
        assert!(push_present(
            &mut insert,
            &cols,
            "is_template",
            Some(BindValue::Bool(true))
        )
        .is_err());
    }
}
