//! Trigger Provisioner: converges live trigger bindings to the rule
//! registry.
//!
//! Additive only — missing triggers are created, existing triggers are
//! never altered or dropped, so repeated runs are idempotent in the absence
//! of concurrent schema mutation. Provisioning is designed to run
//! single-writer at migration time; a lost creation race surfaces as the
//! database's duplicate-object error wrapped in
//! [`StackError::Provisioning`], never silently swallowed.

use sqlx::PgPool;
use tracing::{debug, info};

use crate::catalog::CatalogSnapshot;
use crate::error::{Result, StackError};
use crate::ident::{qualify, validate_identifier, CONVENTION_SCHEMA};
use crate::registry::triggers::{load_rules, EventSpec};

/// SQLSTATE for `duplicate_object`, raised when two provisioning runs race
/// on the same trigger name.
const DUPLICATE_OBJECT: &str = "42710";

/// Provisions every missing trigger binding. Returns the number of triggers
/// created (zero when the schema is already converged).
pub async fn provision(pool: &PgPool) -> Result<u64> {
    let rules = load_rules(pool).await?;
    let catalog = CatalogSnapshot::load(pool, CONVENTION_SCHEMA).await?;

    let mut created = 0;
    for rule in &rules {
        let spec = EventSpec::parse(&rule.event_spec)
            .map_err(|e| StackError::provisioning(format!("rule '{}': {e}", rule.root_name)))?;
        let trigger_name = rule.trigger_name();
        let function_name = rule.function_name();

        for table in rule.target_tables(&catalog) {
            if catalog.has_trigger(table, &trigger_name) {
                debug!("trigger {trigger_name} already bound to {table}");
                continue;
            }
            let stmt =
                build_create_trigger(CONVENTION_SCHEMA, table, &trigger_name, &function_name, spec)?;
            sqlx::query(&stmt).execute(pool).await.map_err(|e| {
                if is_duplicate_object(&e) {
                    StackError::provisioning(format!(
                        "trigger {trigger_name} on {table} was created concurrently"
                    ))
                } else {
                    StackError::from(e)
                }
            })?;
            info!("created trigger {trigger_name} on {CONVENTION_SCHEMA}.{table}");
            created += 1;
        }
    }

    if created == 0 {
        debug!("trigger provisioning: already converged");
    }
    Ok(created)
}

/// Builds a CREATE TRIGGER statement from validated identifiers only.
fn build_create_trigger(
    schema: &str,
    table: &str,
    trigger_name: &str,
    function_name: &str,
    spec: EventSpec,
) -> Result<String> {
    let qualified_table = qualify(schema, table)?;
    let qualified_fn = qualify(schema, function_name)?;
    validate_identifier(trigger_name)?;
    Ok(format!(
        "CREATE TRIGGER {trigger_name} {} ON {qualified_table} \
         FOR EACH ROW EXECUTE FUNCTION {qualified_fn}()",
        spec.to_sql()
    ))
}

fn is_duplicate_object(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some(DUPLICATE_OBJECT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::triggers::Timing;

    #[test]
    fn create_trigger_statement_shape() {
        let spec = EventSpec {
            timing: Timing::After,
            insert: true,
            update: true,
            delete: true,
        };
        let stmt = build_create_trigger(
            "records",
            "business_partner",
            "t10100_change_log",
            "t10100_change_log",
            spec,
        )
        .unwrap();
        assert_eq!(
            stmt,
            "CREATE TRIGGER t10100_change_log AFTER INSERT OR UPDATE OR DELETE \
             ON records.business_partner FOR EACH ROW \
             EXECUTE FUNCTION records.t10100_change_log()"
        );
    }

    #[test]
    fn statement_builder_rejects_unsafe_identifiers() {
        let spec = EventSpec {
            timing: Timing::Before,
            insert: false,
            update: true,
            delete: false,
        };
        assert!(build_create_trigger("records", "x; drop", "t1_a", "t1_a", spec).is_err());
        assert!(build_create_trigger("records", "event", "t1 a", "t1_a", spec).is_err());
        assert!(build_create_trigger("records", "event", "t1_a", "pg_fn()", spec).is_err());
    }
}
