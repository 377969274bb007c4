//! Trigger-rule registry: declarative descriptions of which automation
//! function fires on which tables.
//!
//! Rules are rows in `records.trigger_rule`. Resolution of a rule against
//! the live catalog is a pure function over a [`CatalogSnapshot`], so scope
//! semantics are testable without a database.

use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::catalog::CatalogSnapshot;
use crate::error::{Result, StackError};
use crate::ident::{is_safe_identifier, CONVENTION_SCHEMA, MAX_IDENTIFIER_LEN};

/// Trigger timing relative to the row operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    Before,
    After,
}

/// Parsed form of a rule's `event_spec` column, e.g.
/// `"AFTER INSERT OR UPDATE OR DELETE"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSpec {
    pub timing: Timing,
    pub insert: bool,
    pub update: bool,
    pub delete: bool,
}

impl EventSpec {
    /// Parses the stored text form. At least one event is required; unknown
    /// words and duplicates are rejected.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut words = spec.split_whitespace();
        let timing = match words.next() {
            Some("BEFORE") => Timing::Before,
            Some("AFTER") => Timing::After,
            _ => {
                return Err(StackError::validation(format!(
                    "event spec '{spec}' must start with BEFORE or AFTER"
                )))
            }
        };

        let mut parsed = Self {
            timing,
            insert: false,
            update: false,
            delete: false,
        };
        let mut expect_event = true;
        for word in words {
            if expect_event {
                let flag = match word {
                    "INSERT" => &mut parsed.insert,
                    "UPDATE" => &mut parsed.update,
                    "DELETE" => &mut parsed.delete,
                    other => {
                        return Err(StackError::validation(format!(
                            "unexpected token '{other}' in event spec '{spec}'"
                        )))
                    }
                };
                if *flag {
                    return Err(StackError::validation(format!(
                        "duplicate event in spec '{spec}'"
                    )));
                }
                *flag = true;
            } else if word != "OR" {
                return Err(StackError::validation(format!(
                    "expected OR in event spec '{spec}', found '{word}'"
                )));
            }
            expect_event = !expect_event;
        }

        if !(parsed.insert || parsed.update || parsed.delete) || expect_event {
            return Err(StackError::validation(format!(
                "event spec '{spec}' names no events"
            )));
        }
        Ok(parsed)
    }

    /// Renders the `BEFORE/AFTER INSERT OR ...` clause of a CREATE TRIGGER
    /// statement.
    pub fn to_sql(self) -> String {
        let timing = match self.timing {
            Timing::Before => "BEFORE",
            Timing::After => "AFTER",
        };
        let mut events = Vec::with_capacity(3);
        if self.insert {
            events.push("INSERT");
        }
        if self.update {
            events.push("UPDATE");
        }
        if self.delete {
            events.push("DELETE");
        }
        format!("{timing} {}", events.join(" OR "))
    }
}

/// One declarative provisioning rule.
#[derive(Debug, Clone, FromRow)]
pub struct TriggerRule {
    pub uu: Uuid,
    pub root_name: String,
    pub event_prefix: i32,
    pub event_spec: String,
    pub is_include: bool,
    pub is_exclude: bool,
    pub table_scope: Vec<String>,
}

impl TriggerRule {
    /// Deterministic trigger name: literal `t` (trigger names may not begin
    /// with a digit), five-digit zero-padded prefix (so name sort order
    /// matches numeric order), and the rule's root. The bound function
    /// carries the same name.
    pub fn trigger_name(&self) -> String {
        format!("t{:05}_{}", self.event_prefix, self.root_name)
    }

    pub fn function_name(&self) -> String {
        self.trigger_name()
    }

    /// Configuration sanity for a single rule: safe root, prefix in range,
    /// flags not both set, generated name within the identifier limit,
    /// parseable event spec.
    pub fn validate(&self) -> Result<()> {
        if !is_safe_identifier(&self.root_name) {
            return Err(StackError::provisioning(format!(
                "rule {} has unsafe root_name '{}'",
                self.uu, self.root_name
            )));
        }
        if !(0..=99_999).contains(&self.event_prefix) {
            return Err(StackError::provisioning(format!(
                "rule '{}' event_prefix {} out of range",
                self.root_name, self.event_prefix
            )));
        }
        if self.is_include && self.is_exclude {
            return Err(StackError::provisioning(format!(
                "rule '{}' sets both is_include and is_exclude",
                self.root_name
            )));
        }
        if self.trigger_name().len() > MAX_IDENTIFIER_LEN {
            return Err(StackError::provisioning(format!(
                "rule '{}' generates an overlong trigger name",
                self.root_name
            )));
        }
        EventSpec::parse(&self.event_spec)
            .map_err(|e| StackError::provisioning(format!("rule '{}': {e}", self.root_name)))?;
        Ok(())
    }

    /// Resolves the rule's target table set against a catalog snapshot.
    ///
    /// Partition children are excluded unconditionally; include scopes keep
    /// their authored order, everything else follows catalog order.
    pub fn target_tables<'a>(&'a self, catalog: &'a CatalogSnapshot) -> Vec<&'a str> {
        if self.is_include {
            self.table_scope
                .iter()
                .map(String::as_str)
                .filter(|t| catalog.is_provisionable(t))
                .collect()
        } else if self.is_exclude {
            catalog
                .provisionable_tables()
                .filter(|t| !self.table_scope.iter().any(|s| s == t))
                .collect()
        } else {
            catalog.provisionable_tables().collect()
        }
    }
}

/// Loads all active rules ordered by prefix. Duplicate root names across
/// rules are a hard configuration error.
pub async fn load_rules(pool: &PgPool) -> Result<Vec<TriggerRule>> {
    let rules: Vec<TriggerRule> = sqlx::query_as(&format!(
        r#"
        SELECT uu, root_name, event_prefix, event_spec,
               is_include, is_exclude, table_scope
        FROM {CONVENTION_SCHEMA}.trigger_rule
        WHERE revoked IS NULL
        ORDER BY event_prefix, root_name
        "#
    ))
    .fetch_all(pool)
    .await?;

    for (i, rule) in rules.iter().enumerate() {
        rule.validate()?;
        if rules[..i].iter().any(|r| r.root_name == rule.root_name) {
            return Err(StackError::provisioning(format!(
                "duplicate trigger rule root_name '{}'",
                rule.root_name
            )));
        }
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;

    fn rule(root: &str, prefix: i32, include: bool, exclude: bool, scope: &[&str]) -> TriggerRule {
        TriggerRule {
            uu: Uuid::new_v4(),
            root_name: root.to_string(),
            event_prefix: prefix,
            event_spec: "AFTER INSERT OR UPDATE OR DELETE".to_string(),
            is_include: include,
            is_exclude: exclude,
            table_scope: scope.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn catalog(tables: &[&str], children: &[&str]) -> CatalogSnapshot {
        CatalogSnapshot {
            base_tables: tables.iter().map(|s| s.to_string()).collect(),
            partition_children: children.iter().map(|s| s.to_string()).collect(),
            triggers: BTreeMap::new(),
        }
    }

    #[test]
    fn trigger_name_is_zero_padded() {
        assert_eq!(rule("change_log", 10100, false, false, &[]).trigger_name(), "t10100_change_log");
        assert_eq!(rule("stamp_updated", 100, false, false, &[]).trigger_name(), "t00100_stamp_updated");
    }

    #[test]
    fn unscoped_rule_targets_all_but_partition_children() {
        let cat = catalog(&["a", "b", "log", "log_p1"], &["log_p1"]);
        let r = rule("audit", 10100, false, false, &[]);
        assert_eq!(r.target_tables(&cat), vec!["a", "b", "log"]);
    }

    #[test]
    fn include_scope_is_intersected_with_catalog() {
        let cat = catalog(&["a", "b", "log_p1"], &["log_p1"]);
        // "c" does not exist yet, "log_p1" is a partition child; neither is
        // targeted even though both are named.
        let r = rule("audit", 10100, true, false, &["b", "c", "log_p1"]);
        assert_eq!(r.target_tables(&cat), vec!["b"]);
    }

    #[test]
    fn include_scope_never_picks_up_later_tables() {
        let r = rule("audit", 10100, true, false, &["a", "b"]);
        let before = catalog(&["a", "b"], &[]);
        assert_eq!(r.target_tables(&before), vec!["a", "b"]);
        // table "c" created after the rule was authored
        let after = catalog(&["a", "b", "c"], &[]);
        assert_eq!(r.target_tables(&after), vec!["a", "b"]);
        // but an unscoped rule does reach it
        let open = rule("audit", 10100, false, false, &[]);
        assert_eq!(open.target_tables(&after), vec!["a", "b", "c"]);
    }

    #[test]
    fn exclude_scope_subtracts() {
        let cat = catalog(&["a", "b", "change_log", "change_log_d"], &["change_log_d"]);
        let r = rule("audit", 10100, false, true, &["change_log"]);
        assert_eq!(r.target_tables(&cat), vec!["a", "b"]);
    }

    #[test]
    fn partition_children_excluded_for_every_rule_shape() {
        let cat = catalog(&["parent", "parent_p1", "parent_p2"], &["parent_p1", "parent_p2"]);
        for (inc, exc, scope) in [
            (false, false, vec![]),
            (true, false, vec!["parent", "parent_p1"]),
            (false, true, vec!["other"]),
        ] {
            let scope: Vec<&str> = scope;
            let r = rule("audit", 10100, inc, exc, &scope);
            assert_eq!(r.target_tables(&cat), vec!["parent"], "inc={inc} exc={exc}");
        }
    }

    #[test]
    fn event_spec_parses_and_renders() {
        let spec = EventSpec::parse("AFTER INSERT OR UPDATE OR DELETE").unwrap();
        assert_eq!(spec.timing, Timing::After);
        assert!(spec.insert && spec.update && spec.delete);
        assert_eq!(spec.to_sql(), "AFTER INSERT OR UPDATE OR DELETE");

        let spec = EventSpec::parse("BEFORE UPDATE").unwrap();
        assert_eq!(spec.timing, Timing::Before);
        assert!(!spec.insert && spec.update && !spec.delete);
        assert_eq!(spec.to_sql(), "BEFORE UPDATE");
    }

    #[test]
    fn event_spec_rejects_malformed_input() {
        for bad in [
            "",
            "DURING UPDATE",
            "BEFORE",
            "AFTER INSERT UPDATE",
            "AFTER INSERT OR",
            "AFTER INSERT OR INSERT",
            "BEFORE TRUNCATE",
        ] {
            assert!(EventSpec::parse(bad).is_err(), "'{bad}' should be rejected");
        }
    }

    #[test]
    fn validate_flags_bad_configuration() {
        let mut r = rule("ok_rule", 100, false, false, &[]);
        assert!(r.validate().is_ok());

        r.root_name = "Bad-Root".to_string();
        assert!(matches!(r.validate(), Err(StackError::Provisioning(_))));

        let mut r = rule("ok_rule", 100_000, false, false, &[]);
        assert!(r.validate().is_err());
        r.event_prefix = 100;
        r.is_include = true;
        r.is_exclude = true;
        assert!(r.validate().is_err());
    }

    #[test]
    fn name_ordering_follows_numeric_prefix() {
        let names: BTreeSet<String> = [
            rule("z_first", 99, false, false, &[]).trigger_name(),
            rule("a_last", 10100, false, false, &[]).trigger_name(),
            rule("m_middle", 500, false, false, &[]).trigger_name(),
        ]
        .into_iter()
        .collect();
        let ordered: Vec<&String> = names.iter().collect();
        assert_eq!(ordered[0], "t00099_z_first");
        assert_eq!(ordered[1], "t00500_m_middle");
        assert_eq!(ordered[2], "t10100_a_last");
    }
}
