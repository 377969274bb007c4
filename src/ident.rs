//! The single audited chokepoint for dynamic SQL identifiers.
//!
//! The engine builds DDL and DML against tables it discovers at runtime, so
//! identifiers cannot be bound as statement parameters. Every table, column,
//! trigger, and function name that ends up interpolated into a statement
//! must pass through this module: a strict charset/length check plus, for
//! caller-supplied table names, a catalog-derived [`Allowlist`]. No other
//! module may `format!` an identifier into SQL directly.

use std::collections::BTreeSet;

use crate::error::{Result, StackError};

/// Schema all convention tables live in.
pub const CONVENTION_SCHEMA: &str = "records";

/// Postgres truncates identifiers beyond this length; we reject instead.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// True when `name` is a lowercase snake_case identifier safe to embed in a
/// statement: starts with a letter or underscore, continues with letters,
/// digits, or underscores, and fits the engine's length limit.
pub fn is_safe_identifier(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_IDENTIFIER_LEN {
        return false;
    }
    let mut chars = name.chars();
    let first = chars.next().expect("non-empty checked above");
    if !(first.is_ascii_lowercase() || first == '_') {
        return false;
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Validates an identifier, returning it unchanged on success.
pub fn validate_identifier(name: &str) -> Result<&str> {
    if is_safe_identifier(name) {
        Ok(name)
    } else {
        Err(StackError::validation(format!(
            "'{name}' is not a valid identifier"
        )))
    }
}

/// Schema-qualifies a validated table name.
pub fn qualify(schema: &str, table: &str) -> Result<String> {
    validate_identifier(schema)?;
    validate_identifier(table)?;
    Ok(format!("{schema}.{table}"))
}

/// A catalog-derived set of identifiers a caller is allowed to name.
///
/// Built from the live catalog (never from caller input), so membership
/// implies the identifier both exists and already passed the charset check
/// when the catalog was read.
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    names: BTreeSet<String>,
}

impl Allowlist {
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            names: names.into_iter().collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Validates `name` against the charset rule and the allowlist,
    /// returning the canonical stored form.
    pub fn require(&self, name: &str) -> Result<&str> {
        validate_identifier(name)?;
        self.names
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| {
                StackError::validation(format!("'{name}' is not a known convention table"))
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_snake_case_names() {
        for name in ["business_partner", "invoice_line", "t10100_change_log", "_scratch"] {
            assert!(is_safe_identifier(name), "{name} should be safe");
        }
    }

    #[test]
    fn rejects_injection_shapes() {
        for name in [
            "",
            "Invoice",
            "1table",
            "a-b",
            "tab le",
            "x;drop table y",
            "t\"name",
            "café",
        ] {
            assert!(!is_safe_identifier(name), "{name} should be rejected");
        }
    }

    #[test]
    fn rejects_overlong_names() {
        let long = "a".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(!is_safe_identifier(&long));
        let max = "a".repeat(MAX_IDENTIFIER_LEN);
        assert!(is_safe_identifier(&max));
    }

    #[test]
    fn allowlist_requires_membership() {
        let allow = Allowlist::new(["event".to_string(), "tag".to_string()]);
        assert!(allow.require("event").is_ok());
        assert!(matches!(
            allow.require("pg_shadow"),
            Err(StackError::Validation(_))
        ));
        assert!(matches!(
            allow.require("event; --"),
            Err(StackError::Validation(_))
        ));
    }

    #[test]
    fn qualify_validates_both_parts() {
        assert_eq!(qualify("records", "event").unwrap(), "records.event");
        assert!(qualify("records", "ev ent").is_err());
        assert!(qualify("rec ords", "event").is_err());
    }
}
