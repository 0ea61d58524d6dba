//! DDL for the `items` table and the count trigger that raises threshold
//! signals.
//!
//! The trigger runs after every committed insert, counts the table and, once
//! the count reaches the threshold, calls
//! `pg_notify(<channel>, 'Items count has reached <threshold>')`. Postgres may
//! coalesce identical notifications raised in one transaction.

use thiserror::Error;

pub const TRIGGER_NAME: &str = "items_count_trigger";
pub const FUNCTION_NAME: &str = "check_items_count";

/// Postgres truncates identifiers longer than this.
const MAX_IDENTIFIER_LEN: usize = 63;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("invalid channel name {0:?}: expected [A-Za-z_][A-Za-z0-9_]* of at most 63 bytes")]
    InvalidChannel(String),

    #[error("invalid threshold {0}: threshold must be greater than zero")]
    InvalidThreshold(i64),
}

/// Channel names are interpolated into DDL, so only plain identifiers pass.
pub fn validate_channel_name(channel: &str) -> Result<(), SchemaError> {
    let mut chars = channel.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && channel.len() <= MAX_IDENTIFIER_LEN {
        Ok(())
    } else {
        Err(SchemaError::InvalidChannel(channel.to_string()))
    }
}

const CREATE_ITEMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS items (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL CHECK (length(btrim(name)) > 0),
    stock BIGINT NOT NULL DEFAULT 0 CHECK (stock >= 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

/// Statements that (re)install the table, function and trigger. Safe to run
/// repeatedly.
pub fn install_statements(threshold: i64, channel: &str) -> Result<Vec<String>, SchemaError> {
    if threshold <= 0 {
        return Err(SchemaError::InvalidThreshold(threshold));
    }
    validate_channel_name(channel)?;

    let function = format!(
        r#"
CREATE OR REPLACE FUNCTION {FUNCTION_NAME}() RETURNS trigger AS $$
DECLARE
    items_count BIGINT;
BEGIN
    SELECT COUNT(*) INTO items_count FROM items;
    IF items_count >= {threshold} THEN
        PERFORM pg_notify('{channel}', 'Items count has reached {threshold}');
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql
"#
    );

    Ok(vec![
        CREATE_ITEMS_TABLE.trim().to_string(),
        function.trim().to_string(),
        format!("DROP TRIGGER IF EXISTS {TRIGGER_NAME} ON items"),
        format!(
            "CREATE TRIGGER {TRIGGER_NAME} AFTER INSERT ON items FOR EACH ROW EXECUTE FUNCTION {FUNCTION_NAME}()"
        ),
    ])
}

/// Drop the trigger and its function. The table is kept.
pub fn uninstall_statements() -> Vec<String> {
    vec![
        format!("DROP TRIGGER IF EXISTS {TRIGGER_NAME} ON items"),
        format!("DROP FUNCTION IF EXISTS {FUNCTION_NAME}()"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        for name in ["items_count_reached", "_x", "A1", "a".repeat(63).as_str()] {
            assert_eq!(validate_channel_name(name), Ok(()), "{name}");
        }
    }

    #[test]
    fn rejects_anything_that_needs_quoting() {
        for name in ["", "1abc", "items-count", "a b", "x'); DROP TABLE items; --", "a".repeat(64).as_str()] {
            assert!(validate_channel_name(name).is_err(), "{name}");
        }
    }

    #[test]
    fn install_interpolates_threshold_and_channel() {
        let stmts = install_statements(20, "items_count_reached").unwrap();
        assert_eq!(stmts.len(), 4);
        assert!(stmts[0].starts_with("CREATE TABLE IF NOT EXISTS items"));
        assert!(stmts[1].contains("IF items_count >= 20 THEN"));
        assert!(stmts[1].contains("pg_notify('items_count_reached', 'Items count has reached 20')"));
        assert_eq!(stmts[2], "DROP TRIGGER IF EXISTS items_count_trigger ON items");
        assert!(stmts[3].contains("AFTER INSERT ON items FOR EACH ROW"));
    }

    #[test]
    fn install_rejects_bad_inputs() {
        assert_eq!(
            install_statements(0, "items_count_reached"),
            Err(SchemaError::InvalidThreshold(0))
        );
        assert!(matches!(
            install_statements(20, "bad-channel"),
            Err(SchemaError::InvalidChannel(_))
        ));
    }

    #[test]
    fn uninstall_drops_trigger_before_function() {
        let stmts = uninstall_statements();
        assert!(stmts[0].starts_with("DROP TRIGGER"));
        assert!(stmts[1].starts_with("DROP FUNCTION"));
    }
}
