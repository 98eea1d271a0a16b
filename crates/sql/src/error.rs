use econsql_error::{find_closest_match, EconError, ErrorCode, ErrorContext};
use serde::Serialize;
use thiserror::Error;

use crate::registry::SchemaRegistry;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Table '{0}' declared more than once")]
    DuplicateTable(String),

    #[error("Column '{column}' declared more than once in table '{table}'")]
    DuplicateColumn { table: String, column: String },
}

/// Why a candidate query was refused. Every variant is recoverable: it ends one
/// pipeline run, never the process.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", content = "detail")]
pub enum Rejection {
    #[error("SQL syntax error: {0}")]
    SyntaxError(String),

    #[error("Forbidden operation: {0}")]
    ForbiddenOperation(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Query does not match the schema: {0}")]
    SchemaMismatch(String),
}

impl Rejection {
    /// Stable reason tag, e.g. `UnknownColumn`.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::SyntaxError(_) => "SyntaxError",
            Rejection::ForbiddenOperation(_) => "ForbiddenOperation",
            Rejection::UnknownTable(_) => "UnknownTable",
            Rejection::UnknownColumn { .. } => "UnknownColumn",
            Rejection::SchemaMismatch(_) => "SchemaMismatch",
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Rejection::SyntaxError(_) => ErrorCode::SyntaxError,
            Rejection::ForbiddenOperation(_) => ErrorCode::ForbiddenOperation,
            Rejection::UnknownTable(_) => ErrorCode::UnknownTable,
            Rejection::UnknownColumn { .. } => ErrorCode::UnknownColumn,
            Rejection::SchemaMismatch(_) => ErrorCode::SchemaMismatch,
        }
    }

    pub fn to_econ_error(&self, registry: &SchemaRegistry) -> EconError {
        let error = EconError::new(self.code(), self.to_string());
        match self {
            Rejection::SyntaxError(_) => {
                error.with_hint("Generate a single well-formed SELECT statement")
            }
            Rejection::ForbiddenOperation(_) => {
                error.with_hint("Only read-only SELECT queries are allowed")
            }
            Rejection::UnknownTable(table) => {
                let available = registry.table_names();
                let hint = match find_closest_match(table, &available) {
                    Some(closest) => format!("Did you mean '{}'?", closest),
                    None => format!("Available tables: {}", available.join(", ")),
                };
                error
                    .with_context(ErrorContext::UnknownTable {
                        table: table.clone(),
                        available_tables: available,
                    })
                    .with_hint(hint)
            }
            Rejection::UnknownColumn { table, column } => {
                let available: Vec<String> = registry
                    .describe(table)
                    .map(|t| t.column_names().map(str::to_string).collect())
                    .unwrap_or_default();
                let hint = find_closest_match(column, &available)
                    .map(|closest| format!("Did you mean '{}'?", closest));
                let error = error.with_context(ErrorContext::UnknownColumn {
                    table: table.clone(),
                    column: column.clone(),
                    available_columns: available,
                });
                match hint {
                    Some(hint) => error.with_hint(hint),
                    None => error,
                }
            }
            Rejection::SchemaMismatch(_) => {
                error.with_hint("Query the economic indicators table directly")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_column_hint() {
        let registry = SchemaRegistry::economic_indicators("indicators").unwrap();
        let rejection = Rejection::UnknownColumn {
            table: "indicators".to_string(),
            column: "inflaton".to_string(),
        };

        let err = rejection.to_econ_error(&registry);
        assert_eq!(err.code, ErrorCode::UnknownColumn);
        assert_eq!(err.hint.as_deref(), Some("Did you mean 'inflation'?"));
        assert!(matches!(
            err.context,
            Some(ErrorContext::UnknownColumn { ref available_columns, .. }) if available_columns.len() == 16
        ));
    }

    #[test]
    fn test_unknown_table_hint() {
        let registry = SchemaRegistry::economic_indicators("indicators").unwrap();
        let err = Rejection::UnknownTable("indicator".to_string()).to_econ_error(&registry);
        assert_eq!(err.hint.as_deref(), Some("Did you mean 'indicators'?"));

        let err = Rejection::UnknownTable("sqlite_master".to_string()).to_econ_error(&registry);
        assert_eq!(err.hint.as_deref(), Some("Available tables: indicators"));
    }

    #[test]
    fn test_reason_tags() {
        assert_eq!(
            Rejection::ForbiddenOperation("DELETE".into()).reason(),
            "ForbiddenOperation"
        );
        assert_eq!(Rejection::SchemaMismatch("x".into()).reason(), "SchemaMismatch");
        let json = serde_json::to_value(Rejection::UnknownTable("t".into())).unwrap();
        assert_eq!(json["reason"], "UnknownTable");
        assert_eq!(json["detail"], "t");
    }
}
