//! # Error Contexts
//!
//! Structured metadata attached to errors for programmatic analysis.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorContext {
    /// Context for ECONSQL-2001 (SyntaxError)
    SyntaxError { line: u64, column: u64 },

    /// Context for ECONSQL-2003 (UnknownTable)
    UnknownTable {
        table: String,
        available_tables: Vec<String>,
    },

    /// Context for ECONSQL-2004 (UnknownColumn)
    UnknownColumn {
        table: String,
        column: String,
        available_columns: Vec<String>,
    },

    /// Context for ECONSQL-3001 (ExecutionTimeout)
    Timeout { budget_ms: u64 },

    /// Context for pipeline stage failures
    Stage { stage: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_column_context_serde_roundtrip() {
        let ctx = ErrorContext::UnknownColumn {
            table: "indicators".to_string(),
            column: "gdq".to_string(),
            available_columns: vec!["gdp".to_string()],
        };

        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("\"type\":\"unknown_column\""));

        let de: ErrorContext = serde_json::from_str(&json).unwrap();
        match de {
            ErrorContext::UnknownColumn { table, column, .. } => {
                assert_eq!(table, "indicators");
                assert_eq!(column, "gdq");
            }
            _ => panic!("Wrong variant"),
        }
    }
}
