//! `validate`: run a query through the validator without touching the store.
//!
//! Prints the rewritten query (with its enforced row limit) when accepted,
//! or the rejection with a hint when not. Rejections exit with
//! [`exit_codes::VALIDATION_ERROR`].

use std::sync::Arc;

use anyhow::Result;
use econsql_common::config::AppConfig;
use econsql_error::EconError;
use econsql_sql::{QueryValidator, Rejection, SchemaRegistry, ValidationVerdict};
use owo_colors::OwoColorize;
use serde::Serialize;

use super::registry_from;
use crate::exit_codes;
use crate::output::{self, OutputFormat};

#[derive(Debug, Serialize)]
pub struct ValidateReport {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EconError>,
}

impl ValidateReport {
    pub fn new(verdict: ValidationVerdict, registry: &SchemaRegistry) -> Self {
        match verdict {
            ValidationVerdict::Accepted(query) => Self {
                accepted: true,
                sql: Some(query.sql().to_string()),
                row_limit: Some(query.row_limit()),
                rejection: None,
                error: None,
            },
            ValidationVerdict::Rejected(rejection) => Self {
                accepted: false,
                sql: None,
                row_limit: None,
                error: Some(rejection.to_econ_error(registry)),
                rejection: Some(rejection),
            },
        }
    }
}

pub fn validate(sql: &str, format: OutputFormat, config: &AppConfig) -> Result<()> {
    let registry = Arc::new(registry_from(config)?);
    let validator = QueryValidator::new(registry.clone(), config.query_limits.max_rows as u64);
    let report = ValidateReport::new(validator.validate(sql), &registry);

    if format.is_machine_readable() {
        if report.accepted {
            output::print_success(format, &report)?;
            return Ok(());
        }
        let message = report
            .error
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_default();
        output::print_failure(format, &message, exit_codes::VALIDATION_ERROR, &report)?;
        std::process::exit(exit_codes::VALIDATION_ERROR);
    }

    match (&report.sql, &report.error) {
        (Some(sql), _) => {
            println!("{}", "Accepted".green().bold());
            println!("{}", sql);
            if let Some(limit) = report.row_limit {
                println!("{}", format!("row limit: {}", limit).dimmed());
            }
            Ok(())
        }
        (None, Some(err)) => {
            eprintln!("{} {}", "Rejected:".red().bold(), err.message);
            if let Some(hint) = &err.hint {
                eprintln!("{} {}", "Hint:".yellow(), hint);
            }
            eprintln!("{}", err.code.dimmed());
            std::process::exit(exit_codes::VALIDATION_ERROR);
        }
        (None, None) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(sql: &str) -> ValidateReport {
        let registry = SchemaRegistry::economic_indicators("indicators").unwrap();
        let verdict = QueryValidator::new(Arc::new(registry.clone()), 500).validate(sql);
        ValidateReport::new(verdict, &registry)
    }

    #[test]
    fn test_accepted_report_carries_rewritten_sql() {
        let report = report("SELECT gdp FROM indicators WHERE year = 2024");
        assert!(report.accepted);
        assert_eq!(
            report.sql.as_deref(),
            Some("SELECT gdp FROM indicators WHERE year = 2024 LIMIT 500")
        );
        assert_eq!(report.row_limit, Some(500));
    }

    #[test]
    fn test_rejected_report_has_code_and_no_sql() {
        let report = report("UPDATE indicators SET gdp = 0");
        assert!(!report.accepted);
        assert!(report.sql.is_none());
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["rejection"]["reason"], "ForbiddenOperation");
        assert_eq!(value["error"]["code"], "ECONSQL-2002");
    }
}
