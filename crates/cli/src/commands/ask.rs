use anyhow::{Context, Result};
use econsql_common::config::AppConfig;
use econsql_runtime::{Pipeline, PipelineContext, PipelineOutcome};
use econsql_sql::ValidationVerdict;
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::exit_codes;
use crate::output::{self, OutputFormat};

#[derive(Debug, Serialize)]
pub struct AskReport {
    pub question: String,
    /// Only present once the query was accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
    #[serde(flatten)]
    pub outcome: PipelineOutcome,
}

impl AskReport {
    pub fn from_context(ctx: &PipelineContext) -> Result<Self> {
        let sql = match &ctx.verdict {
            Some(ValidationVerdict::Accepted(query)) => Some(query.sql().to_string()),
            _ => None,
        };
        let outcome = ctx
            .outcome()
            .with_context(|| format!("pipeline stopped in state {:?}", ctx.state()))?;
        Ok(Self {
            question: ctx.question.clone(),
            sql,
            row_count: ctx.result.as_ref().map(|r| r.row_count),
            truncated: ctx.result.as_ref().map(|r| r.truncated),
            outcome,
        })
    }
}

pub async fn ask(question: &str, format: OutputFormat, config: &AppConfig) -> Result<()> {
    let pipeline = Pipeline::from_config(config, None, None)?;

    if !format.is_machine_readable() {
        println!("{} {}", "Question:".dimmed(), question.bold());
    }

    let ctx = pipeline.run(question).await;
    pipeline.executor().close().await;
    let report = AskReport::from_context(&ctx)?;

    match (&report.outcome, &ctx.failure) {
        (PipelineOutcome::Answered { answer }, _) => {
            if format.is_machine_readable() {
                output::print_success(format, &report)?;
            } else {
                if let Some(rows) = report.row_count {
                    let note = if report.truncated == Some(true) {
                        format!("{} rows, truncated", rows)
                    } else {
                        format!("{} rows", rows)
                    };
                    println!("{}", note.dimmed());
                }
                println!("{}", answer);
            }
            Ok(())
        }
        (PipelineOutcome::Failed { stage, reason, message }, failure) => {
            let exit_code = failure
                .as_ref()
                .map(|f| exit_codes::for_code(f.code))
                .unwrap_or(exit_codes::GENERAL_ERROR);
            if format.is_machine_readable() {
                output::print_failure(format, message, exit_code, &report)?;
            } else {
                eprintln!("{} {}", "Error:".red().bold(), message);
                eprintln!("{}", format!("[{} failed: {}]", stage, reason).dimmed());
            }
            std::process::exit(exit_code);
        }
    }
}
