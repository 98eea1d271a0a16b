use anyhow::Result;
use econsql_common::config::AppConfig;
use econsql_sql::TableSchema;
use owo_colors::OwoColorize;
use serde::Serialize;

use super::registry_from;
use crate::output::{self, OutputFormat};

#[derive(Debug, Serialize)]
pub struct SchemaReport {
    pub dialect: &'static str,
    pub tables: Vec<TableSchema>,
}

pub fn schema(format: OutputFormat, config: &AppConfig) -> Result<()> {
    let registry = registry_from(config)?;
    let report = SchemaReport {
        dialect: registry.schema_context().dialect,
        tables: registry.tables().to_vec(),
    };

    if format.is_machine_readable() {
        return output::print_success(format, &report);
    }

    for table in &report.tables {
        println!("{} {}", "Table".dimmed(), table.name.bold());
        let width = table.columns.iter().map(|c| c.name.len()).max().unwrap_or(0);
        for column in &table.columns {
            println!(
                "  {:<width$}  {:<7}  {}",
                column.name.cyan(),
                column.data_type.to_string(),
                column.description.dimmed(),
                width = width
            );
        }
    }
    Ok(())
}
