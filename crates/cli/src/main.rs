//! econsql CLI: ask questions of the macro-economic dataset.
//!
//! # Commands
//!
//! - `ask`: Run a question through generation, validation, execution and synthesis.
//! - `validate`: Check a query against the schema and safety rules without running it.
//! - `schema`: Print the indicators table and its columns.
//! - `serve`: Start the HTTP API.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use econsql_common::config::AppConfig;
use econsql_error::EconError;
use owo_colors::OwoColorize;

mod commands;
mod exit_codes;
mod output;

use output::OutputFormat;

#[derive(Parser)]
#[command(name = "econsql")]
#[command(about = "Ask natural-language questions about economic indicators", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (human, json, yaml)
    #[arg(long, global = true, value_enum, default_value = "human")]
    output: OutputFormat,

    /// Path to the YAML configuration file (optional)
    #[arg(long, global = true, env = "ECONSQL_CONFIG", default_value = "config/econsql.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question about the dataset
    Ask {
        /// The question, in plain language
        question: String,
    },
    /// Validate a SQL query without executing it
    Validate {
        /// The SQL query to check
        sql: String,
    },
    /// Describe the queryable schema
    Schema,
    /// Start the HTTP API server
    Serve {
        /// Override server.listen_addr
        #[arg(long)]
        listen: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let exit_code = if e.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            e.print().ok();
            std::process::exit(exit_code);
        }
    };

    let config = match AppConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => fail(cli.output, &format!("{:#}", e), exit_codes::CONFIG_ERROR),
    };

    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    if let Err(e) =
        econsql_common::telemetry::init_tracing_with_default(&config.telemetry, default_level)
    {
        eprintln!("{} {}", "Warning:".yellow(), e);
    }

    tracing::debug!(config = %cli.config, "configuration loaded");
    let format = cli.output;
    if let Err(e) = run_cli(cli, config).await {
        fail(format, &format!("{:#}", e), map_error_to_exit_code(&e));
    }

    Ok(())
}

fn fail(format: OutputFormat, message: &str, exit_code: i32) -> ! {
    if format.is_machine_readable() {
        output::print_error(format, message, exit_code).ok();
    } else {
        eprintln!("{} {}", "Error:".red().bold(), message);
    }
    std::process::exit(exit_code);
}

fn map_error_to_exit_code(e: &anyhow::Error) -> i32 {
    if let Some(econ_err) = e.chain().find_map(|c| c.downcast_ref::<EconError>()) {
        return exit_codes::for_code(econ_err.code);
    }

    // Fallback: string heuristics for errors raised outside the pipeline
    let s = format!("{:#}", e).to_lowercase();
    if s.contains("config") || s.contains("yaml") {
        return exit_codes::CONFIG_ERROR;
    }
    if s.contains("bind") || s.contains("listen address") {
        return exit_codes::CONFIG_ERROR;
    }
    exit_codes::GENERAL_ERROR
}

async fn run_cli(cli: Cli, config: AppConfig) -> Result<(), anyhow::Error> {
    match cli.command {
        Commands::Ask { question } => {
            commands::ask(&question, cli.output, &config).await?;
        }
        Commands::Validate { sql } => {
            commands::validate(&sql, cli.output, &config)?;
        }
        Commands::Schema => {
            commands::schema(cli.output, &config)?;
        }
        Commands::Serve { listen } => {
            commands::serve(config, listen).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use econsql_error::ErrorCode;

    #[test]
    fn test_exit_code_from_wrapped_econ_error() {
        let err: anyhow::Error = Err::<(), _>(EconError::new(ErrorCode::StoreUnavailable, "missing"))
            .context("Failed to build the question pipeline")
            .unwrap_err();
        assert_eq!(map_error_to_exit_code(&err), exit_codes::STORE_ERROR);
    }

    #[test]
    fn test_exit_code_fallbacks() {
        let err = anyhow::anyhow!("Failed to deserialize configuration");
        assert_eq!(map_error_to_exit_code(&err), exit_codes::CONFIG_ERROR);
        let err = anyhow::anyhow!("something else");
        assert_eq!(map_error_to_exit_code(&err), exit_codes::GENERAL_ERROR);
    }

    #[test]
    fn test_cli_parses_global_output_flag() {
        let cli = Cli::try_parse_from(["econsql", "validate", "SELECT 1", "--output", "json"]).unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Validate { .. }));
    }
}
