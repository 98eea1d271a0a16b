//! Subcommand implementations.
//!
//! Every command prints human output with colors by default, or a single
//! JSON/YAML document when `--output` asks for one.

mod ask;
mod schema;
mod serve;
mod validate;

pub use ask::ask;
pub use schema::schema;
pub use serve::serve;
pub use validate::validate;

use econsql_common::config::AppConfig;
use econsql_error::{EconError, ErrorCode};
use econsql_sql::SchemaRegistry;

pub(crate) fn registry_from(config: &AppConfig) -> Result<SchemaRegistry, EconError> {
    SchemaRegistry::economic_indicators(&config.store.table).map_err(|e| {
        EconError::new(ErrorCode::InvalidConfig, e.to_string())
            .with_hint("store.table must be a plain SQL identifier")
    })
}
