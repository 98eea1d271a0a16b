use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;
use validator::Validate;

// Default constants
pub const DEFAULT_STORE_PATH: &str = "data/economic.db";
pub const DEFAULT_TABLE_NAME: &str = "indicators";

pub const DEFAULT_MAX_ROWS: usize = 500;
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_MAX_CONCURRENT_SESSIONS: usize = 8;

pub const DEFAULT_MODEL_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL_NAME: &str = "gpt-4o-mini";
pub const DEFAULT_MODEL_REQUEST_TIMEOUT_MS: u64 = 30_000;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_SERVICE_NAME: &str = "econsql";

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.filter(|s| !s.is_empty()).map(SecretString::from))
}

#[derive(Debug, Deserialize, Default, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub store: StoreSettings,
    #[serde(default)]
    #[validate(nested)]
    pub query_limits: QueryLimits,
    #[serde(default)]
    #[validate(nested)]
    pub model: ModelSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct StoreSettings {
    #[serde(default = "default_store_path")]
    #[validate(length(min = 1))]
    pub path: String,

    /// Name of the single economic-indicators table.
    #[serde(default = "default_table_name")]
    #[validate(length(min = 1, max = 128))]
    pub table: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            table: default_table_name(),
        }
    }
}

fn default_store_path() -> String {
    DEFAULT_STORE_PATH.to_string()
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

/// Row ceiling, execution budget and session concurrency for the executor.
#[derive(Debug, Deserialize, Clone, Copy, Validate)]
pub struct QueryLimits {
    #[serde(default = "default_max_rows")]
    #[validate(range(min = 1, max = 100_000))]
    pub max_rows: usize,
    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1))]
    pub timeout_ms: u64,
    #[serde(default = "default_max_concurrent_sessions")]
    #[validate(range(min = 1, max = 1024))]
    pub max_concurrent_sessions: usize,
}

impl QueryLimits {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
            timeout_ms: default_timeout_ms(),
            max_concurrent_sessions: default_max_concurrent_sessions(),
        }
    }
}

fn default_max_rows() -> usize {
    DEFAULT_MAX_ROWS
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_concurrent_sessions() -> usize {
    DEFAULT_MAX_CONCURRENT_SESSIONS
}

/// Chat-completions endpoint used for query generation and answer synthesis.
#[derive(Debug, Deserialize, Validate)]
pub struct ModelSettings {
    #[serde(default = "default_model_base_url")]
    #[validate(url)]
    pub base_url: String,

    #[serde(default = "default_model_name")]
    #[validate(length(min = 1))]
    pub name: String,

    #[serde(default, deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,

    #[serde(default = "default_model_request_timeout_ms")]
    #[validate(range(min = 1))]
    pub request_timeout_ms: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            base_url: default_model_base_url(),
            name: default_model_name(),
            api_key: None,
            request_timeout_ms: default_model_request_timeout_ms(),
        }
    }
}

fn default_model_base_url() -> String {
    DEFAULT_MODEL_BASE_URL.to_string()
}

fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.to_string()
}

fn default_model_request_timeout_ms() -> u64 {
    DEFAULT_MODEL_REQUEST_TIMEOUT_MS
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    /// Emit logs as JSON lines instead of the human-readable format.
    #[serde(default)]
    pub json_logs: bool,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            json_logs: false,
            service_name: default_service_name(),
        }
    }
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

impl AppConfig {
    /// Load from an optional YAML file, then apply `ECONSQL_<SECTION>__<KEY>`
    /// environment overrides, then validate.
    pub fn from_file(path: &str) -> Result<Self> {
        let builder = config::Config::builder();

        let builder = if std::path::Path::new(path).exists() {
            builder.add_source(config::File::with_name(path))
        } else {
            builder
        };

        // ECONSQL_QUERY_LIMITS__MAX_ROWS maps to query_limits.max_rows, etc.
        let builder = builder.add_source(
            config::Environment::with_prefix("ECONSQL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build().context("Failed to build configuration")?;

        let app_config: AppConfig = cfg
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {:?}", e))?;

        Ok(app_config)
    }
}
