//! Common utilities shared across econsql crates.
//!
//! - **Configuration**: Strongly typed application configuration (`config`).
//! - **Scrubbing**: Best-effort redaction before anything reaches the logs (`scrubber`).
//! - **Telemetry**: Tracing subscriber setup (`telemetry`).
pub mod config;
pub mod scrubber;
pub mod telemetry;
