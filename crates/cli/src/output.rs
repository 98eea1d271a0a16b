//! Structured output handling for CLI commands.

use serde::Serialize;

#[derive(clap::ValueEnum, Clone, Debug, Default, PartialEq, Eq, Copy)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Returns true if the output format is intended for machine consumption
    pub fn is_machine_readable(&self) -> bool {
        match self {
            OutputFormat::Human => false,
            OutputFormat::Json | OutputFormat::Yaml => true,
        }
    }
}

/// Envelope for JSON/YAML output.
#[derive(Serialize)]
pub struct CommandResponse<T> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub exit_code: i32,
    #[serde(flatten)]
    pub data: T,
}

impl<T> CommandResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: None,
            exit_code: crate::exit_codes::SUCCESS,
            data,
        }
    }

    pub fn error(message: String, exit_code: i32, data: T) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(message),
            exit_code,
            data,
        }
    }
}

pub fn render<T: Serialize>(format: OutputFormat, data: &T) -> anyhow::Result<Option<String>> {
    Ok(match format {
        OutputFormat::Human => None,
        OutputFormat::Json => Some(serde_json::to_string_pretty(data)?),
        OutputFormat::Yaml => Some(serde_yaml::to_string(data)?),
    })
}

/// Print the output to stdout in the requested format. Human mode prints
/// nothing here; commands write their own human output.
pub fn print_output<T: Serialize>(format: OutputFormat, data: T) -> anyhow::Result<()> {
    if let Some(text) = render(format, &data)? {
        println!("{}", text);
    }
    Ok(())
}

pub fn print_success<T: Serialize>(format: OutputFormat, data: T) -> anyhow::Result<()> {
    print_output(format, CommandResponse::success(data))
}

pub fn print_failure<T: Serialize>(
    format: OutputFormat,
    message: &str,
    exit_code: i32,
    data: T,
) -> anyhow::Result<()> {
    print_output(
        format,
        CommandResponse::error(message.to_string(), exit_code, data),
    )
}

/// Note: In Human mode, errors are printed to stderr by main's error handler.
pub fn print_error(format: OutputFormat, message: &str, exit_code: i32) -> anyhow::Result<()> {
    print_failure(format, message, exit_code, serde_json::Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_flattens_data() {
        let response = CommandResponse::success(json!({ "answer": "42" }));
        let text = render(OutputFormat::Json, &response).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({ "status": "success", "exit_code": 0, "answer": "42" })
        );
    }

    #[test]
    fn test_human_renders_nothing() {
        assert!(render(OutputFormat::Human, &json!({})).unwrap().is_none());
        assert!(!OutputFormat::Human.is_machine_readable());
    }

    #[test]
    fn test_yaml_error_envelope() {
        let response = CommandResponse::error("rejected".into(), 5, json!({ "reason": "UnknownColumn" }));
        let text = render(OutputFormat::Yaml, &response).unwrap().unwrap();
        assert!(text.contains("status: error"));
        assert!(text.contains("exit_code: 5"));
        assert!(text.contains("reason: UnknownColumn"));
    }
}
