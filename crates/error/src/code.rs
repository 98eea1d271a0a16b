use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric error codes following the ECONSQL-XXXX format.
///
/// ## Code Ranges
/// - **2000-2999**: Query validation rejections
/// - **3000-3999**: Query execution failures
/// - **4000-4999**: Generation / synthesis collaborator failures
/// - **5000-5999**: Configuration and internal errors
///
/// Codes are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[non_exhaustive]
pub enum ErrorCode {
    // === Validation (2000-2999) ===
    /// ECONSQL-2001: SQL does not parse
    SyntaxError = 2001,
    /// ECONSQL-2002: Mutation, multi-statement or side-effecting construct
    ForbiddenOperation = 2002,
    /// ECONSQL-2003: Table not present in the schema registry
    UnknownTable = 2003,
    /// ECONSQL-2004: Column not present in a referenced table
    UnknownColumn = 2004,
    /// ECONSQL-2005: Query shape incompatible with the single-table schema
    SchemaMismatch = 2005,

    // === Execution (3000-3999) ===
    /// ECONSQL-3001: Execution exceeded its time budget
    ExecutionTimeout = 3001,
    /// ECONSQL-3002: The store raised an error while running the query
    StoreError = 3002,
    /// ECONSQL-3003: No execution slot became available
    SessionUnavailable = 3003,
    /// ECONSQL-3004: Store file missing or unreadable
    StoreUnavailable = 3004,

    // === Collaborators (4000-4999) ===
    /// ECONSQL-4001: Query generation failed or returned nothing usable
    GenerationFailure = 4001,
    /// ECONSQL-4002: Answer synthesis failed
    SynthesisFailure = 4002,
    /// ECONSQL-4003: The model endpoint rejected or timed out the request
    ModelUnavailable = 4003,

    // === Config / Internal (5000-5999) ===
    /// ECONSQL-5001: Invalid configuration
    InvalidConfig = 5001,
    /// ECONSQL-5002: Serialization/deserialization failed
    SerializationFailed = 5002,
    /// ECONSQL-5003: Unexpected internal state
    Internal = 5003,

    /// ECONSQL-9999: Unknown/unclassified error
    Unknown = 9999,
}

impl ErrorCode {
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Get the formatted code string (e.g., "ECONSQL-2004")
    pub fn as_str(&self) -> String {
        format!("ECONSQL-{:04}", self.as_u16())
    }

    pub fn category(&self) -> ErrorCategory {
        match self.as_u16() {
            2000..=2999 => ErrorCategory::Validation,
            3000..=3999 => ErrorCategory::Execution,
            4000..=4999 => ErrorCategory::Model,
            5001 => ErrorCategory::Config,
            _ => ErrorCategory::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> String {
        code.as_str()
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let num: u16 = s
            .strip_prefix("ECONSQL-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| "Invalid format".to_string())?;
        Self::try_from(num).map_err(|_| "Unknown code".to_string())
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(n: u16) -> std::result::Result<Self, Self::Error> {
        match n {
            2001 => Ok(Self::SyntaxError),
            2002 => Ok(Self::ForbiddenOperation),
            2003 => Ok(Self::UnknownTable),
            2004 => Ok(Self::UnknownColumn),
            2005 => Ok(Self::SchemaMismatch),
            3001 => Ok(Self::ExecutionTimeout),
            3002 => Ok(Self::StoreError),
            3003 => Ok(Self::SessionUnavailable),
            3004 => Ok(Self::StoreUnavailable),
            4001 => Ok(Self::GenerationFailure),
            4002 => Ok(Self::SynthesisFailure),
            4003 => Ok(Self::ModelUnavailable),
            5001 => Ok(Self::InvalidConfig),
            5002 => Ok(Self::SerializationFailed),
            5003 => Ok(Self::Internal),
            9999 => Ok(Self::Unknown),
            _ => Err(format!("Unknown error code: {}", n)),
        }
    }
}

/// High-level error category, used to pick CLI exit codes and HTTP statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ErrorCategory {
    Validation,
    Execution,
    Model,
    Config,
    Internal,
}
