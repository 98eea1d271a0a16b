//! Structured exit codes for machine-readable error handling.
//!
//! Scripts can tell a rejected query from an unreachable store or model.

use econsql_error::{ErrorCategory, ErrorCode};

/// Success (standard convention)
pub const SUCCESS: i32 = 0;

/// General error (fallback for unknown errors)
pub const GENERAL_ERROR: i32 = 1;

/// CLI usage error (invalid arguments, missing flags)
pub const USAGE_ERROR: i32 = 2;

/// Configuration error (YAML parse failure, invalid value)
pub const CONFIG_ERROR: i32 = 3;

/// Store error (missing file, store fault, timeout)
pub const STORE_ERROR: i32 = 4;

/// Validation error (the query was rejected)
pub const VALIDATION_ERROR: i32 = 5;

/// Model error (generation or synthesis failed)
pub const MODEL_ERROR: i32 = 6;

pub fn for_category(category: ErrorCategory) -> i32 {
    match category {
        ErrorCategory::Validation => VALIDATION_ERROR,
        ErrorCategory::Execution => STORE_ERROR,
        ErrorCategory::Model => MODEL_ERROR,
        ErrorCategory::Config => CONFIG_ERROR,
        ErrorCategory::Internal => GENERAL_ERROR,
        _ => GENERAL_ERROR,
    }
}

pub fn for_code(code: ErrorCode) -> i32 {
    for_category(code.category())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_category() {
        assert_eq!(for_code(ErrorCode::ForbiddenOperation), VALIDATION_ERROR);
        assert_eq!(for_code(ErrorCode::ExecutionTimeout), STORE_ERROR);
        assert_eq!(for_code(ErrorCode::StoreUnavailable), STORE_ERROR);
        assert_eq!(for_code(ErrorCode::SynthesisFailure), MODEL_ERROR);
        assert_eq!(for_code(ErrorCode::InvalidConfig), CONFIG_ERROR);
        assert_eq!(for_code(ErrorCode::Internal), GENERAL_ERROR);
    }
}
