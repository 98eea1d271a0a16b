use crate::{EconError, ErrorCode};

impl From<rusqlite::Error> for EconError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(ffi, _)
                if ffi.code == rusqlite::ErrorCode::OperationInterrupted =>
            {
                EconError::new(ErrorCode::ExecutionTimeout, "Query was interrupted")
            }
            rusqlite::Error::SqliteFailure(ffi, _)
                if ffi.code == rusqlite::ErrorCode::CannotOpen =>
            {
                EconError::new(ErrorCode::StoreUnavailable, err.to_string())
                    .with_hint("Check that store.path points to an existing SQLite file")
            }
            _ => EconError::new(ErrorCode::StoreError, err.to_string()),
        }
    }
}

impl From<std::io::Error> for EconError {
    fn from(err: std::io::Error) -> Self {
        EconError::new(ErrorCode::Internal, err.to_string())
    }
}

impl From<serde_json::Error> for EconError {
    fn from(err: serde_json::Error) -> Self {
        EconError::new(ErrorCode::SerializationFailed, err.to_string())
    }
}

impl From<serde_yaml::Error> for EconError {
    fn from(err: serde_yaml::Error) -> Self {
        EconError::new(ErrorCode::InvalidConfig, err.to_string())
    }
}

/// Levenshtein-based "did you mean" lookup. Only matches within distance 3 count.
pub fn find_closest_match(target: &str, options: &[String]) -> Option<String> {
    let mut best_match: Option<&str> = None;
    let mut min_distance = usize::MAX;

    for option in options {
        let distance = levenshtein(target, option);
        if distance < min_distance && distance <= 3 {
            min_distance = distance;
            best_match = Some(option.as_str());
        }
    }

    best_match.map(|s| s.to_string())
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut dp = vec![vec![0; b.len() + 1]; a.len() + 1];

    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, val) in dp[0].iter_mut().enumerate() {
        *val = j;
    }

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            dp[i][j] = std::cmp::min(
                std::cmp::min(dp[i - 1][j] + 1, dp[i][j - 1] + 1),
                dp[i - 1][j - 1] + cost,
            );
        }
    }

    dp[a.len()][b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("book", "back"), 2);
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_find_closest_match() {
        let options = vec![
            "gdp".to_string(),
            "gdp_growth".to_string(),
            "inflation".to_string(),
        ];

        assert_eq!(find_closest_match("gdp", &options), Some("gdp".to_string()));
        assert_eq!(
            find_closest_match("inflaton", &options),
            Some("inflation".to_string())
        );
        assert_eq!(
            find_closest_match("gdp_growht", &options),
            Some("gdp_growth".to_string())
        );
        assert_eq!(find_closest_match("completely_different", &options), None);
    }

    #[test]
    fn test_sqlite_error_mapping() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_INTERRUPT),
            None,
        );
        let econ: EconError = err.into();
        assert_eq!(econ.code, ErrorCode::ExecutionTimeout);

        let err = rusqlite::Error::InvalidColumnIndex(7);
        let econ: EconError = err.into();
        assert_eq!(econ.code, ErrorCode::StoreError);
    }

    #[test]
    fn test_io_error_mapping() {
        let io_err = std::io::Error::other("File error");
        let econ: EconError = io_err.into();
        assert_eq!(econ.code, ErrorCode::Internal);
        assert!(econ.message.contains("File error"));
    }
}
