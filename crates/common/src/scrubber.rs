use once_cell::sync::Lazy;
use regex::Regex;

/// Log scrubber for candidate SQL, store faults and model endpoint errors.
///
/// ### WARNING
/// Regex-based and therefore best-effort. Candidate SQL is generated by a model
/// from user input, so it may echo whatever the user typed; scrub before logging.
static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").unwrap());

static BEARER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)bearer\s+[A-Za-z0-9._~+/=-]+").unwrap());

static API_KEY_REGEX: Lazy<Regex> = Lazy::new(|| {
    // OpenAI-style and generic "key-..." secrets
    Regex::new(r"\b(?:sk|key|api)-[A-Za-z0-9_-]{8,}\b").unwrap()
});

static CREDIT_CARD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d[ -]*?){13,16}\b").unwrap());

/// Maximum length of a scrubbed fragment written to logs.
pub const MAX_LOGGED_LEN: usize = 512;

pub fn scrub(input: &str) -> String {
    let mut scrubbed = input.to_string();

    scrubbed = EMAIL_REGEX.replace_all(&scrubbed, "[EMAIL]").to_string();
    scrubbed = BEARER_REGEX.replace_all(&scrubbed, "Bearer [TOKEN]").to_string();
    scrubbed = API_KEY_REGEX.replace_all(&scrubbed, "[API_KEY]").to_string();
    scrubbed = CREDIT_CARD_REGEX
        .replace_all(&scrubbed, "[CREDIT_CARD]")
        .to_string();

    scrubbed
}

/// Scrub and cap the length so a runaway model response cannot flood the logs.
pub fn scrub_for_log(input: &str) -> String {
    let scrubbed = scrub(input);
    if scrubbed.chars().count() <= MAX_LOGGED_LEN {
        return scrubbed;
    }
    let truncated: String = scrubbed.chars().take(MAX_LOGGED_LEN).collect();
    format!("{}...[truncated]", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrub_email() {
        let input = "SELECT gdp FROM indicators WHERE country_name = 'me@example.com'";
        assert_eq!(
            scrub(input),
            "SELECT gdp FROM indicators WHERE country_name = '[EMAIL]'"
        );
    }

    #[test]
    fn test_scrub_bearer_token() {
        let input = "401 Unauthorized: Authorization: Bearer abc.def-123";
        assert_eq!(scrub(input), "401 Unauthorized: Authorization: Bearer [TOKEN]");
    }

    #[test]
    fn test_scrub_api_key() {
        let input = "Incorrect API key provided: sk-proj_abcdefgh12345678";
        assert_eq!(scrub(input), "Incorrect API key provided: [API_KEY]");
    }

    #[test]
    fn test_scrub_leaves_indicator_values() {
        let input = "SELECT gdp FROM indicators WHERE year = 2021 AND gdp > 1000000";
        assert_eq!(scrub(input), input);
    }

    #[test]
    fn test_scrub_for_log_truncates() {
        let input = "x".repeat(MAX_LOGGED_LEN + 10);
        let out = scrub_for_log(&input);
        assert!(out.ends_with("...[truncated]"));
        assert_eq!(out.len(), MAX_LOGGED_LEN + "...[truncated]".len());
    }
}
