use super::error::RegistryError;

/// Checks an identifier that comes from configuration rather than from the parser.
pub fn validate_identifier(name: &str) -> Result<(), RegistryError> {
    if name.is_empty() {
        return Err(RegistryError::InvalidIdentifier("empty".to_string()));
    }
    if name.len() > 128 {
        return Err(RegistryError::InvalidIdentifier(format!(
            "too long: {}",
            name.len()
        )));
    }
    if !name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
    {
        return Err(RegistryError::InvalidIdentifier(format!(
            "must start with a letter or underscore: {}",
            name
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(RegistryError::InvalidIdentifier(format!(
            "forbidden characters in: {}",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("indicators").is_ok());
        assert!(validate_identifier("world_bank_data_2025").is_ok());
        assert!(validate_identifier("_staging").is_ok());

        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("2025_data").is_err());
        assert!(validate_identifier("foo\"bar").is_err());
        assert!(validate_identifier("x; DROP TABLE indicators").is_err());
        assert!(validate_identifier("null\0byte").is_err());
        assert!(validate_identifier(&"a".repeat(129)).is_err());
    }
}
