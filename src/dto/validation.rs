//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates a language code: two or three lowercase letters, optionally followed by a region.
///
/// # Examples
///
/// ```ignore
/// validate_language("en")    // Ok
/// validate_language("pt-BR") // Ok
/// validate_language("EN")    // Err - uppercase
/// validate_language("e")     // Err - too short
/// ```
pub fn validate_language(code: &str) -> Result<(), ValidationError> {
    let (primary, region) = match code.split_once('-') {
        Some((primary, region)) => (primary, Some(region)),
        None => (code, None),
    };

    if !(2..=3).contains(&primary.len()) || !primary.chars().all(|c| c.is_ascii_lowercase()) {
        let mut err = ValidationError::new("language_format");
        err.message = Some(
            format!("Language must start with 2 or 3 lowercase letters (got `{code}`)").into(),
        );
        return Err(err);
    }

    if let Some(region) = region {
        let valid_region = (2..=3).contains(&region.len())
            && region.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid_region {
            let mut err = ValidationError::new("language_region");
            err.message = Some("Language region must be 2 or 3 alphanumeric characters".into());
            return Err(err);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_language_valid() {
        assert!(validate_language("en").is_ok());
        assert!(validate_language("fra").is_ok());
        assert!(validate_language("pt-BR").is_ok());
        assert!(validate_language("es-419").is_ok());
    }

    #[test]
    fn test_validate_language_invalid_primary() {
        assert!(validate_language("").is_err());
        assert!(validate_language("e").is_err()); // too short
        assert!(validate_language("engl").is_err()); // too long
        assert!(validate_language("EN").is_err()); // uppercase
        assert!(validate_language("e1").is_err());
    }

    #[test]
    fn test_validate_language_invalid_region() {
        assert!(validate_language("en-").is_err());
        assert!(validate_language("en-GBRX").is_err());
        assert!(validate_language("en-G_").is_err());
    }
}
