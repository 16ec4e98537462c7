//! Validation helpers for DTOs.

use validator::{ValidateEmail, ValidationError};

/// Maximum number of recipients of a single email.
pub const MAX_RECIPIENTS: usize = 50;

/// Rejects strings made only of whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Validates a non-empty, bounded list of well-formed email addresses.
pub fn validate_recipients(recipients: &[String]) -> Result<(), ValidationError> {
    if recipients.is_empty() || recipients.len() > MAX_RECIPIENTS {
        let mut err = ValidationError::new("recipients_count");
        err.message = Some(
            format!(
                "between 1 and {MAX_RECIPIENTS} recipients are required (got {})",
                recipients.len()
            )
            .into(),
        );
        return Err(err);
    }

    if let Some(invalid) = recipients.iter().find(|address| !address.validate_email()) {
        let mut err = ValidationError::new("recipient_email");
        err.message = Some(format!("`{invalid}` is not a valid email address").into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_strings_are_rejected() {
        assert!(validate_not_blank("Eagles").is_ok());
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank("   \t").is_err());
    }

    #[test]
    fn recipients_must_be_valid_addresses() {
        assert!(validate_recipients(&["mom@example.com".into()]).is_ok());
        assert!(validate_recipients(&["mom@example.com".into(), "dad".into()]).is_err());
    }

    #[test]
    fn recipients_count_is_bounded() {
        assert!(validate_recipients(&[]).is_err());
        let many: Vec<String> = (0..=MAX_RECIPIENTS)
            .map(|i| format!("parent{i}@example.com"))
            .collect();
        assert!(validate_recipients(&many).is_err());
        assert!(validate_recipients(&many[..MAX_RECIPIENTS]).is_ok());
    }
}
