/// Input validators for registration and login
/// Features:
/// 1. Length limits on every field
/// 2. Email format validation
/// 3. Username character policy
/// 4. SQL injection pattern screening

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 32;
const MAX_MEDICINE_FIELD_LENGTH: usize = 128;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").unwrap();

    static ref SQL_INJECTION_PATTERNS: [Regex; 4] = [
        // Union-based
        Regex::new(r"(?i)\s+UNION\s+").unwrap(),
        // Comments and statement separators
        Regex::new(r"(--|;|/\*|\*/)").unwrap(),
        // Stacked queries
        Regex::new(r"(?i);\s*(INSERT|UPDATE|DELETE|DROP|CREATE|ALTER)").unwrap(),
        // Time-based blind injection
        Regex::new(r"(?i)(SLEEP|WAITFOR|BENCHMARK|DBMS_LOCK)\s*\(").unwrap(),
    ];
}

/// Validates and normalizes an email address (trimmed, lowercased)
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email"));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email", MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email", MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email"));
    }

    if let Some(at_pos) = trimmed.find('@') {
        if at_pos > 64 {
            return Err(ValidationError::SuspiciousContent("email"));
        }
    }

    if contains_sql_injection_patterns(trimmed) {
        return Err(ValidationError::PossibleSQLInjection);
    }

    Ok(trimmed.to_lowercase())
}

/// Validates a username: 3-32 characters of letters, digits, `_`, `.`, `-`,
/// starting with a letter or digit
pub fn is_valid_username(username: &str) -> Result<String, ValidationError> {
    let trimmed = username.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("username"));
    }

    if trimmed.chars().count() < MIN_USERNAME_LENGTH {
        return Err(ValidationError::TooShort("username", MIN_USERNAME_LENGTH));
    }

    if trimmed.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong("username", MAX_USERNAME_LENGTH));
    }

    if !USERNAME_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("username"));
    }

    Ok(trimmed.to_string())
}

/// Validates a free-text medicine field
pub fn is_valid_medicine_field(
    field: &'static str,
    value: &str,
    required: bool,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();

    if required && trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }

    if trimmed.chars().count() > MAX_MEDICINE_FIELD_LENGTH {
        return Err(ValidationError::TooLong(field, MAX_MEDICINE_FIELD_LENGTH));
    }

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::SuspiciousContent(field));
    }

    Ok(trimmed.to_string())
}

fn contains_sql_injection_patterns(input: &str) -> bool {
    SQL_INJECTION_PATTERNS.iter().any(|pattern| pattern.is_match(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(is_valid_email("user@example.com").is_ok());
        assert!(is_valid_email("test.email@domain.co.uk").is_ok());
        assert!(is_valid_email("user+tag@example.com").is_ok());
    }

    #[test]
    fn test_email_is_normalized() {
        assert_eq!(is_valid_email("  John@Example.COM ").unwrap(), "john@example.com");
    }

    #[test]
    fn test_invalid_email_format() {
        assert!(is_valid_email("invalid").is_err());
        assert!(is_valid_email("user@").is_err());
        assert!(is_valid_email("@example.com").is_err());
        assert!(is_valid_email("user@@example.com").is_err());
    }

    #[test]
    fn test_email_length_limits() {
        let too_long = format!("{}@example.com", "a".repeat(250));
        assert!(is_valid_email(&too_long).is_err());
        assert_eq!(is_valid_email(""), Err(ValidationError::EmptyField("email")));
    }

    #[test]
    fn test_sql_injection_in_email() {
        assert!(is_valid_email("user--@example.com").is_err());
    }

    #[test]
    fn test_valid_username() {
        assert_eq!(is_valid_username("john_doe").unwrap(), "john_doe");
        assert!(is_valid_username("j.doe-99").is_ok());
    }

    #[test]
    fn test_invalid_username() {
        assert_eq!(is_valid_username("jo"), Err(ValidationError::TooShort("username", 3)));
        assert!(is_valid_username(&"a".repeat(33)).is_err());
        assert_eq!(
            is_valid_username("_hidden"),
            Err(ValidationError::InvalidFormat("username"))
        );
        assert!(is_valid_username("john doe").is_err());
        assert!(is_valid_username("robert'); DROP").is_err());
    }

    #[test]
    fn test_medicine_fields() {
        assert_eq!(is_valid_medicine_field("name", " Aspirin ", true).unwrap(), "Aspirin");
        assert!(is_valid_medicine_field("name", "", true).is_err());
        assert!(is_valid_medicine_field("dosage", "", false).is_ok());
        assert!(is_valid_medicine_field("dosage", "a\0b", false).is_err());
    }
}
