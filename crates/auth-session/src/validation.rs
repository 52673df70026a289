//! Local input validation for the sign-in modal.
//!
//! Every check returns the `local/...` code of the first rule that fails, so
//! invalid input is classified without ever reaching the provider.

use crate::classifier::local;
use regex::Regex;
use std::sync::OnceLock;

/// Minimum password length accepted at sign-up.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Result of a local validation check: `Err` carries a `local/...` code.
pub type ValidationResult = Result<(), &'static str>;

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
    })
}

/// True for addresses of the shape `local@domain.tld`.
pub fn is_well_formed_email(email: &str) -> bool {
    email_pattern().is_match(email.trim())
}

/// Sign-in needs both fields; nothing else is checked locally.
pub fn validate_sign_in(email: &str, password: &str) -> ValidationResult {
    if email.trim().is_empty() || password.is_empty() {
        return Err(local::MISSING_FIELDS);
    }
    Ok(())
}

/// Sign-up rules, first failure wins: all fields present, email shape,
/// password length, password has a letter and a digit.
pub fn validate_sign_up(email: &str, password: &str, display_name: &str) -> ValidationResult {
    if email.trim().is_empty() || password.is_empty() || display_name.trim().is_empty() {
        return Err(local::MISSING_FIELDS);
    }
    if !is_well_formed_email(email) {
        return Err(local::INVALID_EMAIL);
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(local::PASSWORD_TOO_SHORT);
    }
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_letter && has_digit) {
        return Err(local::PASSWORD_NEEDS_LETTER_AND_DIGIT);
    }
    Ok(())
}

pub fn validate_phone_number(phone_number: &str) -> ValidationResult {
    if phone_number.trim().is_empty() {
        return Err(local::MISSING_PHONE_NUMBER);
    }
    Ok(())
}

pub fn validate_verification_code(code: &str) -> ValidationResult {
    if code.trim().is_empty() {
        return Err(local::MISSING_VERIFICATION_CODE);
    }
    Ok(())
}
