//! Maps provider error codes to a closed, user-facing error taxonomy.
//!
//! [`classify`] is total: every known code maps to its category and a
//! localized message, and anything else maps to [`ErrorCategory::Unknown`]
//! with a generic, non-empty message. Codes are accepted with or without the
//! provider's `auth/` prefix.
//!
//! Input validation failures detected before any provider call use the
//! `local/...` codes in [`local`], so they are classified through the same
//! table.

use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Codes for failures detected locally, before the provider is called.
pub mod local {
    pub const MISSING_FIELDS: &str = "local/missing-fields";
    pub const INVALID_EMAIL: &str = "local/invalid-email";
    pub const PASSWORD_TOO_SHORT: &str = "local/password-too-short";
    pub const PASSWORD_NEEDS_LETTER_AND_DIGIT: &str = "local/password-needs-letter-and-digit";
    pub const MISSING_PHONE_NUMBER: &str = "local/missing-phone-number";
    pub const MISSING_VERIFICATION_CODE: &str = "local/missing-verification-code";
}

/// User-facing failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Rejected input: empty fields, malformed email, weak password.
    InvalidInput,
    /// Credentials rejected.
    Unauthenticated,
    /// The identity already exists under another method.
    AccountConflict,
    /// The user dismissed the popup or challenge.
    UserCancelled,
    /// The browser blocked the popup.
    PopupBlocked,
    /// The deployment domain is not allow-listed with the provider.
    DomainNotAuthorized,
    /// Too many attempts.
    RateLimited,
    /// The phone challenge is stale.
    ChallengeExpired,
    /// The phone verification code is wrong.
    InvalidVerificationCode,
    /// Transport failure.
    Network,
    /// Anything not recognised.
    Unknown,
}

/// Language of user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    English,
    Hebrew,
}

impl Locale {
    /// BCP 47 primary language tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Locale::English => "en",
            Locale::Hebrew => "he",
        }
    }

    /// True for right-to-left scripts.
    pub fn is_rtl(&self) -> bool {
        matches!(self, Locale::Hebrew)
    }
}

impl FromStr for Locale {
    type Err = AuthError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let primary = raw
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "en" => Ok(Locale::English),
            "he" | "iw" => Ok(Locale::Hebrew),
            _ => Err(AuthError::Config(format!("Unsupported locale: {raw}"))),
        }
    }
}

/// A taxonomy category plus the message shown to the user.
///
/// Only this module constructs values of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedError {
    category: ErrorCategory,
    message: String,
}

impl ClassifiedError {
    fn new(category: ErrorCategory, message: &str) -> Self {
        Self {
            category,
            message: message.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Message {
    MissingFields,
    InvalidEmail,
    PasswordTooShort,
    PasswordNeedsLetterAndDigit,
    WeakPassword,
    MissingPhoneNumber,
    InvalidPhoneNumber,
    MissingVerificationCode,
    WrongCredentials,
    AccountDisabled,
    AccountExists,
    PopupClosed,
    PopupBlocked,
    DomainNotAuthorized,
    TooManyRequests,
    CodeExpired,
    InvalidCode,
    Network,
    Unknown,
}

/// Classify a provider (or local) error code using English messages.
pub fn classify(code: &str) -> ClassifiedError {
    classify_localized(code, Locale::default())
}

/// Classify a provider (or local) error code.
pub fn classify_localized(code: &str, locale: Locale) -> ClassifiedError {
    let (category, message) = lookup(code);
    ClassifiedError::new(category, text(message, locale))
}

/// Classify any [`AuthError`]; non-provider failures are `Unknown`.
pub fn classify_error(error: &AuthError, locale: Locale) -> ClassifiedError {
    classify_localized(error.code(), locale)
}

fn lookup(code: &str) -> (ErrorCategory, Message) {
    use ErrorCategory::*;

    let code = code.trim();
    let key = code.strip_prefix("auth/").unwrap_or(code);

    match key {
        local::MISSING_FIELDS => (InvalidInput, Message::MissingFields),
        local::INVALID_EMAIL | "invalid-email" => (InvalidInput, Message::InvalidEmail),
        local::PASSWORD_TOO_SHORT => (InvalidInput, Message::PasswordTooShort),
        local::PASSWORD_NEEDS_LETTER_AND_DIGIT => {
            (InvalidInput, Message::PasswordNeedsLetterAndDigit)
        }
        "weak-password" => (InvalidInput, Message::WeakPassword),
        "missing-password" | "missing-email" => (InvalidInput, Message::MissingFields),
        local::MISSING_PHONE_NUMBER | "missing-phone-number" => {
            (InvalidInput, Message::MissingPhoneNumber)
        }
        "invalid-phone-number" => (InvalidInput, Message::InvalidPhoneNumber),

        "user-not-found"
        | "wrong-password"
        | "invalid-credential"
        | "invalid-login-credentials" => (Unauthenticated, Message::WrongCredentials),
        "user-disabled" => (Unauthenticated, Message::AccountDisabled),

        "email-already-in-use"
        | "account-exists-with-different-credential"
        | "credential-already-in-use" => (AccountConflict, Message::AccountExists),

        "popup-closed-by-user" | "cancelled-popup-request" | "user-cancelled" => {
            (UserCancelled, Message::PopupClosed)
        }
        "popup-blocked" => (PopupBlocked, Message::PopupBlocked),
        "unauthorized-domain" | "operation-not-allowed" => {
            (DomainNotAuthorized, Message::DomainNotAuthorized)
        }
        "too-many-requests" | "quota-exceeded" => (RateLimited, Message::TooManyRequests),

        "code-expired" | "session-expired" | "captcha-check-failed" => {
            (ChallengeExpired, Message::CodeExpired)
        }
        local::MISSING_VERIFICATION_CODE | "missing-verification-code" => {
            (InvalidInput, Message::MissingVerificationCode)
        }
        "invalid-verification-code" | "invalid-verification-id" => {
            (InvalidVerificationCode, Message::InvalidCode)
        }

        "network-request-failed" | "timeout" => (Network, Message::Network),

        _ => (Unknown, Message::Unknown),
    }
}

fn text(message: Message, locale: Locale) -> &'static str {
    match locale {
        Locale::English => english(message),
        Locale::Hebrew => hebrew(message),
    }
}

fn english(message: Message) -> &'static str {
    match message {
        Message::MissingFields => "Please fill in all fields.",
        Message::InvalidEmail => "Please enter a valid email address.",
        Message::PasswordTooShort => "Password must be at least 6 characters long.",
        Message::PasswordNeedsLetterAndDigit => {
            "Password must contain at least one letter and one number."
        }
        Message::WeakPassword => "This password is too weak. Choose a stronger one.",
        Message::MissingPhoneNumber => "Please enter a phone number.",
        Message::InvalidPhoneNumber => "That phone number is not valid.",
        Message::MissingVerificationCode => "Please enter the verification code.",
        Message::WrongCredentials => "Incorrect email or password.",
        Message::AccountDisabled => "This account has been disabled.",
        Message::AccountExists => "An account with this email already exists.",
        Message::PopupClosed => "The sign-in window was closed before finishing.",
        Message::PopupBlocked => {
            "The sign-in popup was blocked. Allow popups for this site and try again."
        }
        Message::DomainNotAuthorized => "Sign-in is not enabled for this domain.",
        Message::TooManyRequests => "Too many attempts. Please try again later.",
        Message::CodeExpired => "The verification code has expired. Request a new one.",
        Message::InvalidCode => "The verification code is incorrect.",
        Message::Network => "Network error. Check your connection and try again.",
        Message::Unknown => "Something went wrong. Please try again.",
    }
}

fn hebrew(message: Message) -> &'static str {
    match message {
        Message::MissingFields => "נא למלא את כל השדות.",
        Message::InvalidEmail => "נא להזין כתובת אימייל תקינה.",
        Message::PasswordTooShort => "הסיסמה חייבת להכיל לפחות 6 תווים.",
        Message::PasswordNeedsLetterAndDigit => "הסיסמה חייבת להכיל לפחות אות אחת וספרה אחת.",
        Message::WeakPassword => "הסיסמה חלשה מדי. בחרו סיסמה חזקה יותר.",
        Message::MissingPhoneNumber => "נא להזין מספר טלפון.",
        Message::InvalidPhoneNumber => "מספר הטלפון אינו תקין.",
        Message::MissingVerificationCode => "נא להזין את קוד האימות.",
        Message::WrongCredentials => "אימייל או סיסמה שגויים.",
        Message::AccountDisabled => "החשבון הזה הושבת.",
        Message::AccountExists => "כבר קיים חשבון עם כתובת האימייל הזו.",
        Message::PopupClosed => "חלון ההתחברות נסגר לפני סיום התהליך.",
        Message::PopupBlocked => "הדפדפן חסם את חלון ההתחברות. אפשרו חלונות קופצים ונסו שוב.",
        Message::DomainNotAuthorized => "ההתחברות אינה מאופשרת בדומיין הזה.",
        Message::TooManyRequests => "יותר מדי ניסיונות. נסו שוב מאוחר יותר.",
        Message::CodeExpired => "תוקף קוד האימות פג. בקשו קוד חדש.",
        Message::InvalidCode => "קוד האימות שגוי.",
        Message::Network => "שגיאת רשת. בדקו את החיבור ונסו שוב.",
        Message::Unknown => "משהו השתבש. נסו שוב.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: &[(&str, ErrorCategory)] = &[
        (local::MISSING_FIELDS, ErrorCategory::InvalidInput),
        (local::INVALID_EMAIL, ErrorCategory::InvalidInput),
        (local::PASSWORD_TOO_SHORT, ErrorCategory::InvalidInput),
        (local::PASSWORD_NEEDS_LETTER_AND_DIGIT, ErrorCategory::InvalidInput),
        (local::MISSING_PHONE_NUMBER, ErrorCategory::InvalidInput),
        (local::MISSING_VERIFICATION_CODE, ErrorCategory::InvalidInput),
        ("auth/missing-verification-code", ErrorCategory::InvalidInput),
        ("auth/invalid-email", ErrorCategory::InvalidInput),
        ("auth/weak-password", ErrorCategory::InvalidInput),
        ("auth/invalid-phone-number", ErrorCategory::InvalidInput),
        ("auth/user-not-found", ErrorCategory::Unauthenticated),
        ("auth/wrong-password", ErrorCategory::Unauthenticated),
        ("auth/invalid-credential", ErrorCategory::Unauthenticated),
        ("auth/user-disabled", ErrorCategory::Unauthenticated),
        ("auth/email-already-in-use", ErrorCategory::AccountConflict),
        (
            "auth/account-exists-with-different-credential",
            ErrorCategory::AccountConflict,
        ),
        ("auth/popup-closed-by-user", ErrorCategory::UserCancelled),
        ("auth/cancelled-popup-request", ErrorCategory::UserCancelled),
        ("auth/popup-blocked", ErrorCategory::PopupBlocked),
        ("auth/unauthorized-domain", ErrorCategory::DomainNotAuthorized),
        ("auth/too-many-requests", ErrorCategory::RateLimited),
        ("auth/quota-exceeded", ErrorCategory::RateLimited),
        ("auth/code-expired", ErrorCategory::ChallengeExpired),
        ("auth/session-expired", ErrorCategory::ChallengeExpired),
        (
            "auth/invalid-verification-code",
            ErrorCategory::InvalidVerificationCode,
        ),
        ("auth/network-request-failed", ErrorCategory::Network),
    ];

    #[test]
    fn test_every_known_code_has_category_and_message_in_every_locale() {
        for (code, expected) in KNOWN {
            for locale in [Locale::English, Locale::Hebrew] {
                let classified = classify_localized(code, locale);
                assert_eq!(classified.category(), *expected, "code {code}");
                assert!(!classified.message().is_empty(), "code {code}");
            }
        }
    }

    #[test]
    fn test_unrecognized_codes_fall_back_to_unknown() {
        for code in ["", "auth/", "auth/something-new", "totally random", "local/nope"] {
            let classified = classify(code);
            assert_eq!(classified.category(), ErrorCategory::Unknown);
            assert!(!classified.message().is_empty());
        }
    }

    #[test]
    fn test_prefix_is_optional() {
        assert_eq!(classify("popup-blocked"), classify("auth/popup-blocked"));
        assert_eq!(
            classify("  auth/wrong-password ").category(),
            ErrorCategory::Unauthenticated
        );
    }

    #[test]
    fn test_unknown_message_is_generic() {
        assert_eq!(
            classify("auth/internal-error").message(),
            "Something went wrong. Please try again."
        );
    }

    #[test]
    fn test_classify_error_non_provider_is_unknown() {
        let err = AuthError::InvalidStateTransition("Back in MethodChoice".to_string());
        assert_eq!(
            classify_error(&err, Locale::English).category(),
            ErrorCategory::Unknown
        );
    }

    #[test]
    fn test_locale_parsing() {
        assert_eq!("en".parse::<Locale>().unwrap(), Locale::English);
        assert_eq!("en-US".parse::<Locale>().unwrap(), Locale::English);
        assert_eq!("he_IL".parse::<Locale>().unwrap(), Locale::Hebrew);
        assert_eq!("HE".parse::<Locale>().unwrap(), Locale::Hebrew);
        assert!("fr".parse::<Locale>().is_err());
        assert!(Locale::Hebrew.is_rtl());
        assert!(!Locale::English.is_rtl());
    }

    #[test]
    fn test_messages_differ_between_locales() {
        let en = classify_localized("auth/wrong-password", Locale::English);
        let he = classify_localized("auth/wrong-password", Locale::Hebrew);
        assert_eq!(en.category(), he.category());
        assert_ne!(en.message(), he.message());
    }
}
