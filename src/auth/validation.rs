//! Input Validation
//! Mission: One password policy, one email rule, one name sanitizer for every flow

use lazy_static::lazy_static;
use regex::Regex;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;
pub const MAX_NAME_LENGTH: usize = 50;
const MAX_EMAIL_LENGTH: usize = 254;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("email regex compiles");
}

/// Why a password was rejected. The messages are user-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordPolicyError {
    TooShort,
    TooLong,
    MissingCharacterClass,
}

impl PasswordPolicyError {
    pub fn message(&self) -> &'static str {
        match self {
            PasswordPolicyError::TooShort => "Password must be at least 8 characters",
            PasswordPolicyError::TooLong => "Password is too long",
            PasswordPolicyError::MissingCharacterClass => {
                "Password must contain at least one uppercase letter, one lowercase letter, and one number"
            }
        }
    }
}

impl std::fmt::Display for PasswordPolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for PasswordPolicyError {}

/// Shared by register, change-password and reset-password.
///
/// Length is counted in characters, 8..=128 inclusive. Composition requires at
/// least one ASCII lowercase letter, one ASCII uppercase letter and one digit.
pub fn validate_password(password: &str) -> Result<(), PasswordPolicyError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(PasswordPolicyError::TooShort);
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(PasswordPolicyError::TooLong);
    }

    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if has_lower && has_upper && has_digit {
        Ok(())
    } else {
        Err(PasswordPolicyError::MissingCharacterClass)
    }
}

/// Syntax check only; deliverability is not our concern
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.len() <= MAX_EMAIL_LENGTH && EMAIL_RE.is_match(email)
}

/// Trim and lowercase. Provider-specific alias rules (dots, plus tags) are
/// deliberately left alone.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trim, cap at 50 characters, then escape markup.
///
/// The cap applies before escaping so an entity is never cut in half.
pub fn sanitize_name(raw: Option<&str>) -> String {
    let capped: String = raw
        .unwrap_or_default()
        .trim()
        .chars()
        .take(MAX_NAME_LENGTH)
        .collect();
    escape_html(&capped)
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            '\\' => out.push_str("&#x5C;"),
            '`' => out.push_str("&#96;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_length_boundaries() {
        assert_eq!(validate_password("Abcde12"), Err(PasswordPolicyError::TooShort));
        assert_eq!(validate_password("Abcdef12"), Ok(()));

        let max = format!("Aa1{}", "x".repeat(125));
        assert_eq!(max.chars().count(), 128);
        assert_eq!(validate_password(&max), Ok(()));

        let over = format!("Aa1{}", "x".repeat(126));
        assert_eq!(validate_password(&over), Err(PasswordPolicyError::TooLong));
    }

    #[test]
    fn test_password_composition() {
        assert_eq!(
            validate_password("alllowercase1"),
            Err(PasswordPolicyError::MissingCharacterClass)
        );
        assert_eq!(
            validate_password("ALLUPPER1"),
            Err(PasswordPolicyError::MissingCharacterClass)
        );
        assert_eq!(
            validate_password("NoDigitsHere"),
            Err(PasswordPolicyError::MissingCharacterClass)
        );
        assert_eq!(validate_password("Passw0rd!"), Ok(()));
        assert_eq!(validate_password("NewPass1"), Ok(()));
    }

    #[test]
    fn test_password_length_counts_characters() {
        // 8 characters, more than 8 bytes
        assert_eq!(validate_password("Ab1ééééé"), Ok(()));
        // 7 characters even though the byte length is larger
        assert_eq!(validate_password("Ab1éééé"), Err(PasswordPolicyError::TooShort));
    }

    #[test]
    fn test_email_syntax() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("  Alice.Smith+shop@mail.example.co.uk "));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("alice"));
        assert!(!is_valid_email("alice@"));
        assert!(!is_valid_email("alice@example"));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email("alice@@example.com"));
        assert!(!is_valid_email("alice@example..com"));

        let long_local = format!("{}@example.com", "a".repeat(250));
        assert!(!is_valid_email(&long_local));
    }

    #[test]
    fn test_normalize_email_only_trims_and_lowercases() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
        assert_eq!(normalize_email("a.l.i.c.e+tag@gmail.com"), "a.l.i.c.e+tag@gmail.com");
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name(None), "");
        assert_eq!(sanitize_name(Some("  Alice  ")), "Alice");
        assert_eq!(
            sanitize_name(Some("<script>alert('x')</script>")),
            "&lt;script&gt;alert(&#x27;x&#x27;)&lt;&#x2F;script&gt;"
        );

        assert_eq!(sanitize_name(Some("a\\b")), "a&#x5C;b");
        assert_eq!(sanitize_name(Some("`x`")), "&#96;x&#96;");

        let long = "é".repeat(80);
        assert_eq!(sanitize_name(Some(&long)).chars().count(), MAX_NAME_LENGTH);

        // cap happens before escaping, so trailing entities stay whole
        let ampersands = "&".repeat(60);
        let cleaned = sanitize_name(Some(&ampersands));
        assert_eq!(cleaned, "&amp;".repeat(50));
    }
}
