use std::collections::BTreeMap;

use ident_shared::errors::{AppError, AppResult, ErrorCode};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 30;

/// Usernames are 3-30 characters from `[A-Za-z0-9_.]`, do not start or end
/// with a dot, and never contain two dots in a row.
pub fn validate_username(username: &str) -> Result<(), String> {
    let len = username.chars().count();
    if len < USERNAME_MIN_LEN || len > USERNAME_MAX_LEN {
        return Err(format!(
            "username must be {USERNAME_MIN_LEN}-{USERNAME_MAX_LEN} characters"
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err("only a-z, A-Z, 0-9, _ and . are allowed".to_string());
    }
    if username.starts_with('.') || username.ends_with('.') {
        return Err("username may not start or end with a dot".to_string());
    }
    if username.contains("..") {
        return Err("username may not contain consecutive dots".to_string());
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if validator::validate_email(email) {
        Ok(())
    } else {
        Err("enter a valid email address".to_string())
    }
}

/// Accumulates per-field validation messages and renders them as the
/// `details` object of a single 400 response.
#[derive(Debug, Default)]
pub struct FieldErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn extend(&mut self, field: &str, messages: impl IntoIterator<Item = String>) {
        for message in messages {
            self.push(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_result(self) -> AppResult<()> {
        if self.fields.is_empty() {
            return Ok(());
        }
        let details = serde_json::to_value(&self.fields)
            .unwrap_or_else(|_| serde_json::Value::Null);
        Err(AppError::with_details(
            ErrorCode::ValidationError,
            "invalid input",
            details,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_usernames_are_accepted() {
        for name in ["ali", "ali.baba", "user_42", "A.b_C.9", "abc"] {
            assert!(validate_username(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn bad_usernames_are_rejected() {
        for name in ["%$", "ab", "", ".ali", "ali.", "a..b", "ali baba", "héllo"] {
            assert!(validate_username(name).is_err(), "{name}");
        }
        let too_long = "a".repeat(USERNAME_MAX_LEN + 1);
        assert!(validate_username(&too_long).is_err());
        let max = "a".repeat(USERNAME_MAX_LEN);
        assert!(validate_username(&max).is_ok());
    }

    #[test]
    fn email_syntax_is_checked() {
        assert!(validate_email("ali@example.com").is_ok());
        assert!(validate_email("ali.com").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn field_errors_render_per_field_details() {
        let mut errors = FieldErrors::new();
        errors.push("username", "taken");
        errors.push("password", "too short");
        errors.push("password", "no number");

        let err = errors.into_result().unwrap_err();
        match err {
            AppError::Known { code, details, .. } => {
                assert_eq!(code, ErrorCode::ValidationError);
                let details = details.unwrap();
                assert_eq!(details["username"][0], "taken");
                assert_eq!(details["password"][1], "no number");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_field_errors_are_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
    }
}
