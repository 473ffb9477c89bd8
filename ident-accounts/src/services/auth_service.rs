use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use ident_shared::errors::AppError;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::internal(format!("invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Strength-check a candidate password against the account context.
/// Returns every violated rule so the caller can surface them per-field.
pub fn validate_password(password: &str, username: &str, email: &str) -> Vec<String> {
    let mut problems = Vec::new();

    if password.len() < 8 {
        problems.push("password must be at least 8 characters".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("password must contain at least one number".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        problems.push("password must contain at least one letter".to_string());
    }

    let lowered = password.to_lowercase();
    if username.len() >= 3 && lowered.contains(&username.to_lowercase()) {
        problems.push("password is too similar to the username".to_string());
    }
    if let Some(local_part) = email.split('@').next() {
        if local_part.len() >= 3 && lowered.contains(&local_part.to_lowercase()) {
            problems.push("password is too similar to the email address".to_string());
        }
    }

    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_passwords_verify_and_reject() {
        let hash = hash_password("Test@4321").unwrap();
        assert!(verify_password("Test@4321", &hash).unwrap());
        assert!(!verify_password("Test@4322", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("Test@4321").unwrap();
        let b = hash_password("Test@4321").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn strong_password_passes() {
        assert!(validate_password("Test@4321", "ali", "ali@example.com").is_empty());
    }

    #[test]
    fn weak_passwords_report_each_violated_rule() {
        let problems = validate_password("321", "ali", "ali@example.com");
        assert_eq!(problems.len(), 2); // too short, no letter

        assert_eq!(validate_password("password", "ali", "a@b.c").len(), 1); // no number
        assert_eq!(validate_password("12345678", "ali", "a@b.c").len(), 1); // no letter
    }

    #[test]
    fn passwords_similar_to_account_fields_are_rejected() {
        let by_username = validate_password("xXmarcus99Xx", "marcus", "m@example.com");
        assert!(by_username.iter().any(|p| p.contains("username")));

        let by_email = validate_password("marcus99abc", "someone", "marcus@example.com");
        assert!(by_email.iter().any(|p| p.contains("email")));
    }
}
