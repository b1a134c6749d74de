use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::AuthError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// First violated rule wins; each rule has its own message.
pub fn check_password_rules(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::InvalidInput(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(AuthError::InvalidInput(
            "Password must contain at least one uppercase letter".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::InvalidInput(
            "Password must contain at least one digit".into(),
        ));
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_message(password: &str) -> Option<String> {
        check_password_rules(password).err().map(|e| e.to_string())
    }

    #[test]
    fn rules_apply_in_order() {
        assert_eq!(
            rule_message("Ab1").as_deref(),
            Some("Password must be at least 8 characters long")
        );
        assert_eq!(
            rule_message("lowercase1").as_deref(),
            Some("Password must contain at least one uppercase letter")
        );
        assert_eq!(
            rule_message("NoDigitsHere").as_deref(),
            Some("Password must contain at least one digit")
        );
        assert_eq!(rule_message("Strong1pass"), None);
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("Strong1pass").unwrap();
        assert_ne!(hash, "Strong1pass");
        assert!(verify_password("Strong1pass", &hash).unwrap());
        assert!(!verify_password("Strong2pass", &hash).unwrap());
    }

    #[test]
    fn verify_rejects_malformed_hash() {
        assert!(matches!(
            verify_password("whatever", "not-a-phc-string"),
            Err(AuthError::PasswordHash(_))
        ));
    }
}
