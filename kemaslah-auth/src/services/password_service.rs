use std::sync::OnceLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use kemaslah_shared::errors::{AppError, AppResult, ErrorCode};

pub const MIN_PASSWORD_LENGTH: usize = 10;
pub const PASSWORD_SYMBOLS: &str = "@$!%*?&";

/// Outcome of checking a password against a stored hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCheck {
    Valid { needs_rehash: bool },
    Invalid,
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))
}

/// Checks `password` against a stored hash. Argon2 PHC strings are verified
/// directly; bare SHA-256 hex digests written by older releases still verify
/// but are reported as needing a rehash. Anything else never matches.
pub fn verify_password(password: &str, stored: &str) -> PasswordCheck {
    if is_legacy_digest(stored) {
        let digest = legacy_digest(password);
        let matches: bool = digest.as_bytes().ct_eq(stored.to_ascii_lowercase().as_bytes()).into();
        return if matches {
            PasswordCheck::Valid { needs_rehash: true }
        } else {
            PasswordCheck::Invalid
        };
    }

    let parsed_hash = match PasswordHash::new(stored) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is unreadable");
            equalize_timing(password);
            return PasswordCheck::Invalid;
        }
    };
    if Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok() {
        PasswordCheck::Valid { needs_rehash: false }
    } else {
        PasswordCheck::Invalid
    }
}

/// Runs one Argon2 verification against a throwaway hash, so a lookup miss
/// costs the same as a wrong password.
pub fn equalize_timing(password: &str) {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    let dummy = DUMMY.get_or_init(|| hash_password("kemaslah-timing-guard").ok());
    if let Some(hash) = dummy {
        let _ = verify_password(password, hash);
    }
}

/// A password nobody knows, for accounts that only sign in through the provider.
pub fn unusable_password() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn legacy_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn is_legacy_digest(stored: &str) -> bool {
    stored.len() == 64 && stored.chars().all(|c| c.is_ascii_hexdigit())
}

/// At least ten characters drawn from letters, digits and `@$!%*?&`, with at
/// least one lowercase letter, one uppercase letter, one digit and one symbol.
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
        && password
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SYMBOLS.contains(c))
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SYMBOLS.contains(c))
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if !is_strong_password(password) {
        return Err(AppError::new(
            ErrorCode::PasswordTooWeak,
            "Password must be 10+ chars with mixed case, a digit and a symbol (@$!%*?&).",
        ));
    }
    Ok(())
}

/// `local@domain.tld` where the TLD is at least two letters.
pub fn is_valid_email(email: &str) -> bool {
    if !validator::validate_email(email) {
        return false;
    }
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c));
    let tld_ok = domain
        .rsplit_once('.')
        .map(|(host, tld)| !host.is_empty() && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
        .unwrap_or(false);
    local_ok && tld_ok
}

pub fn validate_email(email: &str) -> AppResult<()> {
    if !is_valid_email(email) {
        return Err(AppError::new(ErrorCode::InvalidEmail, "Invalid email format."));
    }
    Ok(())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Upper-cased first letters of the first two words of the username.
pub fn initials(username: &str) -> String {
    username
        .split_whitespace()
        .take(2)
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}
