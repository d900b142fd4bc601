//! Password and session-token hashing
//!
//! Passwords are stored as `pbkdf2_sha256$<iterations>$<salt>$<digest>`,
//! with the PBKDF2-HMAC-SHA256 digest and the salt hex encoded.

use once_cell::sync::Lazy;
use rand::RngCore;
use sha2::{Digest, Sha256};

const ALGORITHM: &str = "pbkdf2_sha256";
const ITERATIONS: u32 = 260_000;
const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 32;
const TOKEN_LEN: usize = 32;

/// Verified against when the username is unknown, so both paths cost the same
static UNKNOWN_USER_HASH: Lazy<String> = Lazy::new(|| hash_password(""));

fn derive(raw: &str, salt: &str, iterations: u32) -> String {
    let mut out = [0u8; DIGEST_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(raw.as_bytes(), salt.as_bytes(), iterations, &mut out);
    hex::encode(out)
}

/// Hash a password with a fresh random salt
pub fn hash_password(raw: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = hex::encode(salt);
    format!(
        "{}${}${}${}",
        ALGORITHM,
        ITERATIONS,
        salt,
        derive(raw, &salt, ITERATIONS)
    )
}

/// Check a password against its stored encoding
pub fn verify_password(raw: &str, encoded: &str) -> bool {
    let mut parts = encoded.splitn(4, '$');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(ALGORITHM), Some(iterations), Some(salt), Some(expected)) => {
            match iterations.parse::<u32>() {
                Ok(n) if n > 0 => constant_time_eq(&derive(raw, salt, n), expected),
                _ => false,
            }
        }
        _ => false,
    }
}

/// Spend the same work as `verify_password` for a username that does not
/// exist. Always false.
pub fn verify_unknown_user(raw: &str) -> bool {
    verify_password(raw, &UNKNOWN_USER_HASH);
    false
}

/// New random session token (hex)
pub fn new_session_token() -> String {
    let mut token = [0u8; TOKEN_LEN];
    rand::thread_rng().fill_bytes(&mut token);
    hex::encode(token)
}

/// Session tokens are only persisted hashed
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let encoded = hash_password("Test1234q");
        assert!(encoded.starts_with("pbkdf2_sha256$260000$"));
        assert_eq!(encoded.split('$').count(), 4);
        assert!(verify_password("Test1234q", &encoded));
        assert!(!verify_password("test1234q", &encoded));
    }

    #[test]
    fn test_iterations_come_from_encoding() {
        let salt = "00ff";
        let encoded = format!("pbkdf2_sha256$1000${}${}", salt, derive("pw", salt, 1000));
        assert!(verify_password("pw", &encoded));

        let wrong_rounds = format!("pbkdf2_sha256$999${}${}", salt, derive("pw", salt, 1000));
        assert!(!verify_password("pw", &wrong_rounds));
    }

    #[test]
    fn test_salt_is_random() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn test_malformed_encoding() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "md5$1$salt$digest"));
        assert!(!verify_password("x", "pbkdf2_sha256$salt$digest"));
        assert!(!verify_password("x", "pbkdf2_sha256$0$salt$digest"));
        assert!(!verify_password("x", "pbkdf2_sha256$many$salt$digest"));
    }

    #[test]
    fn test_unknown_user_never_verifies() {
        assert!(!verify_unknown_user(""));
        assert!(!verify_unknown_user("Test1234q"));
    }

    #[test]
    fn test_tokens() {
        let token = new_session_token();
        assert_eq!(token.len(), TOKEN_LEN * 2);
        assert_ne!(token, new_session_token());
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }
}
