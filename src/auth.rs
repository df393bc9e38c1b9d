use sha2::{Digest, Sha256};
use uuid::Uuid;

const SCHEME: &str = "sha256";
pub const DEFAULT_ROUNDS: u32 = 1_000;

/// Salted, iterated SHA-256: `sha256$<rounds>$<salt>$<hex digest>`.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    hash_password_with(password, &salt, DEFAULT_ROUNDS)
}

pub fn hash_password_with(password: &str, salt: &str, rounds: u32) -> String {
    format!("{}${}${}${}", SCHEME, rounds, salt, derive(password, salt, rounds))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(rounds), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != SCHEME || salt.is_empty() {
        return false;
    }
    let Ok(rounds) = rounds.parse::<u32>() else {
        return false;
    };
    if rounds == 0 {
        return false;
    }
    constant_time_eq(derive(password, salt, rounds).as_bytes(), expected.as_bytes())
}

/// Lowercase hex of SHA-256 over `salt || password`, re-hashed with the salt `rounds - 1` times.
fn derive(password: &str, salt: &str, rounds: u32) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..rounds {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(salt.as_bytes())
            .finalize();
    }
    format!("{:x}", digest)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Opaque admin session token.
pub fn new_session_token() -> String {
    Uuid::new_v4().simple().to_string()
}
