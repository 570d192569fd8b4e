//! Password hashing, one-time codes and verification tokens.
//!
//! Passwords and recovery codes are stored as Argon2id PHC strings. Verification
//! tokens are random 32-byte values; only their SHA-256 digest is persisted.
use anyhow::{anyhow, Context, Result};
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Uppercase letters and digits without the easily confused `I`, `O`, `0` and `1`.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Hash a password or one-time code.
///
/// # Errors
/// Returns an error if Argon2 rejects the input.
pub fn hash_secret(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash secret: {err}"))
}

/// Check `secret` against a stored PHC string. Malformed hashes never verify.
#[must_use]
pub fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Random code of `len` characters drawn from [`CODE_ALPHABET`].
#[must_use]
pub fn generate_code(len: usize) -> String {
    generate_code_with_rng(&mut OsRng, len)
}

fn generate_code_with_rng<R: RngCore + ?Sized>(rng: &mut R, len: usize) -> String {
    let mut raw = vec![0u8; len];
    rng.fill_bytes(&mut raw);
    raw.into_iter()
        .filter_map(|byte| {
            CODE_ALPHABET
                .get(usize::from(byte) % CODE_ALPHABET.len())
                .map(|&ch| char::from(ch))
        })
        .collect()
}

/// Create a new verification token for email links.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn generate_verification_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate verification token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Digest stored in place of the raw verification token.
#[must_use]
pub fn hash_verification_token(token: &str) -> String {
    Base64UrlUnpadded::encode_string(&Sha256::digest(token.as_bytes()))
}

#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    EMAIL
        .as_ref()
        .is_some_and(|regex| regex.is_match(email_normalized))
}

/// Usernames, role and right names compare case-insensitively.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
