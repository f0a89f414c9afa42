//! Bearer tokens (`gatehouse_<lookup>_<secret>`) and the hook secret.
//!
//! The lookup part is stored in clear to find the row; only an Argon2id hash
//! of the whole token is kept.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::RngCore;

use crate::error::{Error, Result};

const ARGON2_MEMORY_KIB: u32 = 64 * 1024;
const ARGON2_ITERATIONS: u32 = 1;
const ARGON2_PARALLELISM: u32 = 4;
const ARGON2_OUTPUT_LEN: usize = 32;

const TOKEN_PREFIX: &str = "gatehouse";
const LOOKUP_LEN: usize = 8;
const SECRET_BYTES: usize = 12;
const HOOK_SECRET_BYTES: usize = 32;

/// A freshly generated token. `raw` is shown once and never stored.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub raw: String,
    pub lookup: String,
    pub hash: String,
}

pub struct TokenGenerator {
    argon2: Argon2<'static>,
}

impl TokenGenerator {
    pub fn new() -> Result<Self> {
        let params = Params::new(
            ARGON2_MEMORY_KIB,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(ARGON2_OUTPUT_LEN),
        )
        .map_err(|e| Error::Config(format!("invalid argon2 parameters: {e}")))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn generate(&self) -> Result<IssuedToken> {
        let lookup = random_hex(LOOKUP_LEN / 2);
        let raw = format!("{TOKEN_PREFIX}_{lookup}_{}", random_hex(SECRET_BYTES));
        let hash = self.hash(&raw)?;
        Ok(IssuedToken { raw, lookup, hash })
    }

    fn hash(&self, raw: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(raw.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::Config(format!("failed to hash token: {e}")))
    }

    /// `Ok(false)` for a wrong token; `Err` only when the stored hash is unusable.
    pub fn verify(&self, raw: &str, stored_hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|e| Error::Config(format!("invalid stored token hash: {e}")))?;

        match self.argon2.verify_password(raw.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Config(format!("failed to verify token: {e}"))),
        }
    }
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Checks the token shape and returns its lookup part.
pub fn parse_token(raw: &str) -> Result<&str> {
    let rest = raw
        .strip_prefix(TOKEN_PREFIX)
        .and_then(|r| r.strip_prefix('_'))
        .ok_or(Error::InvalidTokenFormat)?;
    let (lookup, secret) = rest.split_once('_').ok_or(Error::InvalidTokenFormat)?;

    let is_hex = |s: &str| s.bytes().all(|b| b.is_ascii_hexdigit());
    if lookup.len() != LOOKUP_LEN
        || secret.len() != SECRET_BYTES * 2
        || !is_hex(lookup)
        || !is_hex(secret)
    {
        return Err(Error::InvalidTokenFormat);
    }

    Ok(lookup)
}

/// Shared secret hook processes present to the internal API.
#[must_use]
pub fn generate_hook_secret() -> String {
    random_hex(HOOK_SECRET_BYTES)
}

/// Compares two secrets without short-circuiting on the first mismatch.
#[must_use]
pub fn secrets_match(expected: &str, provided: &str) -> bool {
    let (a, b) = (expected.as_bytes(), provided.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
