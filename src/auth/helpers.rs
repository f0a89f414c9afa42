use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{TokenGenerator, parse_token};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Principal, Token};

#[derive(Debug)]
pub enum TokenValidationError {
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    InternalError,
}

pub struct ValidatedToken {
    pub token: Token,
    pub principal: Option<Principal>,
}

/// Extracts a token string from a Basic auth header.
/// Expects format: Basic base64(x-token:actual_token)
pub fn extract_basic_auth_token(header: &str) -> Option<String> {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    let (username, password) = credentials.split_once(':')?;

    if username != "x-token" {
        return None;
    }

    Some(password.to_string())
}

/// Validates a raw token string against the store and resolves the
/// principal it belongs to. Admin tokens carry no principal.
pub fn validate_token(
    store: &dyn Store,
    raw_token: &str,
) -> std::result::Result<ValidatedToken, TokenValidationError> {
    let lookup = parse_token(raw_token).map_err(|_| TokenValidationError::InvalidToken)?;

    let token = store
        .get_token_by_lookup(lookup)
        .map_err(|e| {
            tracing::error!("Token lookup failed: {e}");
            TokenValidationError::InternalError
        })?
        .ok_or(TokenValidationError::InvalidToken)?;

    let generator = TokenGenerator::new().map_err(|_| TokenValidationError::InternalError)?;
    if !generator
        .verify(raw_token, &token.token_hash)
        .map_err(|_| TokenValidationError::InternalError)?
    {
        return Err(TokenValidationError::InvalidToken);
    }

    if let Some(expires_at) = &token.expires_at {
        if expires_at < &Utc::now() {
            return Err(TokenValidationError::TokenExpired);
        }
    }

    let principal = match &token.principal_id {
        Some(principal_id) => Some(
            store
                .get_principal(principal_id)
                .map_err(|_| TokenValidationError::InternalError)?
                .ok_or(TokenValidationError::InvalidToken)?,
        ),
        None => None,
    };

    if let Err(e) = store.update_token_last_used(&token.id) {
        tracing::warn!("Failed to update token last_used_at: {e}");
    }

    Ok(ValidatedToken { token, principal })
}

const MAX_LOOKUP_RETRIES: u32 = 3;

/// Creates and stores a new token, returning it with its raw form, which is
/// never stored. Tokens without a principal are admin tokens.
pub fn issue_token(
    store: &dyn Store,
    principal_id: Option<String>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<(Token, String)> {
    let generator = TokenGenerator::new()?;

    for _ in 0..MAX_LOOKUP_RETRIES {
        let issued = generator.generate()?;
        let token = Token {
            id: Uuid::new_v4().to_string(),
            token_hash: issued.hash,
            token_lookup: issued.lookup,
            is_admin: principal_id.is_none(),
            principal_id: principal_id.clone(),
            created_at: Utc::now(),
            expires_at,
            last_used_at: None,
        };

        match store.create_token(&token) {
            Ok(()) => return Ok((token, issued.raw)),
            Err(Error::TokenLookupCollision) => continue,
            Err(e) => return Err(e),
        }
    }

    Err(Error::TokenLookupCollision)
}

/// Extracts token from Authorization header (Bearer or Basic).
/// Returns None if no auth header is present.
pub fn extract_token_from_header(
    auth_header: Option<&str>,
) -> std::result::Result<Option<String>, TokenValidationError> {
    let Some(header) = auth_header else {
        return Ok(None);
    };

    if let Some(token) = header.strip_prefix("Bearer ") {
        return Ok(Some(token.to_string()));
    }

    if header.starts_with("Basic ") {
        return extract_basic_auth_token(header)
            .ok_or(TokenValidationError::InvalidToken)
            .map(Some);
    }

    Err(TokenValidationError::InvalidScheme)
}
