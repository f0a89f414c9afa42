use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::helpers::{TokenValidationError, ValidatedToken, extract_token_from_header, validate_token};
use super::token::secrets_match;
use crate::hooks::api::HOOK_SECRET_HEADER;
use crate::server::AppState;
use crate::types::{Actor, Token};

/// The actor behind a request. Requests without credentials are anonymous;
/// requests with bad credentials are rejected.
pub struct Authenticated(pub Actor);

/// Extractor that requires admin authentication
pub struct RequireAdmin(pub Token);

/// Extractor for the internal hook API. Only hook processes know the secret.
pub struct RequireHookSecret;

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    NotAdmin,
    NotPrincipal,
    InvalidHookSecret,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidScheme => (StatusCode::UNAUTHORIZED, "Invalid authorization scheme"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired"),
            AuthError::NotAdmin => (StatusCode::FORBIDDEN, "Admin access required"),
            AuthError::NotPrincipal => (
                StatusCode::FORBIDDEN,
                "Principal token required for this operation",
            ),
            AuthError::InvalidHookSecret => (StatusCode::UNAUTHORIZED, "Invalid hook secret"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "data": null, "error": message });

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                "WWW-Authenticate",
                axum::http::HeaderValue::from_static("Bearer realm=\"gatehouse\""),
            );
        }

        response
    }
}

impl From<TokenValidationError> for AuthError {
    fn from(e: TokenValidationError) -> Self {
        match e {
            TokenValidationError::InvalidScheme => AuthError::InvalidScheme,
            TokenValidationError::InvalidToken => AuthError::InvalidToken,
            TokenValidationError::TokenExpired => AuthError::TokenExpired,
            TokenValidationError::InternalError => AuthError::InternalError,
        }
    }
}

impl FromRequestParts<Arc<AppState>> for Authenticated {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(validated) = extract_and_validate_token(parts, state)? else {
            return Ok(Authenticated(Actor::Anonymous));
        };

        match validated.principal {
            Some(principal) => Ok(Authenticated(Actor::Identified(principal))),
            None => Err(AuthError::NotPrincipal),
        }
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let validated = extract_and_validate_token(parts, state)?.ok_or(AuthError::MissingAuth)?;

        if !validated.token.is_admin {
            return Err(AuthError::NotAdmin);
        }

        Ok(RequireAdmin(validated.token))
    }
}

impl FromRequestParts<Arc<AppState>> for RequireHookSecret {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(HOOK_SECRET_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::InvalidHookSecret)?;

        if !secrets_match(state.hook_secret(), provided) {
            tracing::warn!("Rejected internal hook request with a wrong secret");
            return Err(AuthError::InvalidHookSecret);
        }

        Ok(RequireHookSecret)
    }
}

fn extract_and_validate_token(
    parts: &Parts,
    state: &AppState,
) -> Result<Option<ValidatedToken>, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(raw_token) = extract_token_from_header(auth_header)? else {
        return Ok(None);
    };

    Ok(Some(validate_token(state.store.as_ref(), &raw_token)?))
}
