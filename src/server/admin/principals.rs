use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::auth::{RequireAdmin, issue_token};
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{
    CreatePrincipalRequest, CreatePrincipalTokenRequest, CreateTokenResponse, PaginationParams,
    TokenResponse,
};
use crate::server::response::{ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, paginate};
use crate::server::validation::validate_path_name;
use crate::types::{Principal, Token};

fn token_to_response(token: Token) -> TokenResponse {
    TokenResponse {
        id: token.id,
        is_admin: token.is_admin,
        principal_id: token.principal_id,
        created_at: token.created_at,
        expires_at: token.expires_at,
    }
}

pub async fn create_principal(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePrincipalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = req.uid.to_lowercase();
    validate_path_name(&uid, "Principal")?;

    let now = Utc::now();
    let principal = Principal {
        id: Uuid::new_v4().to_string(),
        display_name: req.display_name.unwrap_or_else(|| uid.clone()),
        uid,
        created_at: now,
        updated_at: now,
    };

    state.store.create_principal(&principal)?;

    tracing::info!("Created principal {} ({})", principal.uid, principal.id);

    Ok((StatusCode::CREATED, Json(ApiResponse::success(principal))))
}

pub async fn list_principals(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let cursor = params.cursor.as_deref().unwrap_or("");

    let principals = state
        .store
        .list_principals(cursor, DEFAULT_PAGE_SIZE + 1)?;

    let (principals, next_cursor, has_more) =
        paginate(principals, DEFAULT_PAGE_SIZE as usize, |p| p.id.clone());

    Ok(Json(PaginatedResponse::new(principals, next_cursor, has_more)))
}

pub async fn get_principal(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = state
        .store
        .get_principal(&id)?
        .ok_or(Error::NotFound("principal"))?;

    Ok(Json(ApiResponse::success(principal)))
}

pub async fn create_principal_token(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreatePrincipalTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = state
        .store
        .get_principal(&id)?
        .ok_or(Error::NotFound("principal"))?;

    if let Some(seconds) = req.expires_in_seconds {
        if seconds < 0 {
            return Err(ApiError::bad_request(
                "expires_in_seconds cannot be negative",
            ));
        }
    }

    let expires_at = match req.expires_in_seconds {
        Some(seconds) => Some(
            Duration::try_seconds(seconds)
                .and_then(|ttl| Utc::now().checked_add_signed(ttl))
                .ok_or_else(|| ApiError::bad_request("expires_in_seconds is too large"))?,
        ),
        None => None,
    };

    let (token, raw_token) = issue_token(state.store.as_ref(), Some(principal.id), expires_at)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(CreateTokenResponse {
            token: raw_token,
            metadata: token_to_response(token),
        })),
    ))
}
