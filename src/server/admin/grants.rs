use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::auth::RequireAdmin;
use crate::error::Error;
use crate::guard::Hierarchy;
use crate::server::AppState;
use crate::server::dto::{SpaceGrantRequest, SpaceGrantResponse};
use crate::server::response::{ApiError, ApiResponse};
use crate::types::{Permission, SpaceGrant};

// Path parameter names match the route: /principals/{id}/...

fn parse_permissions(perms: &[String]) -> Result<Permission, ApiError> {
    let mut result = Permission::default();
    for p in perms {
        let parsed = Permission::parse(p).ok_or_else(|| Error::InvalidPermission(p.clone()))?;
        result = result.union(parsed);
    }
    Ok(result)
}

fn list_responses(state: &AppState, principal_id: &str) -> Result<Vec<SpaceGrantResponse>, ApiError> {
    let grants = state.store.list_principal_space_grants(principal_id)?;

    Ok(grants
        .into_iter()
        .map(|g| SpaceGrantResponse {
            space_id: g.space_id,
            allow: g.allow_bits.to_strings(),
            deny: g.deny_bits.to_strings(),
        })
        .collect())
}

pub async fn upsert_space_grant(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(principal_id): Path<String>,
    Json(req): Json<SpaceGrantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = state
        .store
        .get_principal(&principal_id)?
        .ok_or(Error::NotFound("principal"))?;

    let space = Hierarchy::new(state.store.as_ref()).space(req.space_id)?;

    let allow_bits = parse_permissions(&req.allow)?;
    let deny_bits = parse_permissions(&req.deny)?;

    if allow_bits.is_empty() && deny_bits.is_empty() {
        return Err(ApiError::bad_request(
            "A grant must allow or deny at least one permission",
        ));
    }

    let now = Utc::now();
    let grant = SpaceGrant {
        principal_id: principal.id.clone(),
        space_id: space.id,
        allow_bits,
        deny_bits,
        created_at: now,
        updated_at: now,
    };

    state.store.upsert_space_grant(&grant)?;

    tracing::info!(
        "Granted {} on {}: allow {allow_bits}, deny {deny_bits}",
        principal.uid,
        space.path
    );

    Ok(Json(ApiResponse::success(list_responses(&state, &principal.id)?)))
}

pub async fn list_space_grants(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(principal_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = state
        .store
        .get_principal(&principal_id)?
        .ok_or(Error::NotFound("principal"))?;

    Ok(Json(ApiResponse::success(list_responses(&state, &principal.id)?)))
}

pub async fn delete_space_grant(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path((principal_id, space_id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.store.delete_space_grant(&principal_id, space_id)? {
        return Err(ApiError::not_found("Grant not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
