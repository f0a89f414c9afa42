use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;

use crate::auth::Authenticated;
use crate::guard::Hierarchy;
use crate::paths;
use crate::server::AppState;
use crate::server::dto::CreateSpaceRequest;
use crate::server::response::{ApiError, ApiResponse};
use crate::server::validation::{validate_path, validate_space};
use crate::types::{Permission, Resource, Scope, Space};

/// Creates a space under `parent_id`, or at the top level when it is absent.
///
/// The parent is resolved before authorization so that the check runs against
/// the stored parent path. Validation happens after authorization; the store's
/// unique path constraint is what finally settles concurrent creates.
pub async fn create_space(
    Authenticated(actor): Authenticated,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSpaceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (parent_path, principal) = match req.parent_id {
        None => {
            let principal = state.guard.enforce_top_level_create(&actor)?;
            (String::new(), principal)
        }
        Some(parent_id) => {
            let (parent, scope) = Hierarchy::new(state.store.as_ref()).parent_scope(parent_id)?;
            state
                .guard
                .enforce(&actor, &scope, &Resource::space(), Permission::SPACE_CREATE)?;
            (parent.path, actor.require()?)
        }
    };

    let path_name = req.path_name.to_lowercase();
    let now = Utc::now();
    let mut space = Space {
        id: 0,
        parent_id: req.parent_id,
        path: paths::concatenate(&parent_path, &path_name),
        name: req.name.unwrap_or_else(|| path_name.clone()),
        path_name,
        description: req.description,
        is_public: req.is_public,
        created_by: principal.id.clone(),
        created_at: now,
        updated_at: now,
    };

    validate_space(&space)?;
    validate_path(&space.path, true)?;

    state.store.create_space(&mut space)?;

    info!("{} created space {} ({})", principal.uid, space.path, space.id);

    Ok((StatusCode::CREATED, Json(ApiResponse::success(space))))
}

pub async fn get_space(
    Authenticated(actor): Authenticated,
    State(state): State<Arc<AppState>>,
    Path(space_ref): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let space_ref = paths::normalize_ref(&space_ref);
    let space = Hierarchy::new(state.store.as_ref()).space_by_path(&space_ref)?;

    state.guard.enforce(
        &actor,
        &Scope::new(space.path.clone()),
        &Resource::space(),
        Permission::SPACE_VIEW,
    )?;

    Ok(Json(ApiResponse::success(space)))
}
