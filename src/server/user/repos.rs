use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{info, warn};

use crate::auth::Authenticated;
use crate::guard::Hierarchy;
use crate::paths;
use crate::server::AppState;
use crate::server::dto::{CreateRepoRequest, RepoResponse};
use crate::server::git::ensure_repository;
use crate::server::response::{ApiError, ApiResponse};
use crate::server::validation::{validate_path, validate_repo};
use crate::types::{Permission, Repo, Resource};

const DEFAULT_BRANCH: &str = "main";

pub async fn create_repo(
    Authenticated(actor): Authenticated,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRepoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (space, scope) = Hierarchy::new(state.store.as_ref()).parent_scope(req.space_id)?;
    state
        .guard
        .enforce(&actor, &scope, &Resource::repo(""), Permission::REPO_CREATE)?;
    let principal = actor.require()?;

    let path_name = req.path_name.to_lowercase();
    let now = Utc::now();
    let mut repo = Repo {
        id: 0,
        space_id: space.id,
        path: paths::concatenate(&space.path, &path_name),
        path_name,
        description: req.description,
        is_public: req.is_public,
        default_branch: req
            .default_branch
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
        created_by: principal.id.clone(),
        created_at: now,
        updated_at: now,
        last_push_at: None,
    };

    validate_repo(&repo)?;
    validate_path(&repo.path, false)?;

    state.store.create_repo(&mut repo)?;

    info!("{} created repository {} ({})", principal.uid, repo.path, repo.id);

    // The transport retries on first access, so a failure here is not fatal.
    if let Err(e) = ensure_repository(&state, &repo).await {
        warn!("Failed to initialize repository {} on disk: {e}", repo.path);
    }

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(RepoResponse::from(repo))),
    ))
}

pub async fn get_repo(
    Authenticated(actor): Authenticated,
    State(state): State<Arc<AppState>>,
    Path(repo_ref): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let repo_ref = paths::normalize_ref(&repo_ref);
    let (_, repo_name) = paths::disect_leaf(&repo_ref)?;

    let hierarchy = Hierarchy::new(state.store.as_ref());
    let repo = hierarchy.repo_by_path(&repo_ref)?;
    let scope = hierarchy.owning_scope(&repo)?;

    state
        .guard
        .enforce(&actor, &scope, &Resource::repo(repo_name), Permission::REPO_VIEW)?;

    Ok(Json(ApiResponse::success(RepoResponse::from(repo))))
}
