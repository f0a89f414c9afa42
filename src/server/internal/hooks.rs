use std::sync::Arc;

use axum::{Json, extract::State};
use tracing::{debug, info};

use crate::auth::RequireHookSecret;
use crate::error::Error;
use crate::guard::Hierarchy;
use crate::hooks::UpdatedRef;
use crate::hooks::api::{
    AuthorizeRefRequest, Decision, DenyReason, PostReceiveRequest, PostReceiveResponse,
};
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse};
use crate::types::{Actor, Permission, Resource};

const REFS_PREFIX: &str = "refs/";

fn is_valid_ref_name(name: &str) -> bool {
    name.len() > REFS_PREFIX.len()
        && name.starts_with(REFS_PREFIX)
        && !name.contains("..")
        && !name.chars().any(|c| c.is_ascii_control() || c == ' ')
}

fn short_sha(sha: &str) -> &str {
    sha.get(..8).unwrap_or(sha)
}

/// Decides whether the pushing principal may update a single ref.
///
/// Denials are answered with a `Decision`; lookup and backend failures are
/// returned as errors, which the hook treats as a denial.
pub async fn authorize_ref(
    _hook: RequireHookSecret,
    State(state): State<Arc<AppState>>,
    Json(req): Json<AuthorizeRefRequest>,
) -> Result<Json<ApiResponse<Decision>>, ApiError> {
    let updated_ref = &req.updated_ref;

    if !is_valid_ref_name(&updated_ref.ref_name) {
        return Ok(Json(ApiResponse::success(Decision::deny(
            DenyReason::InvalidRef,
            format!("'{}' is not a valid ref name", updated_ref.ref_name.escape_debug()),
        ))));
    }

    let actor = match &req.principal_id {
        None => Actor::Anonymous,
        Some(id) => match state.store.get_principal(id)? {
            Some(principal) => Actor::Identified(principal),
            None => {
                return Ok(Json(ApiResponse::success(Decision::deny(
                    DenyReason::AuthenticationRequired,
                    "unknown principal",
                ))));
            }
        },
    };

    let (repo, scope) = Hierarchy::new(state.store.as_ref()).repo_scope(req.repo_id)?;

    let decision = match state.guard.enforce(
        &actor,
        &scope,
        &Resource::repo(repo.path_name.clone()),
        Permission::REPO_PUSH,
    ) {
        Ok(()) => Decision::Allow,
        Err(Error::AuthenticationRequired) => Decision::deny(
            DenyReason::AuthenticationRequired,
            "authentication required",
        ),
        Err(Error::PermissionDenied) => Decision::deny(
            DenyReason::PermissionDenied,
            format!("{actor} may not push to {}", repo.path),
        ),
        Err(e) => return Err(e.into()),
    };

    debug!(
        "{actor} {} {} in {}: {decision:?}",
        describe(updated_ref),
        updated_ref.ref_name,
        repo.path
    );

    Ok(Json(ApiResponse::success(decision)))
}

/// Records a completed push.
pub async fn post_receive(
    _hook: RequireHookSecret,
    State(state): State<Arc<AppState>>,
    Json(req): Json<PostReceiveRequest>,
) -> Result<Json<ApiResponse<PostReceiveResponse>>, ApiError> {
    let repo = Hierarchy::new(state.store.as_ref()).repo(req.repo_id)?;

    state.store.update_repo_last_push(repo.id)?;

    let pusher = req.principal_id.as_deref().unwrap_or("anonymous");
    for updated_ref in &req.refs {
        info!(
            "{pusher} pushed {}: {} {} -> {}",
            repo.path,
            updated_ref.ref_name,
            short_sha(&updated_ref.old_sha),
            short_sha(&updated_ref.new_sha)
        );
    }

    Ok(Json(ApiResponse::success(PostReceiveResponse {
        recorded: req.refs.len(),
    })))
}

fn describe(updated_ref: &UpdatedRef) -> &'static str {
    if updated_ref.is_create() {
        "creates"
    } else if updated_ref.is_delete() {
        "deletes"
    } else {
        "updates"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_names() {
        assert!(is_valid_ref_name("refs/heads/main"));
        assert!(is_valid_ref_name("refs/tags/v1.0"));
        assert!(!is_valid_ref_name("refs/"));
        assert!(!is_valid_ref_name("heads/main"));
        assert!(!is_valid_ref_name("refs/heads/a..b"));
        assert!(!is_valid_ref_name("refs/heads/main\r"));
    }

    #[test]
    fn test_short_sha() {
        assert_eq!(short_sha("1234567890abcdef"), "12345678");
        assert_eq!(short_sha("abc"), "abc");
    }
}
