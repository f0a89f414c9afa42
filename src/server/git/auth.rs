use axum::http::{HeaderMap, StatusCode};

use crate::auth::{TokenValidationError, extract_token_from_header, validate_token};
use crate::error::Error;
use crate::guard::Hierarchy;
use crate::paths;
use crate::server::AppState;
use crate::types::{Actor, Permission, Repo, Resource};

#[derive(Debug)]
pub enum GitAuthError {
    InvalidCredentials,
    TokenExpired,
    AdminTokenNotAllowed,
    AuthRequired,
    RepoNotFound,
    PermissionDenied,
    InternalError,
    InvalidRepoPath,
}

impl GitAuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::TokenExpired | Self::AuthRequired => {
                StatusCode::UNAUTHORIZED
            }
            Self::AdminTokenNotAllowed | Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::RepoNotFound => StatusCode::NOT_FOUND,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRepoPath => StatusCode::BAD_REQUEST,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Invalid credentials",
            Self::TokenExpired => "Token expired",
            Self::AdminTokenNotAllowed => "Admin token cannot be used for git operations",
            Self::AuthRequired => "Authentication required",
            Self::RepoNotFound => "Repository not found",
            Self::PermissionDenied => "Permission denied",
            Self::InternalError => "Internal server error",
            Self::InvalidRepoPath => "Invalid repository path",
        }
    }

    pub fn requires_auth_header(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials | Self::TokenExpired | Self::AuthRequired
        )
    }
}

impl From<Error> for GitAuthError {
    fn from(e: Error) -> Self {
        match e {
            Error::AuthenticationRequired => Self::AuthRequired,
            Error::PermissionDenied => Self::PermissionDenied,
            Error::NotFound(_) => Self::RepoNotFound,
            Error::Validation(_) => Self::InvalidRepoPath,
            other => {
                tracing::error!("Git authorization failed: {other}");
                Self::InternalError
            }
        }
    }
}

pub fn extract_git_actor(headers: &HeaderMap, state: &AppState) -> Result<Actor, GitAuthError> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let raw_token = match extract_token_from_header(auth_header) {
        Ok(Some(token)) => token,
        Ok(None) => return Ok(Actor::Anonymous),
        Err(_) => return Err(GitAuthError::InvalidCredentials),
    };

    let validated = validate_token(state.store.as_ref(), &raw_token).map_err(|e| match e {
        TokenValidationError::InvalidScheme | TokenValidationError::InvalidToken => {
            GitAuthError::InvalidCredentials
        }
        TokenValidationError::TokenExpired => GitAuthError::TokenExpired,
        TokenValidationError::InternalError => GitAuthError::InternalError,
    })?;

    validated
        .principal
        .map(Actor::Identified)
        .ok_or(GitAuthError::AdminTokenNotAllowed)
}

/// Resolves `repo_ref` (`space/.../repo`) and checks that `actor` may read
/// from it, or push to it when `is_write` is set.
pub fn authorize_git_access(
    state: &AppState,
    actor: &Actor,
    repo_ref: &str,
    is_write: bool,
) -> Result<Repo, GitAuthError> {
    let repo_ref = paths::normalize_ref(repo_ref);
    let (_, repo_name) = paths::disect_leaf(&repo_ref)?;

    let hierarchy = Hierarchy::new(state.store.as_ref());
    let repo = hierarchy.repo_by_path(&repo_ref)?;
    let scope = hierarchy.owning_scope(&repo)?;

    let permission = if is_write {
        Permission::REPO_PUSH
    } else {
        Permission::REPO_VIEW
    };

    match state
        .guard
        .enforce(actor, &scope, &Resource::repo(repo_name), permission)
    {
        Ok(()) => Ok(repo),
        // Do not reveal private repositories to callers who cannot view them.
        Err(Error::PermissionDenied) if !is_write => Err(GitAuthError::RepoNotFound),
        Err(e) => Err(e.into()),
    }
}
