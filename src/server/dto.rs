use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Repo;

#[derive(Debug, Deserialize)]
pub struct CreateSpaceRequest {
    pub path_name: String,
    /// Absent for a top-level space.
    #[serde(default)]
    pub parent_id: Option<i64>,
    /// Display name; defaults to `path_name`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateRepoRequest {
    pub space_id: i64,
    pub path_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub default_branch: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RepoResponse {
    #[serde(flatten)]
    pub repo: Repo,
    pub git_path: String,
}

impl From<Repo> for RepoResponse {
    fn from(repo: Repo) -> Self {
        let git_path = format!("/git/{}.git", repo.path);
        Self { repo, git_path }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePrincipalRequest {
    pub uid: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreatePrincipalTokenRequest {
    #[serde(default)]
    pub expires_in_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SpaceGrantRequest {
    pub space_id: i64,
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SpaceGrantResponse {
    pub space_id: i64,
    pub allow: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deny: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub id: String,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct CreateTokenResponse {
    pub token: String,
    pub metadata: TokenResponse,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    #[serde(default)]
    pub cursor: Option<String>,
}
