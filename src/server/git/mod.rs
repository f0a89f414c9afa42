mod auth;
mod handlers;
mod process;

use std::sync::Arc;

use axum::{Router, routing::get};

use crate::config::HOOK_CONFIG_FILE;
use crate::error::Result;
use crate::server::AppState;
use crate::types::Repo;

/// Smart HTTP transport. Repositories are addressed by their full path,
/// e.g. `/git/team-a/proj/service.git/info/refs`.
pub fn git_router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/{*path}",
        get(handlers::info_refs).post(handlers::service_rpc),
    )
}

/// Creates the bare repository on disk and installs its hooks if either is
/// missing.
pub(crate) async fn ensure_repository(state: &AppState, repo: &Repo) -> Result<()> {
    let path = process::repo_path(&state.data_dir, repo.id);

    if !path.join("HEAD").exists() {
        process::init_bare_repo(&path, &repo.default_branch).await?;
        tracing::info!("Initialized bare repository {} at {}", repo.path, path.display());
    } else if path.join(HOOK_CONFIG_FILE).exists() {
        return Ok(());
    }

    process::install_hooks(&path, &state.hook_binary, &state.hook_config).await
}
