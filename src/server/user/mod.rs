mod repos;
mod spaces;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::server::AppState;

pub fn user_router() -> Router<Arc<AppState>> {
    Router::new()
        // Spaces
        .route("/spaces", post(spaces::create_space))
        .route("/spaces/{*space_ref}", get(spaces::get_space))
        // Repos
        .route("/repos", post(repos::create_repo))
        .route("/repos/{*repo_ref}", get(repos::get_repo))
}
