//! Endpoints called by the hook processes git spawns, authenticated with the
//! server's hook secret instead of a principal token.

mod hooks;

use std::sync::Arc;

use axum::{Router, routing::post};

use crate::server::AppState;

pub fn internal_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/hooks/authorize", post(hooks::authorize_ref))
        .route("/hooks/post-receive", post(hooks::post_receive))
}
