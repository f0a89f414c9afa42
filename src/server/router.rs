use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};

use super::admin::admin_router;
use super::git::git_router;
use super::internal::internal_router;
use super::user::user_router;
use crate::config::HookConfig;
use crate::guard::{GrantPolicy, Guard};
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub guard: Guard,
    pub data_dir: PathBuf,
    /// Written next to every repository so its hooks can call back.
    pub hook_config: HookConfig,
    /// Executable the installed hook scripts run.
    pub hook_binary: PathBuf,
}

impl AppState {
    /// Builds the state with the grant-backed authorization policy.
    pub fn new(
        store: Arc<dyn Store>,
        data_dir: PathBuf,
        hook_config: HookConfig,
        hook_binary: PathBuf,
    ) -> Self {
        let guard = Guard::new(Arc::new(GrantPolicy::new(store.clone())));
        Self {
            store,
            guard,
            data_dir,
            hook_config,
            hook_binary,
        }
    }

    #[must_use]
    pub fn hook_secret(&self) -> &str {
        &self.hook_config.secret
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/admin", admin_router())
        .nest("/api/v1/internal", internal_router())
        .nest("/api/v1", user_router())
        .nest("/git", git_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
