mod grants;
mod principals;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::server::AppState;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        // Principal routes
        .route("/principals", post(principals::create_principal))
        .route("/principals", get(principals::list_principals))
        .route("/principals/{id}", get(principals::get_principal))
        .route(
            "/principals/{id}/tokens",
            post(principals::create_principal_token),
        )
        // Space grant routes
        .route(
            "/principals/{id}/space-grants",
            post(grants::upsert_space_grant),
        )
        .route(
            "/principals/{id}/space-grants",
            get(grants::list_space_grants),
        )
        .route(
            "/principals/{id}/space-grants/{space_id}",
            delete(grants::delete_space_grant),
        )
}
