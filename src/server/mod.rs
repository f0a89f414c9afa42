mod admin;
pub mod dto;
mod git;
mod internal;
pub mod response;
mod router;
pub mod user;
pub mod validation;

pub use admin::admin_router;
pub use git::git_router;
pub use internal::internal_router;
pub use router::{AppState, create_router};
pub use user::user_router;
