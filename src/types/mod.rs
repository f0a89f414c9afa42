mod access;
mod models;
mod permission;

pub use access::{Actor, Resource, ResourceType, Scope};
pub use models::{Principal, Repo, Space, SpaceGrant, Token};
pub use permission::Permission;
