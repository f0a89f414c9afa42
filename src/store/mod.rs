mod schema;
mod sqlite;

pub use sqlite::SqliteStore;
#[cfg(test)]
pub(crate) use sqlite::tests;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Principal operations
    fn create_principal(&self, principal: &Principal) -> Result<()>;
    fn get_principal(&self, id: &str) -> Result<Option<Principal>>;
    fn get_principal_by_uid(&self, uid: &str) -> Result<Option<Principal>>;
    fn list_principals(&self, cursor: &str, limit: i32) -> Result<Vec<Principal>>;

    // Token operations
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>>;
    fn update_token_last_used(&self, id: &str) -> Result<()>;

    // Space operations. `create_space` assigns the id and fails with
    // `Error::Conflict` when the path is already taken.
    fn create_space(&self, space: &mut Space) -> Result<()>;
    fn get_space(&self, id: i64) -> Result<Option<Space>>;
    fn get_space_by_path(&self, path: &str) -> Result<Option<Space>>;

    // Repo operations
    fn create_repo(&self, repo: &mut Repo) -> Result<()>;
    fn get_repo(&self, id: i64) -> Result<Option<Repo>>;
    fn get_repo_by_path(&self, path: &str) -> Result<Option<Repo>>;
    fn update_repo_last_push(&self, id: i64) -> Result<()>;

    // Space grant operations
    fn upsert_space_grant(&self, grant: &SpaceGrant) -> Result<()>;
    fn get_space_grant(&self, principal_id: &str, space_id: i64) -> Result<Option<SpaceGrant>>;
    fn list_principal_space_grants(&self, principal_id: &str) -> Result<Vec<SpaceGrant>>;
    fn delete_space_grant(&self, principal_id: &str, space_id: i64) -> Result<bool>;

    // Admin token check
    fn has_admin_token(&self) -> Result<bool>;
}
