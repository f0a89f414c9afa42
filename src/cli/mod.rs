mod admin;
mod commands;
pub mod hooks;

pub use admin::{run_grant, run_init, run_principal_add};
pub use commands::{AdminCommands, HookCommands, PrincipalCommands};

use crate::config::ServerConfig;
use crate::store::SqliteStore;

/// Initialize store from data directory, checking it exists
pub fn init_store(data_dir: &str) -> anyhow::Result<SqliteStore> {
    let config = ServerConfig {
        data_dir: data_dir.into(),
        ..ServerConfig::default()
    };
    let db_path = config.db_path();

    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {}. Run 'gatehouse admin init' first.",
            db_path.display()
        );
    }

    SqliteStore::new(&db_path).map_err(Into::into)
}
