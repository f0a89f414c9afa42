mod hook;
mod server;

pub use hook::{DEFAULT_TIMEOUT_SECS, ENV_HOOK_CONFIG, HOOK_CONFIG_FILE, HookConfig};
pub use server::ServerConfig;
