//! Server-side git hooks.
//!
//! git runs `gatehouse hooks <name>` from the scripts installed in every bare
//! repository. The hook parses what git hands it, asks the server to
//! authorize each ref update and exits non-zero to reject the push.

pub mod api;
pub mod client;
pub mod dispatcher;
pub mod refs;

pub use client::RemoteAuthorizer;
pub use dispatcher::{Dispatcher, HookContext, HookOutcome, PushAuthorizer};
pub use refs::{UpdatedRef, parse_update_args, parse_updated_refs};

/// Principal performing the push. Unset for anonymous pushes.
pub const ENV_PRINCIPAL_ID: &str = "GATEHOUSE_PRINCIPAL_ID";
/// Repository receiving the push.
pub const ENV_REPO_ID: &str = "GATEHOUSE_REPO_ID";
/// Enables logging to stderr from hook processes.
pub const ENV_HOOK_LOG: &str = "GATEHOUSE_HOOK_LOG";

/// Hook names git invokes and the scripts installed for them.
pub const HOOK_NAMES: [&str; 3] = ["pre-receive", "update", "post-receive"];
