//! # Gatehouse
//!
//! A Git server that puts every push through an authorization check.
//! Repositories live in a hierarchy of spaces; permissions granted on a
//! space apply to everything below it.
//!
//! Pushes are checked from inside git itself: each repository carries
//! `pre-receive`, `update` and `post-receive` hooks that run
//! `gatehouse hooks <name>` and ask the server whether each ref update may
//! proceed.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! gatehouse = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::path::PathBuf;
//! use gatehouse::config::HookConfig;
//! use gatehouse::server::{AppState, create_router};
//! use gatehouse::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new(&PathBuf::from("./data/gatehouse.db")).unwrap();
//! store.initialize().unwrap();
//!
//! let hook_config = HookConfig {
//!     server_url: "http://127.0.0.1:8080".into(),
//!     secret: "shared-secret".into(),
//!     timeout_secs: 10,
//! };
//! let state = Arc::new(AppState::new(
//!     Arc::new(store),
//!     PathBuf::from("./data"),
//!     hook_config,
//!     PathBuf::from("/usr/local/bin/gatehouse"),
//! ));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.

pub mod auth;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod guard;
pub mod hooks;
pub mod paths;
pub mod server;
pub mod store;
pub mod types;
