//! Wire types shared by the hook client and the internal hook endpoints.

use serde::{Deserialize, Serialize};

use super::refs::UpdatedRef;

/// Header carrying the server's hook secret on internal requests.
pub const HOOK_SECRET_HEADER: &str = "x-gatehouse-hook-secret";

pub const AUTHORIZE_PATH: &str = "/api/v1/internal/hooks/authorize";
pub const POST_RECEIVE_PATH: &str = "/api/v1/internal/hooks/post-receive";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeRefRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    pub repo_id: i64,
    #[serde(rename = "ref")]
    pub updated_ref: UpdatedRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    AuthenticationRequired,
    PermissionDenied,
    InvalidRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny { reason: DenyReason, message: String },
}

impl Decision {
    pub fn deny(reason: DenyReason, message: impl Into<String>) -> Self {
        Decision::Deny {
            reason,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostReceiveRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    pub repo_id: i64,
    pub refs: Vec<UpdatedRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostReceiveResponse {
    pub recorded: usize,
}
