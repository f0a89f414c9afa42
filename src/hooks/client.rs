use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::api::{
    AUTHORIZE_PATH, AuthorizeRefRequest, Decision, HOOK_SECRET_HEADER, POST_RECEIVE_PATH,
    PostReceiveRequest, PostReceiveResponse,
};
use super::dispatcher::PushAuthorizer;
use crate::config::HookConfig;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: Option<T>,
    error: Option<String>,
}

/// Authorizes ref updates by calling the server's internal hook API.
#[derive(Clone)]
pub struct RemoteAuthorizer {
    client: Client,
    base_url: String,
    secret: String,
}

impl RemoteAuthorizer {
    pub fn new(config: &HookConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            secret: config.secret.clone(),
        })
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .header(HOOK_SECRET_HEADER, &self.secret)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::BackendUnavailable(format!("request to {url} failed: {e}")))?;

        let status = resp.status();
        let api_resp: ApiResponse<T> = match resp.json().await {
            Ok(api_resp) => api_resp,
            Err(e) if status.is_success() => {
                return Err(Error::BackendUnavailable(format!(
                    "invalid response from {url}: {e}"
                )));
            }
            Err(_) => ApiResponse {
                data: None,
                error: None,
            },
        };

        if status.is_success() {
            return api_resp
                .data
                .ok_or_else(|| Error::BackendUnavailable(format!("empty response from {url}")));
        }

        let detail = api_resp
            .error
            .unwrap_or_else(|| "Server error (no details provided)".into());
        Err(match status {
            StatusCode::NOT_FOUND => Error::NotFound("repository"),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Error::BackendUnavailable(format!("hook secret rejected: {detail}"))
            }
            _ => Error::BackendUnavailable(format!("{status}: {detail}")),
        })
    }
}

impl PushAuthorizer for RemoteAuthorizer {
    async fn authorize(&self, request: &AuthorizeRefRequest) -> Result<Decision> {
        self.post(AUTHORIZE_PATH, request).await
    }

    async fn notify_pushed(&self, request: &PostReceiveRequest) -> Result<()> {
        let response: PostReceiveResponse = self.post(POST_RECEIVE_PATH, request).await?;
        tracing::debug!("Server recorded {} ref(s)", response.recorded);
        Ok(())
    }
}
