//! Turns one git hook invocation into authorization calls and an exit status.

use std::future::Future;
use std::io::BufRead;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::api::{AuthorizeRefRequest, Decision, PostReceiveRequest};
use super::refs::{UpdatedRef, parse_update_args, parse_updated_refs};
use super::{ENV_PRINCIPAL_ID, ENV_REPO_ID};
use crate::error::{Error, Result};

/// Remote side of the hook: decides on single ref updates and records pushes.
pub trait PushAuthorizer: Send + Sync {
    fn authorize(
        &self,
        request: &AuthorizeRefRequest,
    ) -> impl Future<Output = Result<Decision>> + Send;

    fn notify_pushed(&self, request: &PostReceiveRequest) -> impl Future<Output = Result<()>> + Send;
}

/// Who is pushing to which repository, as set by the git transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookContext {
    pub principal_id: Option<String>,
    pub repo_id: i64,
}

impl HookContext {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(
            std::env::var(ENV_PRINCIPAL_ID).ok(),
            std::env::var(ENV_REPO_ID).ok(),
        )
    }

    pub fn from_vars(principal_id: Option<String>, repo_id: Option<String>) -> Result<Self> {
        let repo_id = repo_id
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Config(format!("{ENV_REPO_ID} is not set")))?;
        let repo_id = repo_id
            .parse::<i64>()
            .map_err(|_| Error::Config(format!("{ENV_REPO_ID} is not a repository id: {repo_id}")))?;

        Ok(Self {
            principal_id: principal_id.filter(|v| !v.is_empty()),
            repo_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Accept,
    Acknowledge,
    Reject(Vec<String>),
}

impl HookOutcome {
    pub fn reject(message: impl Into<String>) -> Self {
        HookOutcome::Reject(vec![message.into()])
    }

    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            HookOutcome::Accept | HookOutcome::Acknowledge => 0,
            HookOutcome::Reject(_) => 1,
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[String] {
        match self {
            HookOutcome::Reject(messages) => messages,
            _ => &[],
        }
    }
}

pub struct Dispatcher<A> {
    authorizer: A,
    context: HookContext,
    timeout: Duration,
}

impl<A: PushAuthorizer> Dispatcher<A> {
    pub fn new(authorizer: A, context: HookContext, timeout: Duration) -> Self {
        Self {
            authorizer,
            context,
            timeout,
        }
    }

    /// Accepts the push only if every ref is allowed. Denials are collected
    /// for all refs so the client sees each reason at once.
    pub async fn pre_receive<R: BufRead + Send + 'static>(&self, input: R) -> HookOutcome {
        let refs = match read_refs(input).await {
            Ok(refs) => refs,
            Err(e) => return HookOutcome::reject(format!("push rejected: {e}")),
        };

        debug!(
            "pre-receive for repo {} with {} ref(s)",
            self.context.repo_id,
            refs.len()
        );

        let mut denials = Vec::new();
        for updated_ref in &refs {
            if let Err(message) = self.authorize_ref(updated_ref).await {
                denials.push(message);
            }
        }

        if denials.is_empty() {
            HookOutcome::Accept
        } else {
            HookOutcome::Reject(denials)
        }
    }

    /// Decides on a single ref; rejection only affects that ref.
    pub async fn update<S: AsRef<str>>(&self, args: &[S]) -> HookOutcome {
        let updated_ref = match parse_update_args(args) {
            Ok(updated_ref) => updated_ref,
            Err(e) => return HookOutcome::reject(format!("ref rejected: {e}")),
        };

        match self.authorize_ref(&updated_ref).await {
            Ok(()) => HookOutcome::Accept,
            Err(message) => HookOutcome::reject(message),
        }
    }

    /// Reports the pushed refs. The push already happened, so failures are
    /// only logged.
    pub async fn post_receive<R: BufRead + Send + 'static>(&self, input: R) -> HookOutcome {
        let refs = match read_refs(input).await {
            Ok(refs) => refs,
            Err(e) => {
                warn!("post-receive for repo {}: {e}", self.context.repo_id);
                return HookOutcome::Acknowledge;
            }
        };

        let request = PostReceiveRequest {
            principal_id: self.context.principal_id.clone(),
            repo_id: self.context.repo_id,
            refs,
        };

        match self
            .bounded(self.authorizer.notify_pushed(&request))
            .await
        {
            Ok(()) => info!(
                "Reported {} ref(s) pushed to repo {}",
                request.refs.len(),
                request.repo_id
            ),
            Err(e) => warn!(
                "Failed to report push to repo {}: {e}",
                request.repo_id
            ),
        }

        HookOutcome::Acknowledge
    }

    async fn authorize_ref(&self, updated_ref: &UpdatedRef) -> std::result::Result<(), String> {
        let request = AuthorizeRefRequest {
            principal_id: self.context.principal_id.clone(),
            repo_id: self.context.repo_id,
            updated_ref: updated_ref.clone(),
        };

        match self.bounded(self.authorizer.authorize(&request)).await {
            Ok(Decision::Allow) => {
                debug!("Allowed {}", updated_ref.ref_name);
                Ok(())
            }
            Ok(Decision::Deny { reason, message }) => {
                debug!("Denied {} ({reason:?})", updated_ref.ref_name);
                Err(format!("{}: {message}", updated_ref.ref_name))
            }
            Err(e) => {
                warn!("Authorization of {} failed: {e}", updated_ref.ref_name);
                Err(format!("{}: {}", updated_ref.ref_name, client_message(&e)))
            }
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                Error::BackendUnavailable(format!(
                    "no answer within {}s",
                    self.timeout.as_secs_f32()
                ))
            })?
    }
}

async fn read_refs<R: BufRead + Send + 'static>(input: R) -> Result<Vec<UpdatedRef>> {
    tokio::task::spawn_blocking(move || parse_updated_refs(input))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

/// Message shown to the pushing client. Internal details stay in the log.
fn client_message(error: &Error) -> &'static str {
    match error {
        Error::AuthenticationRequired => "authentication required",
        Error::PermissionDenied => "permission denied",
        Error::NotFound(_) => "repository not found",
        Error::BackendUnavailable(_) | Error::Database(_) | Error::Io(_) => {
            "authorization service unavailable"
        }
        _ => "authorization failed",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::hooks::api::DenyReason;

    const OLD: &str = "0000000000000000000000000000000000000000";
    const NEW: &str = "1234567890abcdef1234567890abcdef12345678";

    #[derive(Default)]
    struct FakeAuthorizer {
        denied: HashMap<String, DenyReason>,
        failing: Vec<String>,
        stall: bool,
        fail_notify: bool,
        calls: AtomicUsize,
        notified: Mutex<Vec<PostReceiveRequest>>,
    }

    impl PushAuthorizer for FakeAuthorizer {
        async fn authorize(&self, request: &AuthorizeRefRequest) -> Result<Decision> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.stall {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            let name = &request.updated_ref.ref_name;
            if self.failing.contains(name) {
                return Err(Error::BackendUnavailable("connection refused".to_string()));
            }
            Ok(match self.denied.get(name) {
                Some(reason) => Decision::deny(*reason, "not allowed"),
                None => Decision::Allow,
            })
        }

        async fn notify_pushed(&self, request: &PostReceiveRequest) -> Result<()> {
            if self.fail_notify {
                return Err(Error::BackendUnavailable("connection refused".to_string()));
            }
            self.notified.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    fn dispatcher(authorizer: FakeAuthorizer) -> Dispatcher<FakeAuthorizer> {
        let context = HookContext {
            principal_id: Some("p1".to_string()),
            repo_id: 7,
        };
        Dispatcher::new(authorizer, context, Duration::from_secs(5))
    }

    fn input(refs: &[&str]) -> Cursor<Vec<u8>> {
        let text: String = refs.iter().map(|r| format!("{OLD} {NEW} {r}\n")).collect();
        Cursor::new(text.into_bytes())
    }

    #[tokio::test]
    async fn test_pre_receive_accepts_when_all_allowed() {
        let d = dispatcher(FakeAuthorizer::default());
        let outcome = d.pre_receive(input(&["refs/heads/main", "refs/tags/v1"])).await;
        assert_eq!(outcome, HookOutcome::Accept);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(d.authorizer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_pre_receive_rejects_whole_push_on_one_denial() {
        let mut authorizer = FakeAuthorizer::default();
        authorizer
            .denied
            .insert("refs/heads/protected".to_string(), DenyReason::PermissionDenied);
        let d = dispatcher(authorizer);

        let outcome = d
            .pre_receive(input(&["refs/heads/main", "refs/heads/protected", "refs/heads/dev"]))
            .await;

        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(outcome.messages().len(), 1);
        assert!(outcome.messages()[0].starts_with("refs/heads/protected:"));
        assert_eq!(d.authorizer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_pre_receive_backend_error_denies() {
        let authorizer = FakeAuthorizer {
            failing: vec!["refs/heads/main".to_string()],
            ..Default::default()
        };
        let d = dispatcher(authorizer);
        let outcome = d.pre_receive(input(&["refs/heads/main"])).await;
        assert_eq!(
            outcome.messages(),
            ["refs/heads/main: authorization service unavailable".to_string()]
        );
    }

    #[tokio::test]
    async fn test_pre_receive_parse_failure_rejects_without_calls() {
        let d = dispatcher(FakeAuthorizer::default());
        let outcome = d
            .pre_receive(Cursor::new(b"only two\n".to_vec()))
            .await;
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(d.authorizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_receive_timeout_denies() {
        let authorizer = FakeAuthorizer {
            stall: true,
            ..Default::default()
        };
        let d = dispatcher(authorizer);
        let outcome = d.pre_receive(input(&["refs/heads/main"])).await;
        assert_eq!(outcome.exit_code(), 1);
        assert!(outcome.messages()[0].contains("unavailable"));
    }

    #[tokio::test]
    async fn test_update_decides_single_ref() {
        let mut authorizer = FakeAuthorizer::default();
        authorizer
            .denied
            .insert("refs/heads/protected".to_string(), DenyReason::PermissionDenied);
        let d = dispatcher(authorizer);

        assert_eq!(
            d.update(&["refs/heads/main", OLD, NEW]).await,
            HookOutcome::Accept
        );
        assert_eq!(d.update(&["refs/heads/protected", OLD, NEW]).await.exit_code(), 1);
        assert_eq!(d.update(&["refs/heads/main"]).await.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_post_receive_reports_refs() {
        let d = dispatcher(FakeAuthorizer::default());
        let outcome = d.post_receive(input(&["refs/heads/main", "refs/heads/dev"])).await;
        assert_eq!(outcome, HookOutcome::Acknowledge);

        let notified = d.authorizer.notified.lock().unwrap();
        assert_eq!(notified.len(), 1);
        assert_eq!(notified[0].repo_id, 7);
        assert_eq!(notified[0].refs.len(), 2);
    }

    #[tokio::test]
    async fn test_post_receive_always_acknowledges() {
        let authorizer = FakeAuthorizer {
            fail_notify: true,
            ..Default::default()
        };
        let d = dispatcher(authorizer);
        assert_eq!(d.post_receive(input(&["refs/heads/main"])).await.exit_code(), 0);
        assert_eq!(
            d.post_receive(Cursor::new(b"garbage\n".to_vec())).await.exit_code(),
            0
        );
    }

    #[test]
    fn test_context_requires_repo_id() {
        assert!(HookContext::from_vars(Some("p1".to_string()), None).is_err());
        assert!(HookContext::from_vars(None, Some("abc".to_string())).is_err());

        let context = HookContext::from_vars(Some(String::new()), Some("12".to_string())).unwrap();
        assert_eq!(context.principal_id, None);
        assert_eq!(context.repo_id, 12);
    }
}
