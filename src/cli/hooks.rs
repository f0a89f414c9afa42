//! Entry point for `gatehouse hooks <name>`, run by git inside a push.
//!
//! stderr is relayed to the pushing client, so it carries only the messages
//! meant for them. Diagnostics are logged only when `GATEHOUSE_HOOK_LOG`
//! holds a filter such as `gatehouse=debug`.

use std::io::{BufReader, Write};

use tracing_subscriber::EnvFilter;

use crate::config::HookConfig;
use crate::error::Result;
use crate::hooks::{Dispatcher, ENV_HOOK_LOG, HookContext, HookOutcome, RemoteAuthorizer};

#[derive(Debug, Clone)]
pub enum HookKind {
    PreReceive,
    Update(Vec<String>),
    PostReceive,
}

impl HookKind {
    /// Outcome when the hook cannot run at all. Nothing can be undone after
    /// post-receive, so it only acknowledges.
    fn failed(&self, message: String) -> HookOutcome {
        match self {
            HookKind::PostReceive => {
                tracing::warn!("{message}");
                HookOutcome::Acknowledge
            }
            _ => HookOutcome::reject(message),
        }
    }
}

pub fn init_logging() {
    let Ok(filter) = std::env::var(ENV_HOOK_LOG) else {
        return;
    };
    let filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("gatehouse=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

/// Runs the hook and returns its exit code. Interrupting the hook cancels
/// any request in flight and rejects the push.
pub async fn run(kind: HookKind) -> u8 {
    let outcome = tokio::select! {
        outcome = dispatch(kind.clone()) => outcome,
        _ = tokio::signal::ctrl_c() => kind.failed("push interrupted".to_string()),
    };

    let mut stderr = std::io::stderr().lock();
    for message in outcome.messages() {
        let _ = writeln!(stderr, "gatehouse: {message}");
    }
    let _ = stderr.flush();

    outcome.exit_code()
}

async fn dispatch(kind: HookKind) -> HookOutcome {
    let dispatcher = match build_dispatcher() {
        Ok(dispatcher) => dispatcher,
        Err(e) => return kind.failed(format!("push rejected: {e}")),
    };

    match kind {
        HookKind::PreReceive => dispatcher.pre_receive(BufReader::new(std::io::stdin())).await,
        HookKind::Update(args) => dispatcher.update(&args).await,
        HookKind::PostReceive => dispatcher.post_receive(BufReader::new(std::io::stdin())).await,
    }
}

fn build_dispatcher() -> Result<Dispatcher<RemoteAuthorizer>> {
    let context = HookContext::from_env()?;
    let config_path = HookConfig::locate();
    let config = HookConfig::load(&config_path)?;
    tracing::debug!(
        "Hook for repo {} using {}",
        context.repo_id,
        config_path.display()
    );

    let authorizer = RemoteAuthorizer::new(&config)?;
    Ok(Dispatcher::new(authorizer, context, config.timeout()))
}
