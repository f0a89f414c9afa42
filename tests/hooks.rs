//! Integration tests for the git hooks.
//!
//! The hook commands run as git would run them: ref updates on stdin or as
//! arguments, context in the environment, and verdicts as exit codes with
//! messages on stderr.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

mod common;

use std::path::Path;
use std::process::Command as StdCommand;

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::{Value, json};

use common::TestServer;

const ZERO: &str = "0000000000000000000000000000000000000000";
const SHA: &str = "1234567890abcdef1234567890abcdef12345678";

struct HookEnv {
    temp_dir: TempDir,
}

impl HookEnv {
    /// A repository directory whose hook config points at `server_url`.
    fn new(server_url: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        temp_dir
            .child("gatehouse-hook.toml")
            .write_str(&format!(
                "server_url = \"{server_url}\"\nsecret = \"s3cret\"\ntimeout_secs = 2\n"
            ))
            .expect("write hook config");
        Self { temp_dir }
    }

    fn git_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    fn hook(&self, name: &str) -> Command {
        let mut cmd = Command::cargo_bin("gatehouse").expect("failed to find binary");
        cmd.args(["hooks", name])
            .env("GIT_DIR", self.git_dir())
            .env("GATEHOUSE_REPO_ID", "1")
            .env("GATEHOUSE_PRINCIPAL_ID", "principal-1")
            .env_remove("GATEHOUSE_HOOK_CONFIG")
            .env_remove("GATEHOUSE_HOOK_LOG");
        cmd
    }
}

/// Nothing listens here, so every authorization attempt fails to connect.
const UNREACHABLE: &str = "http://127.0.0.1:9";

#[test]
fn pre_receive_rejects_malformed_input() {
    let ctx = HookEnv::new(UNREACHABLE);
    ctx.hook("pre-receive")
        .write_stdin(format!("{ZERO} {SHA}\n"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("gatehouse: push rejected: malformed hook input"));
}

#[test]
fn pre_receive_rejects_extra_fields() {
    let ctx = HookEnv::new(UNREACHABLE);
    ctx.hook("pre-receive")
        .write_stdin(format!("{ZERO} {SHA} refs/heads/main extra\n"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("malformed hook input"));
}

#[test]
fn pre_receive_accepts_empty_push() {
    let ctx = HookEnv::new(UNREACHABLE);
    ctx.hook("pre-receive")
        .write_stdin("")
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn pre_receive_rejects_when_server_unreachable() {
    let ctx = HookEnv::new(UNREACHABLE);
    ctx.hook("pre-receive")
        .write_stdin(format!("{ZERO} {SHA} refs/heads/main\n"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "gatehouse: refs/heads/main: authorization service unavailable",
        ));
}

#[test]
fn pre_receive_rejects_without_repo_id() {
    let ctx = HookEnv::new(UNREACHABLE);
    ctx.hook("pre-receive")
        .env_remove("GATEHOUSE_REPO_ID")
        .write_stdin(format!("{ZERO} {SHA} refs/heads/main\n"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("GATEHOUSE_REPO_ID is not set"));
}

#[test]
fn pre_receive_rejects_without_config() {
    let ctx = HookEnv::new(UNREACHABLE);
    ctx.hook("pre-receive")
        .env("GATEHOUSE_HOOK_CONFIG", ctx.git_dir().join("missing.toml"))
        .write_stdin(format!("{ZERO} {SHA} refs/heads/main\n"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("gatehouse: push rejected"));
}

#[test]
fn update_rejects_when_server_unreachable() {
    let ctx = HookEnv::new(UNREACHABLE);
    ctx.hook("update")
        .args(["refs/heads/main", ZERO, SHA])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("refs/heads/main"));
}

#[test]
fn update_requires_three_arguments() {
    let ctx = HookEnv::new(UNREACHABLE);
    ctx.hook("update")
        .args(["refs/heads/main", ZERO])
        .assert()
        .failure();
}

#[test]
fn post_receive_always_succeeds() {
    let ctx = HookEnv::new(UNREACHABLE);
    ctx.hook("post-receive")
        .write_stdin(format!("{ZERO} {SHA} refs/heads/main\n"))
        .assert()
        .success()
        .stderr(predicate::str::is_empty());

    ctx.hook("post-receive")
        .env_remove("GATEHOUSE_REPO_ID")
        .write_stdin("garbage\n")
        .assert()
        .success();
}

fn git(dir: &Path, args: &[&str]) -> std::process::Output {
    StdCommand::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .output()
        .expect("run git")
}

#[tokio::test(flavor = "multi_thread")]
async fn push_goes_through_hooks() {
    if !common::git_available() {
        eprintln!("Skipping push test: git not found in PATH");
        return;
    }

    let server = TestServer::start().await;
    let (_, owner_token) = server.create_principal("owner").await;
    let (pusher_id, pusher_token) = server.create_principal("pusher").await;

    let space: Value = server
        .create_space(&owner_token, json!({ "path_name": "team-a" }))
        .await
        .json()
        .await
        .unwrap();
    let space_id = space["data"]["id"].as_i64().unwrap();
    let repo: Value = server
        .create_repo(&owner_token, json!({ "space_id": space_id, "path_name": "svc" }))
        .await
        .json()
        .await
        .unwrap();
    assert!(repo["data"]["last_push_at"].is_null());

    server.grant(&pusher_id, space_id, &["repo:push"], &[]).await;

    let work = TempDir::new().unwrap();
    let work_dir = work.path();
    assert!(git(work_dir, &["init", "--quiet", "-b", "main"]).status.success());
    work.child("README.md").write_str("# svc\n").unwrap();
    assert!(git(work_dir, &["add", "README.md"]).status.success());
    assert!(git(work_dir, &["commit", "--quiet", "-m", "init"]).status.success());

    let remote = server
        .base_url
        .replace("http://", &format!("http://x-token:{pusher_token}@"));
    let remote = format!("{remote}/git/team-a/svc.git");

    let work_path = work_dir.to_path_buf();
    let output = tokio::task::spawn_blocking(move || {
        git(&work_path, &["push", &remote, "main:refs/heads/main"])
    })
    .await
    .unwrap();
    assert!(
        output.status.success(),
        "push failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let repo: Value = server
        .client
        .get(server.url("/api/v1/repos/team-a/svc"))
        .bearer_auth(&owner_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!repo["data"]["last_push_at"].is_null());
}
