use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::{HOOK_CONFIG_FILE, HookConfig};
use crate::error::{Error, Result};
use crate::hooks::HOOK_NAMES;

const GIT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitService {
    UploadPack,
    ReceivePack,
}

impl GitService {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "git-upload-pack" => Some(Self::UploadPack),
            "git-receive-pack" => Some(Self::ReceivePack),
            _ => None,
        }
    }

    pub fn command_name(&self) -> &'static str {
        match self {
            Self::UploadPack => "git-upload-pack",
            Self::ReceivePack => "git-receive-pack",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::UploadPack => "application/x-git-upload-pack-result",
            Self::ReceivePack => "application/x-git-receive-pack-result",
        }
    }

    pub fn advertisement_content_type(&self) -> &'static str {
        match self {
            Self::UploadPack => "application/x-git-upload-pack-advertisement",
            Self::ReceivePack => "application/x-git-receive-pack-advertisement",
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Self::ReceivePack)
    }
}

/// Runs a git service against a bare repository. `env` is passed to git and
/// from there to the hooks it runs.
pub async fn run_git_command(
    repo_path: &Path,
    service: GitService,
    advertise_refs: bool,
    input: Option<&[u8]>,
    env: &[(&str, String)],
) -> Result<Output> {
    let mut cmd = Command::new(service.command_name());
    cmd.arg("--stateless-rpc");

    if advertise_refs {
        cmd.arg("--advertise-refs");
    }

    cmd.arg(repo_path);
    cmd.envs(env.iter().map(|(k, v)| (*k, v.as_str())));
    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        if let Some(data) = input {
            stdin.write_all(data).await?;
        }
    }

    let output = tokio::time::timeout(GIT_COMMAND_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| Error::BackendUnavailable("git command timed out".into()))??;

    Ok(output)
}

pub async fn init_bare_repo(repo_path: &Path, default_branch: &str) -> Result<()> {
    if let Some(parent) = repo_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let output = Command::new("git")
        .args(["init", "--bare", "--quiet"])
        .arg(repo_path)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::BackendUnavailable(format!(
            "failed to init bare repo: {stderr}"
        )));
    }

    fs::write(
        repo_path.join("HEAD"),
        format!("ref: refs/heads/{default_branch}\n"),
    )
    .await?;

    Ok(())
}

/// Installs the hook scripts and the hook configuration into a bare repository.
pub async fn install_hooks(repo_path: &Path, hook_binary: &Path, config: &HookConfig) -> Result<()> {
    let hooks_dir = repo_path.join("hooks");
    fs::create_dir_all(&hooks_dir).await?;

    for name in HOOK_NAMES {
        let script_path = hooks_dir.join(name);
        fs::write(&script_path, hook_script(hook_binary, name)).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755)).await?;
        }
    }

    let config = config.clone();
    let config_path = repo_path.join(HOOK_CONFIG_FILE);
    tokio::task::spawn_blocking(move || config.save(&config_path))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))??;

    Ok(())
}

fn hook_script(hook_binary: &Path, name: &str) -> String {
    format!(
        "#!/bin/sh\nexec {} hooks {name} \"$@\"\n",
        shell_quote(&hook_binary.to_string_lossy())
    )
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

pub fn format_pkt_line_header(service: GitService) -> Vec<u8> {
    let service_name = service.command_name();
    let service_line = format!("# service={service_name}\n");
    let length = service_line.len() + 4;
    let mut result = format!("{length:04x}{service_line}").into_bytes();
    result.extend_from_slice(b"0000");
    result
}

#[must_use]
pub fn repo_path(data_dir: &Path, repo_id: i64) -> PathBuf {
    data_dir.join("repos").join(format!("{repo_id}.git"))
}
