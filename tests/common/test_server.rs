use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use serde_json::{Value, json};
use tempfile::TempDir;

pub struct TestServer {
    pub temp_dir: TempDir,
    pub base_url: String,
    pub admin_token: String,
    pub hook_secret: String,
    pub client: reqwest::Client,
    server_process: Option<Child>,
}

pub fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_gatehouse"))
}

/// Repository storage shells out to git; tests touching it are skipped
/// without one.
pub fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

fn read_secret(path: &Path) -> String {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
        .trim()
        .to_string()
}

impl TestServer {
    pub async fn start() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let data_dir = temp_dir.path();

        let init_output = Command::new(binary())
            .args(["admin", "init", "--data-dir"])
            .arg(data_dir)
            .arg("--non-interactive")
            .output()
            .expect("run init");
        assert!(
            init_output.status.success(),
            "Failed to initialize database"
        );

        let admin_token = read_secret(&data_dir.join(".admin_token"));
        let hook_secret = read_secret(&data_dir.join(".hook_secret"));

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let base_url = format!("http://127.0.0.1:{}", port);

        let server_process = Command::new(binary())
            .args(["serve", "--data-dir"])
            .arg(data_dir)
            .args(["--host", "127.0.0.1", "--port"])
            .arg(port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("start server");

        Self::wait_for_ready(&base_url).await;

        Self {
            temp_dir,
            base_url,
            admin_token,
            hook_secret,
            client: reqwest::Client::new(),
            server_process: Some(server_process),
        }
    }

    async fn wait_for_ready(base_url: &str) {
        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client
                .get(format!("{}/health", base_url))
                .send()
                .await
                .is_ok()
            {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        panic!("Server did not become ready");
    }

    pub fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Creates a principal and returns `(id, raw token)`.
    pub async fn create_principal(&self, uid: &str) -> (String, String) {
        let resp: Value = self
            .client
            .post(self.url("/api/v1/admin/principals"))
            .bearer_auth(&self.admin_token)
            .json(&json!({ "uid": uid }))
            .send()
            .await
            .expect("create principal")
            .json()
            .await
            .expect("parse principal response");
        let id = resp["data"]["id"].as_str().expect("principal id").to_string();

        let resp: Value = self
            .client
            .post(self.url(&format!("/api/v1/admin/principals/{id}/tokens")))
            .bearer_auth(&self.admin_token)
            .json(&json!({}))
            .send()
            .await
            .expect("create principal token")
            .json()
            .await
            .expect("parse token response");
        let token = resp["data"]["token"].as_str().expect("token").to_string();

        (id, token)
    }

    pub async fn create_space(&self, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/v1/spaces"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("create space")
    }

    pub async fn create_repo(&self, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/v1/repos"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("create repo")
    }

    pub async fn grant(&self, principal_id: &str, space_id: i64, allow: &[&str], deny: &[&str]) {
        let resp = self
            .client
            .post(self.url(&format!(
                "/api/v1/admin/principals/{principal_id}/space-grants"
            )))
            .bearer_auth(&self.admin_token)
            .json(&json!({ "space_id": space_id, "allow": allow, "deny": deny }))
            .send()
            .await
            .expect("grant");
        assert!(resp.status().is_success(), "grant failed: {}", resp.status());
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(mut process) = self.server_process.take() {
            let _ = process.kill();
            let _ = process.wait();
        }
    }
}
