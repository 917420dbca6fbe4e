use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use serde_json::{Value, json};
use tempfile::TempDir;

const BINARY: &str = env!("CARGO_BIN_EXE_studyshelf");

pub struct TestServer {
    pub temp_dir: TempDir,
    pub base_url: String,
    pub admin_token: String,
    pub client: reqwest::Client,
    server_process: Option<Child>,
}

/// A user created through the admin API, with a bearer token.
pub struct TestUser {
    pub id: String,
    pub name: String,
    pub token: String,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with_args(&[]).await
    }

    pub async fn start_with_args(extra_args: &[&str]) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let data_dir = temp_dir.path();

        let init_output = Command::new(BINARY)
            .args(["admin", "init", "--data-dir"])
            .arg(data_dir)
            .arg("--non-interactive")
            .output()
            .expect("run init");
        assert!(
            init_output.status.success(),
            "Failed to initialize database"
        );

        let token_path = data_dir.join(".admin_token");
        let admin_token = std::fs::read_to_string(&token_path)
            .expect("read admin token")
            .trim()
            .to_string();

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let base_url = format!("http://127.0.0.1:{}", port);

        let server_process = Command::new(BINARY)
            .args(["serve", "--data-dir"])
            .arg(data_dir)
            .args(["--host", "127.0.0.1", "--port"])
            .arg(port.to_string())
            .args(extra_args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("start server");

        let client = reqwest::Client::new();
        Self::wait_for_ready(&client, &base_url).await;

        Self {
            temp_dir,
            base_url,
            admin_token,
            client,
            server_process: Some(server_process),
        }
    }

    async fn wait_for_ready(client: &reqwest::Client, base_url: &str) {
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

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn files_dir(&self) -> PathBuf {
        self.data_dir().join("files")
    }

    /// Creates a user and a token for them through the admin API.
    pub async fn create_user(&self, name: &str, email: &str) -> TestUser {
        let resp: Value = self
            .client
            .post(self.url("/api/admin/users"))
            .bearer_auth(&self.admin_token)
            .json(&json!({ "name": name, "email": email }))
            .send()
            .await
            .expect("create user")
            .json()
            .await
            .expect("parse user response");
        let id = resp["data"]["id"]
            .as_str()
            .expect("user id")
            .to_string();

        let resp: Value = self
            .client
            .post(self.url(&format!("/api/admin/users/{id}/tokens")))
            .bearer_auth(&self.admin_token)
            .json(&json!({}))
            .send()
            .await
            .expect("create token")
            .json()
            .await
            .expect("parse token response");
        let token = resp["data"]["token"]
            .as_str()
            .expect("token")
            .to_string();

        TestUser {
            id,
            name: name.to_string(),
            token,
        }
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
