//! CLI integration tests for studyshelf admin commands.
//!
//! Each test uses an isolated temp directory for the database, ensuring tests
//! can run in parallel safely.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use std::path::Path;

use assert_cmd::Command;
use assert_fs::TempDir;
use predicates::prelude::*;
use studyshelf::store::{SqliteStore, Store};

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    fn data_dir_str(&self) -> String {
        self.data_dir().to_string_lossy().to_string()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("studyshelf").expect("failed to find binary");
        cmd.env("NO_COLOR", "1");
        cmd
    }

    fn init(&self) -> assert_cmd::assert::Assert {
        self.cmd()
            .args([
                "admin",
                "init",
                "--data-dir",
                &self.data_dir_str(),
                "--non-interactive",
            ])
            .assert()
    }

    fn add_user(&self, name: &str, email: &str, create_token: bool) -> assert_cmd::assert::Assert {
        let data_dir = self.data_dir_str();
        let mut args = vec![
            "admin",
            "user",
            "add",
            "--data-dir",
            data_dir.as_str(),
            "--name",
            name,
            "--email",
            email,
            "--non-interactive",
        ];
        if create_token {
            args.push("--create-token");
        }
        self.cmd().args(args).assert()
    }

    fn store(&self) -> SqliteStore {
        SqliteStore::new(self.data_dir().join("studyshelf.db")).expect("open store")
    }
}

#[test]
fn init_creates_database_and_admin_token() {
    let ctx = TestContext::new();

    ctx.init()
        .success()
        .stdout(predicate::str::contains("Admin token"));

    assert!(ctx.data_dir().join("studyshelf.db").exists());

    let token_content = std::fs::read_to_string(ctx.data_dir().join(".admin_token"))
        .expect("failed to read token file");
    assert!(token_content.starts_with("shelf_"));

    assert!(ctx.store().has_admin_token().unwrap());
}

#[cfg(unix)]
#[test]
fn init_writes_token_file_with_owner_only_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let ctx = TestContext::new();
    ctx.init().success();

    let mode = std::fs::metadata(ctx.data_dir().join(".admin_token"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn init_rejects_second_initialization() {
    let ctx = TestContext::new();

    ctx.init().success();
    ctx.init()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn user_add_requires_initialized_database() {
    let ctx = TestContext::new();

    ctx.add_user("Ada", "ada@example.com", false)
        .failure()
        .stderr(predicate::str::contains("admin init"));
}

#[test]
fn user_add_creates_user_and_token() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.add_user("Ada Lovelace", "Ada@Example.com", true)
        .success()
        .stdout(predicate::str::contains("Created user \"Ada Lovelace\""))
        .stdout(predicate::str::contains("shelf_"));

    let store = ctx.store();
    let user = store
        .get_user_by_email("ada@example.com")
        .unwrap()
        .expect("user stored with normalized email");
    assert_eq!(user.name, "Ada Lovelace");
    assert_eq!(store.list_user_tokens(&user.id).unwrap().len(), 1);
}

#[test]
fn user_add_rejects_duplicate_email() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.add_user("Ada", "ada@example.com", false).success();
    ctx.add_user("Ada Again", "ada@example.com", false)
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn user_add_validates_input() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.add_user("Ada", "not-an-email", false).failure();

    ctx.cmd()
        .args([
            "admin",
            "user",
            "add",
            "--data-dir",
            &ctx.data_dir_str(),
            "--name",
            "Ada",
            "--non-interactive",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--email"));
}

#[test]
fn serve_refuses_to_start_before_init() {
    let ctx = TestContext::new();

    ctx.cmd()
        .args(["serve", "--data-dir", &ctx.data_dir_str(), "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn serve_rejects_invalid_config_file() {
    let ctx = TestContext::new();
    ctx.init().success();

    let config = ctx.data_dir().join("shelf.toml");
    std::fs::write(&config, "colour = \"blue\"\n").unwrap();

    ctx.cmd()
        .args(["serve", "--config"])
        .arg(&config)
        .args(["--data-dir", &ctx.data_dir_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}
