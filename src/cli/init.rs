use std::fs;
use std::path::Path;

use crate::auth::TokenGenerator;
use crate::store::{SqliteStore, Store};

use super::issue_token;
use super::user::prompt_new_user;

pub const ADMIN_TOKEN_FILE: &str = ".admin_token";

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

pub fn run_init(data_dir: &Path, non_interactive: bool) -> anyhow::Result<()> {
    fs::create_dir_all(data_dir)?;

    let store = SqliteStore::new(data_dir.join(super::DB_FILE))?;
    store.initialize()?;

    let token_file = data_dir.join(ADMIN_TOKEN_FILE);

    if store.has_admin_token()? {
        anyhow::bail!(
            "Server already initialized. Admin token exists at: {}",
            token_file.display()
        );
    }

    let generator = TokenGenerator::new()?;
    let raw_token = issue_token(&store, &generator, true, None)?;

    fs::write(&token_file, &raw_token)?;

    #[cfg(unix)]
    set_restrictive_permissions(&token_file);

    println!();
    println!("========================================");
    println!("Admin token (save this, it won't be shown again):");
    println!();
    println!("  {raw_token}");
    println!();
    println!("Token also written to: {}", token_file.display());
    println!("========================================");
    println!();

    if !non_interactive {
        let create_user = inquire::Confirm::new("Would you like to create a first user?")
            .with_default(false)
            .prompt()?;

        if create_user {
            prompt_new_user(&store, &generator, None, None, true)?;
        }
    }

    Ok(())
}
