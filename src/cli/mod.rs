mod commands;
mod init;
mod user;

pub use commands::{AdminCommands, UserCommands};
pub use init::run_init;
pub use user::run_user_add;

use std::path::Path;

use chrono::Utc;
use uuid::Uuid;

use crate::auth::TokenGenerator;
use crate::error::Error;
use crate::store::{SqliteStore, Store};
use crate::types::Token;

const DB_FILE: &str = "studyshelf.db";
const TOKEN_ATTEMPTS: u32 = 3;

/// Opens the store in `data_dir`, which must already be initialized.
pub fn init_store(data_dir: &Path) -> anyhow::Result<SqliteStore> {
    let db_path = data_dir.join(DB_FILE);

    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {}. Run 'studyshelf admin init' first.",
            db_path.display()
        );
    }

    Ok(SqliteStore::new(&db_path)?)
}

/// Generates and stores a token, retrying on lookup collisions.
/// Returns the raw token, which is never stored.
pub(crate) fn issue_token(
    store: &dyn Store,
    generator: &TokenGenerator,
    is_admin: bool,
    user_id: Option<&str>,
) -> anyhow::Result<String> {
    for _ in 0..TOKEN_ATTEMPTS {
        let (raw_token, lookup, hash) = generator.generate()?;
        let token = Token {
            id: Uuid::new_v4().to_string(),
            token_hash: hash,
            token_lookup: lookup,
            is_admin,
            user_id: user_id.map(str::to_string),
            created_at: Utc::now(),
            expires_at: None,
            last_used_at: None,
        };

        match store.create_token(&token) {
            Ok(()) => return Ok(raw_token),
            Err(Error::TokenLookupCollision) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    anyhow::bail!("Failed to create a unique token after {TOKEN_ATTEMPTS} attempts")
}
