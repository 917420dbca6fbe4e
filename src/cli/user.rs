use std::path::Path;

use chrono::Utc;
use inquire::validator::Validation;
use inquire::{Confirm, Text};
use uuid::Uuid;

use crate::auth::TokenGenerator;
use crate::server::validation::{validate_email, validate_user_name};
use crate::store::Store;
use crate::types::User;

use super::{init_store, issue_token};

pub fn run_user_add(
    data_dir: &Path,
    name: Option<String>,
    email: Option<String>,
    create_token: bool,
    non_interactive: bool,
) -> anyhow::Result<()> {
    let store = init_store(data_dir)?;
    let generator = TokenGenerator::new()?;

    if non_interactive {
        let (Some(name), Some(email)) = (name, email) else {
            anyhow::bail!("--name and --email are required in non-interactive mode");
        };
        let user = create_user(&store, &name, &email)?;
        print_created(&user);
        if create_token {
            print_token(&issue_token(&store, &generator, false, Some(&user.id))?);
        }
        return Ok(());
    }

    prompt_new_user(&store, &generator, name, email, create_token)
}

/// Prompts for whatever is missing, creates the user and optionally a token.
pub(super) fn prompt_new_user(
    store: &dyn Store,
    generator: &TokenGenerator,
    name: Option<String>,
    email: Option<String>,
    create_token: bool,
) -> anyhow::Result<()> {
    let name = match name {
        Some(name) => name,
        None => Text::new("Name:")
            .with_validator(|input: &str| {
                Ok(validate_user_name(input)
                    .map(|()| Validation::Valid)
                    .unwrap_or_else(|e| Validation::Invalid(e.into())))
            })
            .prompt()?,
    };

    let email = match email {
        Some(email) => email,
        None => Text::new("Email:")
            .with_validator(|input: &str| {
                Ok(validate_email(input.trim())
                    .map(|()| Validation::Valid)
                    .unwrap_or_else(|e| Validation::Invalid(e.into())))
            })
            .prompt()?,
    };

    let user = create_user(store, &name, &email)?;
    print_created(&user);

    let should_create_token = create_token
        || Confirm::new("Create access token?")
            .with_default(true)
            .prompt()?;

    if should_create_token {
        print_token(&issue_token(store, generator, false, Some(&user.id))?);
    }

    Ok(())
}

fn create_user(store: &dyn Store, name: &str, email: &str) -> anyhow::Result<User> {
    validate_user_name(name).map_err(anyhow::Error::msg)?;
    let email = email.trim().to_lowercase();
    validate_email(&email).map_err(anyhow::Error::msg)?;

    if store.get_user_by_email(&email)?.is_some() {
        anyhow::bail!("A user with email '{email}' already exists");
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: name.trim().to_string(),
        email,
        top_subjects: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    store.create_user(&user)?;

    Ok(user)
}

fn print_created(user: &User) {
    println!();
    println!("Created user \"{}\" <{}>", user.name, user.email);
    println!("  id: {}", user.id);
}

fn print_token(raw_token: &str) {
    println!();
    println!("========================================");
    println!("Access token (save this, it won't be shown again):");
    println!();
    println!("  {raw_token}");
    println!();
    println!("========================================");
    println!();
}
