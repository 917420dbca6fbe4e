use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Initialize the server (create database and admin token)
    Init {
        /// Data directory for the database and uploaded files
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Add a new user and optionally an access token
    Add {
        /// Data directory for the database and uploaded files
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Display name for the new user
        #[arg(long)]
        name: Option<String>,

        /// Email address for the new user
        #[arg(long)]
        email: Option<String>,

        /// Create a token for the new user
        #[arg(long)]
        create_token: bool,

        /// Skip interactive prompts (requires --name and --email)
        #[arg(long)]
        non_interactive: bool,
    },
}
