use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use studyshelf::cli::{AdminCommands, UserCommands, run_init, run_user_add};
use studyshelf::config::ServerConfig;
use studyshelf::server::{AppState, create_router};
use studyshelf::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "studyshelf")]
#[command(about = "Share PDF study resources and earn contribution points", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// TOML file supplying defaults for the options below
        #[arg(long)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database and uploaded files
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Largest accepted PDF upload in bytes
        #[arg(long)]
        max_upload_bytes: Option<usize>,
    },
}

fn serve_config(
    config: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
    max_upload_bytes: Option<usize>,
) -> anyhow::Result<ServerConfig> {
    let mut cfg = match config {
        Some(path) => ServerConfig::from_file(&path)?,
        None => ServerConfig::default(),
    };

    if let Some(host) = host {
        cfg.host = host;
    }
    if let Some(port) = port {
        cfg.port = port;
    }
    if let Some(data_dir) = data_dir {
        cfg.data_dir = data_dir;
    }
    if let Some(max) = max_upload_bytes {
        if max == 0 {
            bail!("--max-upload-bytes must be positive");
        }
        cfg.max_upload_bytes = max;
    }

    Ok(cfg)
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let not_initialized =
        "Server not initialized. Run 'studyshelf admin init' first to create the database and admin token.";

    if !config.db_path().exists() {
        bail!(not_initialized);
    }

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;
    if !store.has_admin_token()? {
        bail!(not_initialized);
    }

    let state = Arc::new(AppState::new(
        Arc::new(store),
        &config.data_dir,
        config.max_upload_bytes,
    ));

    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!(
        data_dir = %config.data_dir.display(),
        max_upload_bytes = config.max_upload_bytes,
        "Starting server on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("studyshelf=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                non_interactive,
            } => run_init(&data_dir, non_interactive)?,
            AdminCommands::User { command } => match command {
                UserCommands::Add {
                    data_dir,
                    name,
                    email,
                    create_token,
                    non_interactive,
                } => run_user_add(&data_dir, name, email, create_token, non_interactive)?,
            },
        },
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
            max_upload_bytes,
        } => {
            let config = serve_config(config, host, port, data_dir, max_upload_bytes)?;
            serve(config).await?;
        }
    }

    Ok(())
}
