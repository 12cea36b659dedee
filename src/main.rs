//! Bluyin Admin - Main Server
//!
//! Administration backend for the garment-alteration shop.

use anyhow::Result;
use bluyin_admin::auth::password::{hash_password, BCRYPT_COST};
use bluyin_admin::{AppState, Config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bluyin-admin")]
#[command(about = "Garment-alteration shop administration server")]
struct Cli {
    /// Path to the YAML config file (default: ./config.yaml)
    #[arg(short, long, global = true, env = "BLUYIN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (overrides config.yaml and SERVER_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create the database and apply the schema, then exit
    InitDb,

    /// Print the bcrypt hash of a password, for seeding users by hand
    HashPassword {
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bluyin_admin=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            let mut config = Config::from_yaml_and_env(cli.config.as_deref())?;
            if let Some(port) = port {
                config.server_port = port;
            }
            bluyin_admin::start_server(config).await
        }
        Commands::InitDb => {
            let config = Config::from_yaml_and_env(cli.config.as_deref())?;
            let url = config.database_url.clone();
            AppState::new(config).await?;
            tracing::info!("Schema applied to {}", url);
            Ok(())
        }
        Commands::HashPassword { password } => {
            println!("{}", hash_password(&password, BCRYPT_COST)?);
            Ok(())
        }
    }
}
