//! Bluyin Admin
//!
//! Administration backend for a garment-alteration shop:
//! - Generic CRUD over a typed registry of tables (SQLite via sqlx)
//! - Clients, orders, alteration catalog and invoice data
//! - Cash register with a once-per-day opening base
//! - Users, roles and permissions with JWT sessions
//! - HTTP client services and an in-process data-event bus for UIs

pub mod api;
pub mod auth;
pub mod caja;
pub mod client;
pub mod events;
pub mod pedidos;
pub mod store;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

// ============================================================================
// config.yaml
// ============================================================================

/// Contents of `config.yaml`; every section is optional
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub database: DatabaseYamlConfig,
    /// Without this section (and without `JWT_SECRET`) the API is open
    pub auth: Option<AuthConfig>,
}

/// `server:` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
    /// Allowed CORS origin; `*` allows any
    pub cors_origin: String,
    pub body_limit_bytes: usize,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            cors_origin: "*".into(),
            body_limit_bytes: 1024 * 1024,
        }
    }
}

/// `database:` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseYamlConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseYamlConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://bluyin.db".into(),
            max_connections: 5,
        }
    }
}

/// `auth:` section
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// JWT signing secret (HS256, minimum 32 characters)
    pub jwt_secret: String,
    /// Session token lifetime in seconds (default: 28800 = 8h)
    #[serde(default = "default_jwt_expiry")]
    pub jwt_expiry_secs: u64,
    /// Password-reset token lifetime in seconds (default: 900 = 15min)
    #[serde(default = "default_reset_expiry")]
    pub reset_expiry_secs: u64,
    /// Frontend URL used to build the reset link (e.g. "http://localhost:5173")
    pub frontend_url: Option<String>,
}

fn default_jwt_expiry() -> u64 {
    28800
}

fn default_reset_expiry() -> u64 {
    900
}

// ============================================================================
// Resolved config
// ============================================================================

/// Settings after YAML, env overrides and defaults are merged
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub server_port: u16,
    pub cors_origin: String,
    pub body_limit_bytes: usize,
    /// Auth config: None means the API is open
    pub auth_config: Option<AuthConfig>,
}

impl Config {
    /// Env vars over `./config.yaml` (when present) over defaults
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Merge `yaml_path` (default `./config.yaml`) with the environment.
    ///
    /// Env vars win over the file, the file wins over defaults. A missing or
    /// unreadable file means defaults. `JWT_SECRET` alone is enough to turn
    /// auth on.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let mut auth_config = yaml.auth;
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            match auth_config.as_mut() {
                Some(auth) => auth.jwt_secret = secret,
                None => {
                    auth_config = Some(AuthConfig {
                        jwt_secret: secret,
                        jwt_expiry_secs: default_jwt_expiry(),
                        reset_expiry_secs: default_reset_expiry(),
                        frontend_url: None,
                    })
                }
            }
        }

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or(yaml.database.url),
            max_connections: yaml.database.max_connections,
            server_port: env_parse("SERVER_PORT").unwrap_or(yaml.server.port),
            cors_origin: std::env::var("CORS_ORIGIN").unwrap_or(yaml.server.cors_origin),
            body_limit_bytes: env_parse("BODY_LIMIT_BYTES").unwrap_or(yaml.server.body_limit_bytes),
            auth_config,
        })
    }

    /// Parsed file, or defaults when it is missing or malformed
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "Config file loaded");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Invalid config file, using defaults: {}", e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(path = %path.display(), "No config file");
                YamlConfig::default()
            }
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

// ============================================================================
// Application state and server
// ============================================================================

/// Store and config shared by the server
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn store::RecordStore>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Connect to the database and apply the schema
    pub async fn new(config: Config) -> Result<Self> {
        let store = store::SqlStore::connect(&config.database_url, config.max_connections)
            .await
            .with_context(|| format!("Failed to open database {}", config.database_url))?;
        store
            .init_schema()
            .await
            .context("Failed to apply database schema")?;

        Ok(Self {
            store: Arc::new(store),
            config: Arc::new(config),
        })
    }
}

/// Run the HTTP server until Ctrl-C
pub async fn start_server(config: Config) -> Result<()> {
    let port = config.server_port;
    let state = AppState::new(config).await?;
    if state.config.auth_config.is_none() {
        tracing::warn!("No auth section configured, the API is open");
    }

    let server_state = Arc::new(api::handlers::ServerState {
        store: state.store.clone(),
        caja: caja::CajaManager::new(state.store.clone()),
        pedidos: pedidos::PedidoManager::new(state.store.clone()),
        auth_config: state.config.auth_config.clone(),
        mailer: Arc::new(auth::LogMailer),
        password_cost: auth::password::BCRYPT_COST,
    });
    let router = api::create_router(server_state, &state.config);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        })
        .await
        .context("Server error")
}

// ============================================================================
// Tests
// ============================================================================
