//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > config.toml > defaults

use serde::Deserialize;
use std::sync::OnceLock;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Get the global application configuration.
///
/// # Panics
/// Panics if config has not been initialized via [`init`].
pub fn get() -> &'static AppConfig {
    CONFIG
        .get()
        .expect("Config not initialized. Call greenroom_common::config::init() first.")
}

/// Initialize the global configuration from environment.
///
/// Should be called once at application startup, before any other code accesses config.
pub fn init() -> Result<&'static AppConfig, config::ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let cfg = config::Config::builder()
        // Defaults
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        // Empty url selects the in-memory store (single-node dev)
        .set_default("store.redis_url", "")?
        .set_default("store.entity_ttl_secs", 86_400)? // 24 hours
        .set_default("identity.base_url", "http://localhost:9999")?
        .set_default("identity.service_key", "")?
        .set_default("identity.jwt_secret", "dev-secret-change-me")?
        // Optional config file
        .add_source(config::File::with_name("config").required(false))
        // Environment variables (GREENROOM_SERVER__HOST, GREENROOM_STORE__REDIS_URL, etc.)
        .add_source(
            config::Environment::with_prefix("GREENROOM")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = cfg.try_deserialize()?;
    Ok(CONFIG.get_or_init(|| app_config))
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub identity: IdentityConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Redis connection url. Empty selects the in-memory backend.
    pub redis_url: String,
    /// Expiry applied to every Room and Client entity.
    pub entity_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IdentityConfig {
    /// Base url of the external identity/billing provider.
    pub base_url: String,
    /// Server-side key for admin lookups (never sent to clients).
    pub service_key: String,
    /// Secret used to validate access tokens minted by the provider.
    pub jwt_secret: String,
}
