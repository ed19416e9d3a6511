//! Application configuration

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

/// Application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub sidecar: SidecarConfig,
    pub auth: AuthConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub ports: ServicePorts,
}

/// One listen port per service; every service runs from the same binary.
#[derive(Debug, Deserialize, Clone)]
pub struct ServicePorts {
    pub command: u16,
    pub recurring: u16,
    pub notification: u16,
    pub gateway: u16,
    pub audit: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Task database, owned exclusively by the command service.
    pub command_url: String,
    /// Audit database, owned exclusively by the audit service.
    pub audit_url: String,
    pub max_read_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SidecarConfig {
    pub base_url: String,
    pub pubsub: String,
    pub state_store: String,
    /// App id the recurring service invokes the command service under.
    pub command_app_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// HS256 secret shared with the auth service. Empty means the service
    /// refuses to start.
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub log_json: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    ///
    /// Configuration is loaded in this order (later sources override earlier ones):
    /// 1. config/default.toml (required)
    /// 2. Custom config file (if path provided)
    /// 3. config/dev.toml (optional, for local development)
    /// 4. Environment variables (prefix: TODOFLOW_)
    ///
    /// Example environment variable: TODOFLOW_SERVER__PORTS__COMMAND=8080
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigLoader::builder().add_source(File::with_name("config/default"));

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }

        builder = builder.add_source(File::with_name("config/dev").required(false));

        let config = builder
            .add_source(Environment::with_prefix("TODOFLOW").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
