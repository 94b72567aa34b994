use crate::error::{ImsError, ImsResult};
use crate::model::incident::Location;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub personnel: Vec<RangerConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: u64,
    /// Handles granted the administrator capability.
    #[serde(default)]
    pub admins: Vec<String>,
}

fn default_token_lifetime() -> u64 {
    12 * 60 * 60
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Seed data loaded into the store at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub incident_types: Vec<String>,
    /// Named places offered to clients; served as-is for every event.
    #[serde(default)]
    pub locations: Vec<Location>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RangerConfig {
    pub handle: String,
    pub name: String,
    #[serde(default = "default_ranger_status")]
    pub status: String,
    #[serde(default)]
    pub email: Option<String>,
    /// bcrypt hash, see `ims hash-password`.
    pub password_hash: String,
}

fn default_ranger_status() -> String {
    "active".to_string()
}

pub fn load_config(path: Option<&Path>) -> ImsResult<AppConfig> {
    let mut builder = Config::builder()
        .set_default("server.host", "127.0.0.1")
        .and_then(|b| b.set_default("server.port", 8080))
        .map_err(|err| ImsError::Config(err.to_string()))?
        .add_source(File::with_name("ims").required(false));

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("IMS").separator("__"));

    let config = builder
        .build()
        .map_err(|err| ImsError::Config(err.to_string()))?;

    let parsed: AppConfig = config
        .try_deserialize()
        .map_err(|err| ImsError::Config(err.to_string()))?;

    parsed.validate()?;

    Ok(parsed)
}

impl AppConfig {
    pub fn validate(&self) -> ImsResult<()> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ImsError::Config("auth.jwt_secret must not be empty".to_string()));
        }

        let mut handles = HashSet::new();
        for ranger in &self.personnel {
            if !handles.insert(ranger.handle.as_str()) {
                return Err(ImsError::Config(format!(
                    "duplicate personnel handle '{}'",
                    ranger.handle
                )));
            }
        }

        if self.store.events.iter().any(|id| id.trim().is_empty()) {
            return Err(ImsError::Config("store.events contains an empty event id".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
host = "0.0.0.0"
port = 9000

[auth]
jwt_secret = "s3cret"
admins = ["Tool"]

[store]
events = ["2025"]
incident_types = ["Medical", "Junk"]

[[personnel]]
handle = "Tool"
name = "Wilfredo Sánchez"
password_hash = "$2b$04$abcdefghijklmnopqrstuu"
"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.token_lifetime_secs, 43200);
        assert_eq!(config.auth.admins, vec!["Tool".to_string()]);
        assert_eq!(config.store.events, vec!["2025".to_string()]);
        assert_eq!(config.personnel[0].status, "active");
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_empty_secret_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[auth]\njwt_secret = \"  \"\n").unwrap();

        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, ImsError::Config(_)));
    }

    #[test]
    fn test_duplicate_handles_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[auth]
jwt_secret = "x"

[[personnel]]
handle = "Tool"
name = "A"
password_hash = "h"

[[personnel]]
handle = "Tool"
name = "B"
password_hash = "h"
"#
        )
        .unwrap();

        let err = load_config(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("duplicate personnel handle"));
    }
}
