use std::{env, fs, net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

/// Which payload location wins when a membership event carries the user id
/// both at the top level and nested under `public_user_data`, and the two
/// disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MembershipIdPrecedence {
    TopLevel,
    Nested,
}

impl Default for MembershipIdPrecedence {
    fn default() -> Self {
        Self::TopLevel
    }
}

impl MembershipIdPrecedence {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "top-level" | "top_level" | "toplevel" => Ok(Self::TopLevel),
            "nested" => Ok(Self::Nested),
            other => Err(anyhow!("unknown membership id precedence: {other}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    /// Shared token required in `x-webhook-token` on webhook deliveries.
    /// When unset, the gate is disabled (local development).
    #[serde(default)]
    pub webhook_token: Option<String>,
    #[serde(default)]
    pub membership_id_precedence: MembershipIdPrecedence,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            database_path: default_database_path(),
            database_max_connections: default_database_max_connections(),
            webhook_token: None,
            membership_id_precedence: MembershipIdPrecedence::default(),
        }
    }
}

impl AppConfig {
    const CONFIG_ENV: &'static str = "HUDDLE_CONFIG_FILE";
    const BIND_ADDRESS_ENV: &'static str = "HUDDLE_BIND_ADDRESS";
    const DATABASE_PATH_ENV: &'static str = "HUDDLE_DATABASE_PATH";
    const DATABASE_MAX_CONNECTIONS_ENV: &'static str = "HUDDLE_DATABASE_MAX_CONNECTIONS";
    const WEBHOOK_TOKEN_ENV: &'static str = "HUDDLE_WEBHOOK_TOKEN";
    const MEMBERSHIP_ID_PRECEDENCE_ENV: &'static str = "HUDDLE_MEMBERSHIP_ID_PRECEDENCE";

    /// Load configuration from defaults layered with an optional config file
    /// and environment variables.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    pub fn load_with(config_path: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::resolve_config_path(config_path)? {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            let file_config: Self = toml::from_str(&contents)
                .with_context(|| format!("invalid config file: {}", path.display()))?;

            config = file_config;
        }

        if let Ok(addr) = env::var(Self::BIND_ADDRESS_ENV) {
            config.bind_address = addr
                .parse()
                .with_context(|| format!("invalid {name}", name = Self::BIND_ADDRESS_ENV))?;
        }

        if let Ok(path) = env::var(Self::DATABASE_PATH_ENV) {
            config.database_path = path;
        }

        if let Ok(value) = env::var(Self::DATABASE_MAX_CONNECTIONS_ENV) {
            config.database_max_connections = value.trim().parse().with_context(|| {
                format!("invalid {name}", name = Self::DATABASE_MAX_CONNECTIONS_ENV)
            })?;
        }

        if let Ok(token) = env::var(Self::WEBHOOK_TOKEN_ENV) {
            let trimmed = token.trim();
            if !trimmed.is_empty() {
                config.webhook_token = Some(trimmed.to_owned());
            }
        }

        if let Ok(value) = env::var(Self::MEMBERSHIP_ID_PRECEDENCE_ENV) {
            config.membership_id_precedence =
                MembershipIdPrecedence::parse(&value).with_context(|| {
                    format!("invalid {name}", name = Self::MEMBERSHIP_ID_PRECEDENCE_ENV)
                })?;
        }

        Ok(config)
    }

    fn resolve_config_path(explicit: Option<PathBuf>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            return Self::validate_path(path);
        }

        if let Ok(path) = env::var(Self::CONFIG_ENV) {
            return Self::validate_path(PathBuf::from(path));
        }

        let mut candidates = vec![PathBuf::from("huddle.toml")];
        if let Some(dir) = Self::default_config_dir() {
            candidates.push(dir.join("config.toml"));
        }

        for candidate in candidates {
            if candidate.exists() {
                return Ok(Some(candidate));
            }
        }

        Ok(None)
    }

    fn validate_path(path: PathBuf) -> Result<Option<PathBuf>> {
        if path.exists() {
            Ok(Some(path))
        } else {
            Err(anyhow!(
                "configuration file does not exist: {}",
                path.display()
            ))
        }
    }

    fn default_config_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".huddle"))
    }
}

fn default_bind_address() -> SocketAddr {
    "127.0.0.1:8088"
        .parse()
        .expect("default bind address must be valid")
}

fn default_database_path() -> String {
    "./data/huddle.db".to_owned()
}

fn default_database_max_connections() -> u32 {
    4
}

fn home_dir() -> Option<PathBuf> {
    if let Some(path) = env::var_os("HOME") {
        return Some(PathBuf::from(path));
    }

    if let Some(path) = env::var_os("USERPROFILE") {
        return Some(PathBuf::from(path));
    }

    None
}
