use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Postgres,
    Rest,
    Memory,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(BackendKind::Postgres),
            "rest" | "supabase" => Ok(BackendKind::Rest),
            "memory" => Ok(BackendKind::Memory),
            other => Err(format!("Unknown backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostgresConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RestConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamConfig {
    pub backend: BackendKind,
    pub postgres: PostgresConfig,
    pub rest: RestConfig,
    pub server: ServerConfig,
    pub request_timeout_secs: u64,
    pub expiry_window_days: i64,
}

fn parsed_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring malformed {}={:?}", name, raw);
            None
        }
    }
}

impl TeamConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("DATABASE_URL") {
            config.postgres.database_url = Some(url);
        }
        if let Some(max) = parsed_var::<u32>("DATABASE_MAX_CONNECTIONS") {
            config.postgres.max_connections = max;
        }
        if let Ok(url) = env::var("SUPABASE_URL") {
            config.rest.base_url = Some(url);
        }
        if let Ok(key) = env::var("SUPABASE_ANON_KEY") {
            config.rest.api_key = Some(key);
        }
        if let Some(timeout) = parsed_var::<u64>("TEAM_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = timeout;
        }
        if let Some(days) = parsed_var::<i64>("TEAM_EXPIRY_WINDOW_DAYS") {
            config.expiry_window_days = days;
        }
        if let Ok(addr) = env::var("TEAM_BIND_ADDR") {
            config.server.bind_addr = addr;
        }

        config.backend = match parsed_var::<BackendKind>("TEAM_BACKEND") {
            Some(kind) => kind,
            None if config.postgres.database_url.is_some() => BackendKind::Postgres,
            None if config.rest.base_url.is_some() => BackendKind::Rest,
            None => BackendKind::Memory,
        };

        config
    }
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            postgres: PostgresConfig::default(),
            rest: RestConfig::default(),
            server: ServerConfig::default(),
            request_timeout_secs: 30,
            expiry_window_days: 30,
        }
    }
}
