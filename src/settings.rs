//! Process settings from environment variables (a `.env` file is honoured by the binary via dotenvy).

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{}' (expected development or production)", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreKind::Postgres),
            "memory" => Ok(StoreKind::Memory),
            other => Err(format!("unknown store '{}' (expected postgres or memory)", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DocsCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub environment: Environment,
    pub bind_addr: SocketAddr,
    pub store: StoreKind,
    pub database_url: String,
    pub db_max_connections: u32,
    pub resources_path: PathBuf,
    /// Mount point of resource routes, e.g. `/api`. Empty mounts at the root.
    pub api_prefix: String,
    /// Enables bearer-token authorization on resource routes when set.
    pub api_token: Option<String>,
    pub renderer_url: String,
    pub renderer_timeout: Duration,
    pub request_timeout: Duration,
    pub body_limit_bytes: usize,
    pub docs_credentials: Option<DocsCredentials>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            environment: Environment::Development,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            store: StoreKind::Postgres,
            database_url: "postgres://localhost/resource_kit".into(),
            db_max_connections: 5,
            resources_path: PathBuf::from("resources.json"),
            api_prefix: "/api".into(),
            api_token: None,
            renderer_url: "http://localhost:8787".into(),
            renderer_timeout: Duration::from_secs(20),
            request_timeout: Duration::from_secs(30),
            body_limit_bytes: 1024 * 1024,
            docs_credentials: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable source; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let environment = parse_or(get("APP_ENV"), "APP_ENV", defaults.environment)?;
        let bind_addr = parse_or(get("BIND_ADDR"), "BIND_ADDR", defaults.bind_addr)?;
        let store = parse_or(get("STORE"), "STORE", defaults.store)?;
        let db_max_connections = parse_or(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", defaults.db_max_connections)?;
        let renderer_timeout = parse_or(get("RENDERER_TIMEOUT_SECS"), "RENDERER_TIMEOUT_SECS", 20u64)?;
        let request_timeout = parse_or(get("REQUEST_TIMEOUT_SECS"), "REQUEST_TIMEOUT_SECS", 30u64)?;
        let body_limit_bytes = parse_or(get("BODY_LIMIT_BYTES"), "BODY_LIMIT_BYTES", defaults.body_limit_bytes)?;

        let api_prefix = normalize_prefix(get("API_PREFIX").unwrap_or(defaults.api_prefix));

        let docs_credentials = match (get("DOCS_USERNAME"), get("DOCS_PASSWORD")) {
            (Some(username), Some(password)) => Some(DocsCredentials { username, password }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::Env {
                    name: "DOCS_USERNAME",
                    reason: "DOCS_USERNAME and DOCS_PASSWORD must be set together".into(),
                })
            }
        };
        if environment == Environment::Production && docs_credentials.is_none() {
            return Err(ConfigError::Env {
                name: "DOCS_USERNAME",
                reason: "docs credentials are required outside development".into(),
            });
        }
        if request_timeout == 0 {
            return Err(ConfigError::Env {
                name: "REQUEST_TIMEOUT_SECS",
                reason: "must be greater than 0".into(),
            });
        }

        Ok(Settings {
            environment,
            bind_addr,
            store,
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            db_max_connections,
            resources_path: get("RESOURCES_PATH").map(PathBuf::from).unwrap_or(defaults.resources_path),
            api_prefix,
            api_token: get("API_TOKEN"),
            renderer_url: get("RENDERER_URL").unwrap_or(defaults.renderer_url),
            renderer_timeout: Duration::from_secs(renderer_timeout),
            request_timeout: Duration::from_secs(request_timeout),
            body_limit_bytes,
            docs_credentials,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

fn parse_or<T>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Env {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// "/api/" -> "/api", "api" -> "/api", "/" -> ""
fn normalize_prefix(raw: String) -> String {
    let trimmed = raw.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
