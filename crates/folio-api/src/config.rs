//! Server configuration read from the environment.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DATABASE_URL` | `postgres://localhost/folio` |
//! | `HOST` / `PORT` | `0.0.0.0` / `3000` |
//! | `FILE_STORAGE_PATH` | `./storage` |
//! | `PUBLIC_URL` | `http://{HOST}:{PORT}` |
//! | `ALLOWED_ORIGINS` | `http://localhost:3000` |
//! | `RATE_LIMIT_ENABLED` | `true` |
//! | `RATE_LIMIT_REQUESTS` / `RATE_LIMIT_PERIOD_SECS` | `100` / `60` |
//! | `DB_MAX_CONNECTIONS` | `10` |

use axum::http::HeaderValue;

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";

/// Everything the server needs to start, parsed once at boot.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Root directory of the upload store (served at `/storage`).
    pub file_storage_path: String,
    /// Base URL used to build public image URLs.
    pub public_url: String,
    pub allowed_origins: Vec<HeaderValue>,
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_period_secs: u64,
    pub db_max_connections: u32,
}

impl ServerConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which returns a variable's value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let host = var("HOST", "0.0.0.0");
        let port = var("PORT", "3000").parse().unwrap_or(3000);
        let public_url = lookup("PUBLIC_URL").unwrap_or_else(|| format!("http://{}:{}", host, port));

        // Zero would make the governor quota invalid.
        let rate_limit_requests = var("RATE_LIMIT_REQUESTS", "100")
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(100);
        let rate_limit_period_secs = var("RATE_LIMIT_PERIOD_SECS", "60")
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(60);

        Self {
            database_url: var("DATABASE_URL", "postgres://localhost/folio"),
            host,
            port,
            file_storage_path: var("FILE_STORAGE_PATH", "./storage"),
            public_url,
            allowed_origins: parse_allowed_origins(&var("ALLOWED_ORIGINS", DEFAULT_ALLOWED_ORIGINS)),
            rate_limit_enabled: parse_bool(&var("RATE_LIMIT_ENABLED", "true")).unwrap_or(true),
            rate_limit_requests,
            rate_limit_period_secs,
            db_max_connections: var("DB_MAX_CONNECTIONS", "10").parse().unwrap_or(10),
        }
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Parse a comma-separated origin whitelist.
///
/// Invalid entries are skipped with a warning; an empty list falls back to
/// the development default.
pub fn parse_allowed_origins(origins: &str) -> Vec<HeaderValue> {
    let parsed: Vec<HeaderValue> = origins
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect();

    if parsed.is_empty() {
        vec![HeaderValue::from_static(DEFAULT_ALLOWED_ORIGINS)]
    } else {
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ServerConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.public_url, "http://0.0.0.0:3000");
        assert!(config.rate_limit_enabled);
        assert_eq!(config.rate_limit_requests, 100);
        assert_eq!(config.allowed_origins.len(), 1);
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("PUBLIC_URL", "https://notes.example.com"),
            ("RATE_LIMIT_ENABLED", "false"),
            ("RATE_LIMIT_REQUESTS", "5"),
            ("DB_MAX_CONNECTIONS", "3"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.public_url, "https://notes.example.com");
        assert!(!config.rate_limit_enabled);
        assert_eq!(config.rate_limit_requests, 5);
        assert_eq!(config.db_max_connections, 3);
    }

    #[test]
    fn test_zero_rate_limit_falls_back() {
        let config = config_from(&[("RATE_LIMIT_REQUESTS", "0"), ("RATE_LIMIT_PERIOD_SECS", "0")]);
        assert_eq!(config.rate_limit_requests, 100);
        assert_eq!(config.rate_limit_period_secs, 60);
    }

    #[test]
    fn test_parse_allowed_origins() {
        let origins = parse_allowed_origins("https://a.example, http://localhost:5173 ,");
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[1].to_str().unwrap(), "http://localhost:5173");

        let origins = parse_allowed_origins("");
        assert_eq!(origins[0].to_str().unwrap(), DEFAULT_ALLOWED_ORIGINS);
    }
}
