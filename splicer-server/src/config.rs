//! Process configuration, read once at startup.
//!
//! Per-tool LTI credentials are not here; the registry loads those itself
//! (`ToolRegistry::from_env`).

use std::str::FromStr;

use anyhow::{Context, Result};

/// Upstream scoring endpoint used when `UM_SERVICE_URL` is not set.
pub const DEFAULT_UM_SERVICE_URL: &str = "http://adapt2.sis.pitt.edu/aggregate2/UserActivity";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// External base URL used to build the outcome callback, e.g.
    /// `https://lms.example.edu`. When unset the request Host header is used.
    pub public_base_url: Option<String>,
    /// Honor `X-Forwarded-Proto` from a TLS-terminating reverse proxy.
    pub trust_proxy_headers: bool,
    /// Hours a cached launch context stays valid for outcome correlation.
    pub cache_ttl_hours: i64,
    /// Forward outcome scores to the UM service. Disable for local testing.
    pub forward_to_um: bool,
    pub um_service_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3030,
            database_url: None,
            database_max_connections: 50,
            public_base_url: None,
            trust_proxy_headers: false,
            cache_ttl_hours: 24,
            forward_to_um: true,
            um_service_url: DEFAULT_UM_SERVICE_URL.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an explicit variable lookup. Tests pass a closure
    /// over a map so they never touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            host: lookup("SPLICER_HOST").unwrap_or(defaults.host),
            port: parse_or(lookup("SPLICER_PORT"), defaults.port, "SPLICER_PORT")?,
            database_url: lookup("DATABASE_URL"),
            database_max_connections: parse_or(
                lookup("DATABASE_MAX_CONNECTIONS"),
                defaults.database_max_connections,
                "DATABASE_MAX_CONNECTIONS",
            )?,
            public_base_url: lookup("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            trust_proxy_headers: flag(
                lookup("TRUST_PROXY_HEADERS"),
                defaults.trust_proxy_headers,
            ),
            cache_ttl_hours: parse_or(
                lookup("LTI_CACHE_TTL_HOURS"),
                defaults.cache_ttl_hours,
                "LTI_CACHE_TTL_HOURS",
            )?,
            forward_to_um: flag(lookup("LTI_FORWARD_TO_UM"), defaults.forward_to_um),
            um_service_url: lookup("UM_SERVICE_URL").unwrap_or(defaults.um_service_url),
        })
    }
}

fn parse_or<T>(value: Option<String>, default: T, name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid {name}: {raw:?}")),
        None => Ok(default),
    }
}

// Matches the deployment convention: only the literal string "true"
// (any case) enables a flag.
fn flag(value: Option<String>, default: bool) -> bool {
    match value {
        Some(raw) => raw.trim().eq_ignore_ascii_case("true"),
        None => default,
    }
}
