//! Configuration structures.
//!
//! Configuration is loaded from environment variables (the binary reads a
//! `.env` file into the environment first). Every section has a `Default`
//! so tests can build a config without touching the process environment.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use super::errors::{Error, Result};

/// Global bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Remote platform connection.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Listener configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Tool-call rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// External management console integration.
    #[serde(default)]
    pub portal: PortalConfig,
}

/// Remote platform connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the platform instance, without trailing slash.
    pub base_url: String,

    /// Static API key sent on every request. Never serialized.
    #[serde(skip_serializing, default)]
    pub api_key: String,

    /// Per-request timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Maximum attempts per remote call, first attempt included.
    pub max_retries: u32,
}

impl RemoteConfig {
    /// Versioned REST base path all client calls are made under.
    pub fn api_base_url(&self) -> String {
        format!("{}/api/v1", self.base_url)
    }
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5678".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// Which transport serves tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerMode {
    /// Newline-delimited JSON on stdin/stdout.
    Stdio,
    /// HTTP `/call` surface.
    Http,
}

impl FromStr for ServerMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(ServerMode::Stdio),
            "http" => Ok(ServerMode::Http),
            other => Err(Error::config(format!(
                "server mode must be 'stdio' or 'http', got '{other}'"
            ))),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Tool transport selector.
    pub mode: ServerMode,

    /// Bind host for both HTTP surfaces.
    pub host: String,

    /// Tool HTTP surface port.
    pub port: u16,

    /// Administrative surface port.
    pub admin_port: u16,

    /// Largest accepted request (HTTP body or pipe line) in bytes.
    pub max_request_bytes: usize,
}

impl ServerConfig {
    pub fn tool_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn admin_addr(&self) -> String {
        format!("{}:{}", self.host, self.admin_port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mode: ServerMode::Stdio,
            host: "0.0.0.0".to_string(),
            port: 8001,
            admin_port: 8002,
            max_request_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    Console,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "console" => Ok(LogFormat::Console),
            other => Err(Error::config(format!(
                "log format must be 'json' or 'console', got '{other}'"
            ))),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

/// Tool-call rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub requests_per_minute: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 100,
        }
    }
}

/// External management console integration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PortalConfig {
    /// Console origin allowed through CORS on the admin surface.
    pub portal_url: Option<String>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// `N8N_URL` and `N8N_API_KEY` are required; everything else falls back
    /// to the section defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url = get("N8N_URL")
            .ok_or_else(|| Error::config("N8N_URL is not set"))?
            .trim()
            .trim_end_matches('/')
            .to_string();
        let parsed = url::Url::parse(&base_url)
            .map_err(|e| Error::config(format!("N8N_URL '{base_url}' is not a valid URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "N8N_URL must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        let api_key = get("N8N_API_KEY").ok_or_else(|| Error::config("N8N_API_KEY is not set"))?;

        let remote_defaults = RemoteConfig::default();
        let timeout_secs: u64 =
            parse_var(&get, "N8N_TIMEOUT", remote_defaults.timeout.as_secs())?;
        let max_retries: u32 = parse_var(&get, "N8N_MAX_RETRIES", remote_defaults.max_retries)?;
        if max_retries == 0 {
            return Err(Error::config("N8N_MAX_RETRIES must be at least 1"));
        }

        let server_defaults = ServerConfig::default();
        let mode = match get("MCP_SERVER_MODE") {
            Some(raw) => raw.parse()?,
            None => server_defaults.mode,
        };

        let observability_defaults = ObservabilityConfig::default();
        let log_level = match get("LOG_LEVEL") {
            Some(raw) => normalize_log_level(&raw)?,
            None => observability_defaults.log_level,
        };
        let log_format = match get("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => observability_defaults.log_format,
        };

        let rate_defaults = RateLimitSettings::default();

        Ok(Config {
            remote: RemoteConfig {
                base_url,
                api_key,
                timeout: Duration::from_secs(timeout_secs),
                max_retries,
            },
            server: ServerConfig {
                mode,
                host: get("MCP_SERVER_HOST").unwrap_or(server_defaults.host),
                port: parse_var(&get, "MCP_SERVER_PORT", server_defaults.port)?,
                admin_port: parse_var(&get, "MANAGEMENT_API_PORT", server_defaults.admin_port)?,
                max_request_bytes: server_defaults.max_request_bytes,
            },
            observability: ObservabilityConfig {
                log_level,
                log_format,
            },
            rate_limit: RateLimitSettings {
                enabled: parse_bool(&get, "ENABLE_RATE_LIMITING", rate_defaults.enabled)?,
                requests_per_minute: parse_var(
                    &get,
                    "RATE_LIMIT_REQUESTS",
                    rate_defaults.requests_per_minute,
                )?,
            },
            portal: PortalConfig {
                portal_url: get("DJANGO_PORTAL_URL").map(|u| u.trim_end_matches('/').to_string()),
            },
        })
    }
}

fn parse_var<T, F>(get: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::config(format!("{key}: invalid value '{raw}'"))),
        None => Ok(default),
    }
}

fn parse_bool<F>(get: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::config(format!("{key}: invalid boolean '{raw}'"))),
        },
        None => Ok(default),
    }
}

fn normalize_log_level(raw: &str) -> Result<String> {
    let level = match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" | "critical" => "error",
        other => {
            return Err(Error::config(format!(
                "LOG_LEVEL must be one of trace, debug, info, warn, error; got '{other}'"
            )))
        }
    };
    Ok(level.to_string())
}
