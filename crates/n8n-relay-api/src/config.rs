//! Configuration types for the HTTP service
//!
//! Every field carries a serde default so that any subset of settings is a
//! valid source. Sources are layered (later overrides earlier):
//!
//! 1. `/etc/n8n-relay/service.yaml`
//! 2. `./config/service.yaml`
//! 3. The file named by `N8N_RELAY_CONFIG_FILE` (required when set)
//! 4. Environment variables prefixed `N8N_RELAY__`, `__`-separated,
//!    e.g. `N8N_RELAY__DINGTALK__APP_SECRET=...` sets `dingtalk.app_secret`

use crate::errors::ConfigError;
use n8n_relay_core::signature::DEFAULT_MAX_CLOCK_SKEW_MS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_FILE_ENV: &str = "N8N_RELAY_CONFIG_FILE";

/// Prefix for configuration environment variables.
pub const ENV_PREFIX: &str = "N8N_RELAY";

/// Configuration files probed on startup, without extension.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["/etc/n8n-relay/service", "config/service"];

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Downstream n8n endpoints
    pub n8n: N8nConfig,

    /// DingTalk robot settings
    pub dingtalk: DingTalkConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Load configuration from the given optional files, an optional
    /// required file, and the environment, then validate it.
    pub fn load_from(
        optional_files: &[&str],
        explicit_path: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        for name in optional_files {
            builder = builder.add_source(
                config::File::with_name(name)
                    .required(false)
                    .format(config::FileFormat::Yaml),
            );
        }

        if let Some(path) = explicit_path {
            builder = builder.add_source(
                config::File::with_name(path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }

        let loaded: ServiceConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must be non-zero".to_string(),
            });
        }

        validate_url("n8n.query_webhook_url", &self.n8n.query_webhook_url)?;
        validate_url("n8n.dingtalk_webhook_url", &self.n8n.dingtalk_webhook_url)?;
        if let Some(health_url) = &self.n8n.health_url {
            validate_url("n8n.health_url", health_url)?;
        }

        if self.n8n.request_timeout_seconds == Some(0) {
            return Err(ConfigError::Invalid {
                message: "n8n.request_timeout_seconds must be non-zero when set".to_string(),
            });
        }

        if self.dingtalk.app_secret.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "dingtalk.app_secret".to_string(),
            });
        }

        if self.dingtalk.max_clock_skew_ms == 0 {
            return Err(ConfigError::Invalid {
                message: "dingtalk.max_clock_skew_ms must be non-zero".to_string(),
            });
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(ConfigError::Invalid {
                message: format!("logging.level '{}' is not a valid level", other),
            }),
        }
    }
}

/// The file named by `N8N_RELAY_CONFIG_FILE`, if set and non-empty.
pub fn explicit_config_path() -> Option<String> {
    std::env::var(CONFIG_FILE_ENV)
        .ok()
        .filter(|path| !path.is_empty())
}

fn validate_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value).map_err(|e| ConfigError::Invalid {
        message: format!("{} is not a valid URL: {}", key, e),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::Invalid {
            message: format!("{} must use http or https, got '{}'", key, scheme),
        }),
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Enable permissive CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
            enable_cors: true,
        }
    }
}

/// Downstream n8n configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct N8nConfig {
    /// Webhook receiving chat queries (Chat Trigger node)
    pub query_webhook_url: String,

    /// Webhook receiving relayed DingTalk messages
    pub dingtalk_webhook_url: String,

    /// n8n health endpoint probed by the health check (not probed if unset)
    pub health_url: Option<String>,

    /// Outbound request timeout; unset leaves the HTTP client default
    pub request_timeout_seconds: Option<u64>,
}

impl N8nConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_seconds.map(Duration::from_secs)
    }
}

impl Default for N8nConfig {
    fn default() -> Self {
        Self {
            query_webhook_url: "http://localhost:5678/webhook/chat".to_string(),
            dingtalk_webhook_url: "http://localhost:5678/webhook/ding_talk".to_string(),
            health_url: Some("http://localhost:5678/healthz".to_string()),
            request_timeout_seconds: None,
        }
    }
}

/// DingTalk outgoing-robot configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DingTalkConfig {
    /// App secret shared with DingTalk, used to verify callback signatures
    #[serde(skip_serializing)]
    pub app_secret: String,

    /// Maximum accepted distance between the callback timestamp and now
    pub max_clock_skew_ms: u64,
}

impl Default for DingTalkConfig {
    fn default() -> Self {
        Self {
            app_secret: String::new(),
            max_clock_skew_ms: DEFAULT_MAX_CLOCK_SKEW_MS,
        }
    }
}

impl std::fmt::Debug for DingTalkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DingTalkConfig")
            .field("app_secret", &"<REDACTED>")
            .field("max_clock_skew_ms", &self.max_clock_skew_ms)
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
