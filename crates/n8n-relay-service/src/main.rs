//! # n8n Relay Service
//!
//! Binary entry point for the n8n relay HTTP service.
//!
//! This executable:
//! - Loads configuration from files and the environment
//! - Initializes logging
//! - Starts the HTTP server from n8n-relay-api

use n8n_relay_api::{
    config::{explicit_config_path, DEFAULT_CONFIG_FILES},
    start_server, LoggingConfig, ServiceConfig, ServiceError,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (later sources override earlier ones):
    //  1. /etc/n8n-relay/service.yaml
    //  2. ./config/service.yaml
    //  3. Path given by N8N_RELAY_CONFIG_FILE
    //  4. Environment variables prefixed N8N_RELAY__
    //     e.g. N8N_RELAY__DINGTALK__APP_SECRET=... sets dingtalk.app_secret
    // -------------------------------------------------------------------------
    let explicit_path = explicit_config_path();
    let service_config =
        match ServiceConfig::load_from(DEFAULT_CONFIG_FILES, explicit_path.as_deref()) {
            Ok(config) => config,
            Err(e) => {
                init_logging(&LoggingConfig::default());
                error!(error = %e, "Service configuration is invalid; aborting");
                std::process::exit(3);
            }
        };

    init_logging(&service_config.logging);

    if let Some(path) = &explicit_path {
        info!(path = %path, "Loaded configuration from explicit path");
    }

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        query_webhook = %service_config.n8n.query_webhook_url,
        dingtalk_webhook = %service_config.n8n.dingtalk_webhook_url,
        "Starting n8n relay service"
    );

    if let Err(e) = start_server(service_config).await {
        error!("Failed to start server: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };

        std::process::exit(exit_code);
    }

    Ok(())
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directives(&logging.level).into());

    let json = logging.json_format;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

/// Filter directives applying `level` to the relay crates and `tower_http`.
fn default_directives(level: &str) -> String {
    let level = level.to_lowercase();
    format!("n8n_relay={level},n8n_relay_api={level},n8n_relay_core={level},tower_http={level}")
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
