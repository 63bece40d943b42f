//! # Structured Logging
//!
//! Installs the `tracing` subscriber used by services embedding this crate.
//! Handled RPC errors are emitted as structured events carrying the
//! operation, user id and session id as fields.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

use crate::types::{Error, Result};

// Flag to track if logging has been initialized
static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Configuration for the logging system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// The log level to use (trace, debug, info, warn, error)
    pub level: String,
    /// The service name for identification
    pub service_name: String,
    /// Whether to output logs to a file
    pub file_output: bool,
    /// The directory to store log files in
    pub log_dir: Option<String>,
    /// Whether to use JSON formatting
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            service_name: "rpc-errors".to_string(),
            file_output: false,
            log_dir: None,
            json_format: true,
        }
    }
}

/// Initializes the structured logging system
pub fn init_logging(config: Option<LoggingConfig>) -> Result<()> {
    // Don't re-initialize if already done
    if LOGGING_INITIALIZED.load(Ordering::SeqCst) {
        return Ok(());
    }

    let config = config.unwrap_or_default();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},warn", config.level)));

    // JSON and text layers have distinct types, so each branch finishes the
    // subscriber and installs it.
    let file_layer = if config.file_output {
        config.log_dir.as_ref().map(|log_dir| {
            let file_appender = RollingFileAppender::new(
                tracing_appender::rolling::Rotation::DAILY,
                log_dir,
                format!("{}.log", config.service_name),
            );
            let (non_blocking, guard) = NonBlocking::new(file_appender);

            // Keep the guard alive for the lifetime of the program
            Box::leak(Box::new(guard));

            fmt::layer().with_writer(non_blocking).with_ansi(false)
        })
    } else {
        None
    };

    let registry = Registry::default().with(filter).with(file_layer);
    let installed = if config.json_format {
        let json_layer = fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_target(true);
        tracing::subscriber::set_global_default(registry.with(json_layer))
    } else {
        let text_layer = fmt::layer().with_target(true).with_thread_ids(true);
        tracing::subscriber::set_global_default(registry.with(text_layer))
    };
    installed.map_err(|e| Error::Logging(format!("Failed to set global subscriber: {}", e)))?;

    LOGGING_INITIALIZED.store(true, Ordering::SeqCst);

    tracing::info!(
        service = %config.service_name,
        level = %config.level,
        json = %config.json_format,
        "Structured logging initialized"
    );

    Ok(())
}

impl TryFrom<config::Config> for LoggingConfig {
    type Error = config::ConfigError;

    fn try_from(cfg: config::Config) -> std::result::Result<Self, Self::Error> {
        // Start from defaults and selectively override from the provided config.
        let mut base = LoggingConfig::default();

        if let Ok(level) = cfg.get::<String>("logging.level") {
            base.level = level;
        }
        if let Ok(service_name) = cfg.get::<String>("logging.service_name") {
            base.service_name = service_name;
        }
        if let Ok(file_output) = cfg.get::<bool>("logging.file_output") {
            base.file_output = file_output;
        }
        if let Ok(log_dir) = cfg.get::<String>("logging.log_dir") {
            base.log_dir = Some(log_dir);
        }
        if let Ok(json_format) = cfg.get::<bool>("logging.json_format") {
            base.json_format = json_format;
        }

        Ok(base)
    }
}
