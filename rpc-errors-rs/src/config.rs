//! # Configuration
//!
//! Process-wide settings come from the environment (and optionally a TOML
//! file) through the `config` crate. Per-session switches live in
//! [`SessionConfig`] and are changed with string options by the session's
//! owner.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;
use crate::types::{Error, Result};

/// Session option enabling the `errorId` correlation id and error caching
pub const ENRICHMENT_ENABLED_KEY: &str = "phoenix.errors.enrichment.enabled";

/// Session option enabling the server-side stack trace in status metadata
pub const SERVER_STACK_TRACE_ENABLED_KEY: &str = "phoenix.errors.serverStackTrace.enabled";

/// Prefix for environment variables, e.g. `PHOENIX_ERRORS__STACK_TRACE_MAX_SIZE`
pub const ENV_PREFIX: &str = "PHOENIX_ERRORS";

const DEFAULT_STACK_TRACE_MAX_SIZE: usize = 1024;

/// Per-session error reporting switches. Both are off by default so that
/// internals are not exposed unless a session asks for them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub enrichment_enabled: bool,
    #[serde(default)]
    pub server_stack_trace_enabled: bool,
}

impl SessionConfig {
    /// Applies a string session option
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let flag = match key {
            ENRICHMENT_ENABLED_KEY => &mut self.enrichment_enabled,
            SERVER_STACK_TRACE_ENABLED_KEY => &mut self.server_stack_trace_enabled,
            _ => return Err(Error::UnknownSessionOption(key.to_string())),
        };
        *flag = parse_bool(value).ok_or_else(|| Error::InvalidSessionOption {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Process-wide configuration of the error translation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Maximum length of the `stackTrace` metadata value. `None` disables
    /// server stack traces for every session.
    pub stack_trace_max_size: Option<usize>,
    /// Switches applied to newly created sessions
    pub session_defaults: SessionConfig,
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            stack_trace_max_size: Some(DEFAULT_STACK_TRACE_MAX_SIZE),
            session_defaults: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from `.env` and `PHOENIX_ERRORS__*` variables
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Loads configuration from an optional TOML file, overridden by the
    /// environment
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let cfg = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let server = Self::try_from(cfg)?;
        tracing::debug!(
            stack_trace_max_size = ?server.stack_trace_max_size,
            enrichment = server.session_defaults.enrichment_enabled,
            server_stack_trace = server.session_defaults.server_stack_trace_enabled,
            "Loaded error translation configuration"
        );
        Ok(server)
    }
}

impl TryFrom<config::Config> for ServerConfig {
    type Error = config::ConfigError;

    fn try_from(cfg: config::Config) -> std::result::Result<Self, Self::Error> {
        // Start from defaults and selectively override from the provided config.
        let mut base = ServerConfig::default();

        match cfg.get::<i64>("stack_trace_max_size") {
            Ok(size) if size > 0 => base.stack_trace_max_size = Some(size as usize),
            Ok(_) => base.stack_trace_max_size = None,
            Err(config::ConfigError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        if let Ok(enabled) = cfg.get::<bool>("session.enrichment_enabled") {
            base.session_defaults.enrichment_enabled = enabled;
        }
        if let Ok(enabled) = cfg.get::<bool>("session.server_stack_trace_enabled") {
            base.session_defaults.server_stack_trace_enabled = enabled;
        }
        base.logging = LoggingConfig::try_from(cfg)?;

        Ok(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_defaults_are_off() {
        let config = SessionConfig::default();
        assert!(!config.enrichment_enabled);
        assert!(!config.server_stack_trace_enabled);
    }

    #[test]
    fn test_session_set() {
        let mut config = SessionConfig::default();
        config.set(ENRICHMENT_ENABLED_KEY, "true").unwrap();
        config.set(SERVER_STACK_TRACE_ENABLED_KEY, "ON").unwrap();
        assert!(config.enrichment_enabled);
        assert!(config.server_stack_trace_enabled);

        config.set(ENRICHMENT_ENABLED_KEY, "false").unwrap();
        assert!(!config.enrichment_enabled);
    }

    #[test]
    fn test_session_set_rejects_bad_input() {
        let mut config = SessionConfig::default();
        assert!(matches!(
            config.set(ENRICHMENT_ENABLED_KEY, "sometimes"),
            Err(Error::InvalidSessionOption { .. })
        ));
        assert!(matches!(
            config.set("phoenix.errors.unknown", "true"),
            Err(Error::UnknownSessionOption(_))
        ));
    }

    #[test]
    fn test_try_from_config() {
        let cfg = config::Config::builder()
            .set_override("stack_trace_max_size", 256)
            .unwrap()
            .set_override("session.enrichment_enabled", true)
            .unwrap()
            .set_override("logging.level", "debug")
            .unwrap()
            .build()
            .unwrap();

        let server = ServerConfig::try_from(cfg).unwrap();
        assert_eq!(server.stack_trace_max_size, Some(256));
        assert!(server.session_defaults.enrichment_enabled);
        assert!(!server.session_defaults.server_stack_trace_enabled);
        assert_eq!(server.logging.level, "debug");
    }

    #[test]
    fn test_non_positive_size_disables_stack_traces() {
        let cfg = config::Config::builder()
            .set_override("stack_trace_max_size", 0)
            .unwrap()
            .build()
            .unwrap();

        let server = ServerConfig::try_from(cfg).unwrap();
        assert_eq!(server.stack_trace_max_size, None);
    }

    #[test]
    fn test_default_server_config() {
        let server = ServerConfig::default();
        assert_eq!(server.stack_trace_max_size, Some(1024));
    }
}
