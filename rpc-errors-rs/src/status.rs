//! # Status Construction
//!
//! Builds the compact status that terminates a failed RPC. The status holds
//! an `ErrorInfo` detail whose metadata tells the client the failure's class
//! hierarchy and, when the session opted in, a correlation id for
//! `FetchErrorDetails` and a bounded server stack trace.

use std::collections::HashMap;
use std::sync::Arc;

use tonic::{Code, Status};
use tonic_types::{ErrorDetails, ErrorInfo, StatusExt};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::failure::Failure;
use crate::hierarchy;
use crate::session::SessionHolder;
use crate::truncate::{abbreviate, truncate, MAX_MESSAGE_LENGTH};

/// `ErrorInfo.domain` of every status built here
pub const ERROR_DOMAIN: &str = "phoenix.orch";

pub const CLASSES_KEY: &str = "classes";
pub const ERROR_ID_KEY: &str = "errorId";
pub const STACK_TRACE_KEY: &str = "stackTrace";
pub const ERROR_CLASS_KEY: &str = "errorClass";
pub const MESSAGE_PARAMETERS_KEY: &str = "messageParameters";

/// Produces the human-readable top-level message of a status
pub trait ErrorMessageFormatter: Send + Sync {
    fn format(&self, failure: &Failure) -> String;
}

/// Uses the failure's own message, or an empty string when it has none
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultMessageFormatter;

impl ErrorMessageFormatter for DefaultMessageFormatter {
    fn format(&self, failure: &Failure) -> String {
        failure
            .message()
            .map(|m| abbreviate(m, MAX_MESSAGE_LENGTH).into_owned())
            .unwrap_or_default()
    }
}

/// Status ready to be sent to the client
#[derive(Debug, Clone)]
pub struct WireStatus {
    pub code: Code,
    pub message: String,
    pub error_info: Option<ErrorInfo>,
}

impl WireStatus {
    /// Status for failures that matched no classification rule that builds
    /// metadata: `UNKNOWN`, abbreviated message, no details.
    pub fn unknown(failure: &Failure) -> Self {
        Self {
            code: Code::Unknown,
            message: abbreviate(failure.message().unwrap_or_default(), MAX_MESSAGE_LENGTH)
                .into_owned(),
            error_info: None,
        }
    }

    /// Looks up an `ErrorInfo` metadata value
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.error_info
            .as_ref()
            .and_then(|info| info.metadata.get(key))
            .map(String::as_str)
    }

    pub fn into_status(self) -> Status {
        match self.error_info {
            Some(info) => Status::with_error_details(
                self.code,
                self.message,
                ErrorDetails::with_error_info(info.reason, info.domain, info.metadata),
            ),
            None => Status::new(self.code, self.message),
        }
    }
}

impl From<WireStatus> for Status {
    fn from(status: WireStatus) -> Self {
        status.into_status()
    }
}

/// Converts classified failures into `INTERNAL` statuses
pub struct StatusBuilder<'a> {
    config: &'a ServerConfig,
    formatter: &'a dyn ErrorMessageFormatter,
}

impl<'a> StatusBuilder<'a> {
    pub fn new(config: &'a ServerConfig, formatter: &'a dyn ErrorMessageFormatter) -> Self {
        Self { config, formatter }
    }

    /// Builds the status for `failure`.
    ///
    /// With enrichment enabled on the session, a fresh correlation id is
    /// generated and `failure` is stored under it in the session's error
    /// cache.
    pub fn build(&self, failure: &Arc<Failure>, session: &SessionHolder) -> WireStatus {
        let session_config = session.config();
        let mut metadata = HashMap::new();

        let classes = hierarchy::resolve_names(Some(failure.class()));
        metadata.insert(CLASSES_KEY.to_string(), to_json(&classes));

        if session_config.enrichment_enabled {
            let error_id = Uuid::new_v4().to_string();
            metadata.insert(ERROR_ID_KEY.to_string(), error_id.clone());
            session.error_cache().insert(error_id, Arc::clone(failure));
        }

        if session_config.server_stack_trace_enabled {
            if let Some(max_size) = self.config.stack_trace_max_size {
                let stack_trace = failure.render_stack_trace();
                metadata.insert(
                    STACK_TRACE_KEY.to_string(),
                    truncate(&stack_trace, max_size).into_owned(),
                );
            }
        }

        if let Some(structured) = failure.structured() {
            metadata.insert(ERROR_CLASS_KEY.to_string(), structured.error_class.clone());
            metadata.insert(
                MESSAGE_PARAMETERS_KEY.to_string(),
                to_json(&structured.message_parameters),
            );
        }

        let message = self.formatter.format(failure);
        WireStatus {
            code: Code::Internal,
            message: abbreviate(&message, MAX_MESSAGE_LENGTH).into_owned(),
            error_info: Some(ErrorInfo {
                reason: failure.class().name().to_string(),
                domain: ERROR_DOMAIN.to_string(),
                metadata,
            }),
        }
    }
}

// Vectors and maps of strings always serialize
fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::failure::StackFrame;
    use crate::hierarchy::{ANALYSIS_ERROR, PANIC, RUNTIME_ERROR};
    use crate::session::SessionKey;

    fn session(enrichment: bool, stack_trace: bool) -> SessionHolder {
        SessionHolder::new(
            SessionKey::new("alice", "s1"),
            SessionConfig {
                enrichment_enabled: enrichment,
                server_stack_trace_enabled: stack_trace,
            },
        )
    }

    fn deep_failure() -> Arc<Failure> {
        let frames: Vec<_> = (0..200)
            .map(|i| StackFrame::new("exec::Operator", format!("step_{i}"), Some("operator.rs"), i))
            .collect();
        Arc::new(Failure::new(&RUNTIME_ERROR, "division by zero").with_stack_trace(frames))
    }

    #[test]
    fn test_build_default_session() {
        let config = ServerConfig::default();
        let builder = StatusBuilder::new(&config, &DefaultMessageFormatter);
        let session = session(false, false);

        let status = builder.build(&deep_failure(), &session);
        assert_eq!(status.code, Code::Internal);
        assert_eq!(status.message, "division by zero");

        let info = status.error_info.as_ref().unwrap();
        assert_eq!(info.reason, "phoenix::RuntimeError");
        assert_eq!(info.domain, ERROR_DOMAIN);
        assert_eq!(
            status.metadata(CLASSES_KEY),
            Some(r#"["phoenix::RuntimeError","phoenix::Error"]"#)
        );
        assert!(status.metadata(ERROR_ID_KEY).is_none());
        assert!(status.metadata(STACK_TRACE_KEY).is_none());
        assert!(session.error_cache().is_empty());
    }

    #[test]
    fn test_enrichment_caches_failure() {
        let config = ServerConfig::default();
        let builder = StatusBuilder::new(&config, &DefaultMessageFormatter);
        let session = session(true, false);
        let failure = deep_failure();

        let first = builder.build(&failure, &session);
        let second = builder.build(&failure, &session);

        let first_id = first.metadata(ERROR_ID_KEY).unwrap();
        let second_id = second.metadata(ERROR_ID_KEY).unwrap();
        assert_ne!(first_id, second_id);
        assert!(Uuid::parse_str(first_id).is_ok());
        assert_eq!(session.error_cache().len(), 2);
        assert!(Arc::ptr_eq(&session.error_cache().get(first_id).unwrap(), &failure));
    }

    #[test]
    fn test_stack_trace_is_bounded() {
        let config = ServerConfig {
            stack_trace_max_size: Some(300),
            ..ServerConfig::default()
        };
        let builder = StatusBuilder::new(&config, &DefaultMessageFormatter);

        let status = builder.build(&deep_failure(), &session(false, true));
        let stack_trace = status.metadata(STACK_TRACE_KEY).unwrap();
        assert!(stack_trace.chars().count() <= 300);
        assert!(stack_trace.starts_with("phoenix::RuntimeError: division by zero"));
    }

    #[test]
    fn test_stack_trace_needs_server_limit() {
        let config = ServerConfig {
            stack_trace_max_size: None,
            ..ServerConfig::default()
        };
        let builder = StatusBuilder::new(&config, &DefaultMessageFormatter);

        let status = builder.build(&deep_failure(), &session(true, true));
        assert!(status.metadata(STACK_TRACE_KEY).is_none());
        assert!(status.metadata(ERROR_ID_KEY).is_some());
    }

    #[test]
    fn test_structured_metadata() {
        let config = ServerConfig::default();
        let builder = StatusBuilder::new(&config, &DefaultMessageFormatter);
        let failure = Arc::new(
            Failure::new(&ANALYSIS_ERROR, "Column `price` cannot be resolved")
                .with_error_class("UNRESOLVED_COLUMN", [("name", "price"), ("table", "sales")]),
        );

        let status = builder.build(&failure, &session(false, false));
        assert_eq!(status.metadata(ERROR_CLASS_KEY), Some("UNRESOLVED_COLUMN"));
        assert_eq!(
            status.metadata(MESSAGE_PARAMETERS_KEY),
            Some(r#"{"name":"price","table":"sales"}"#)
        );
    }

    #[test]
    fn test_long_message_is_abbreviated() {
        struct Verbose;
        impl ErrorMessageFormatter for Verbose {
            fn format(&self, _failure: &Failure) -> String {
                "z".repeat(10_000)
            }
        }

        let config = ServerConfig::default();
        let builder = StatusBuilder::new(&config, &Verbose);
        let status = builder.build(&deep_failure(), &session(false, false));
        assert_eq!(status.message.chars().count(), MAX_MESSAGE_LENGTH);
    }

    #[test]
    fn test_unknown_status() {
        let long = Failure::new(&PANIC, "p".repeat(5000));
        let status = WireStatus::unknown(&long);
        assert_eq!(status.code, Code::Unknown);
        assert_eq!(status.message.chars().count(), 2048);
        assert!(status.error_info.is_none());

        let short = Failure::new(&PANIC, "index out of bounds");
        assert_eq!(WireStatus::unknown(&short).message, "index out of bounds");
    }

    #[test]
    fn test_into_tonic_status_carries_error_info() {
        let config = ServerConfig::default();
        let builder = StatusBuilder::new(&config, &DefaultMessageFormatter);
        let status = builder.build(&deep_failure(), &session(true, false)).into_status();

        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "division by zero");
        let info = status.get_details_error_info().unwrap();
        assert_eq!(info.reason, "phoenix::RuntimeError");
        assert_eq!(info.domain, ERROR_DOMAIN);
        assert!(info.metadata.contains_key(ERROR_ID_KEY));
    }
}
