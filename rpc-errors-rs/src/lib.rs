//! # RPC Error Translation
//!
//! Translates failures raised while serving Phoenix ORCH RPCs into gRPC
//! statuses, and serves the full cause chain of a failure on request.
//!
//! ## Features
//!
//! - Static failure class hierarchy reported to clients
//! - Ordered classification separating user/query failures from server faults
//! - Compact `ErrorInfo` statuses with bounded messages and stack traces
//! - Per-session enrichment with correlation ids and an error cache
//! - `FetchErrorDetails` service returning a bounded, flattened cause chain
//!

pub mod chain;
pub mod classify;
pub mod config;
pub mod context;
pub mod failure;
pub mod handler;
pub mod hierarchy;
pub mod logging;
pub mod monitoring;
pub mod service;
pub mod session;
pub mod status;
pub mod truncate;
pub mod types;

pub mod proto {
    tonic::include_proto!("phoenix.errors");
}

// Re-export commonly used types
pub use chain::{flatten, MAX_ERROR_CHAIN_LENGTH};
pub use classify::{classify, Classification, FailureKind};
pub use crate::config::{ServerConfig, SessionConfig};
pub use context::InvocationContext;
pub use failure::{Failure, StackFrame, StructuredError};
pub use handler::{ErrorHandler, ErrorSink, ExecutionEvents, HandledError};
pub use hierarchy::FailureClass;
pub use logging::{init_logging, LoggingConfig};
pub use service::{ErrorDetailsServer, ErrorDetailsServiceServer};
pub use session::{ErrorCache, SessionHolder, SessionKey, SessionManager, SessionProvider};
pub use status::{DefaultMessageFormatter, ErrorMessageFormatter, StatusBuilder, WireStatus};
pub use types::{Error, Result};

/// Loads the server configuration from the environment and initializes
/// logging with it
pub fn init() -> Result<ServerConfig> {
    let config = ServerConfig::load()?;
    init_logging(Some(config.logging.clone()))?;
    Ok(config)
}
