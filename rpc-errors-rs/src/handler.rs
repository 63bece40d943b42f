//! # RPC Error Handler
//!
//! [`ErrorHandler`] is created per RPC invocation and consumed by
//! [`ErrorHandler::handle`], which turns a failure into the status that
//! terminates the response stream.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tonic::{Code, Status};
use tracing::Level;

use crate::classify::{classify, FailureKind};
use crate::config::ServerConfig;
use crate::context::InvocationContext;
use crate::failure::Failure;
use crate::monitoring;
use crate::session::SessionProvider;
use crate::status::{
    DefaultMessageFormatter, ErrorMessageFormatter, StatusBuilder, WireStatus, ERROR_ID_KEY,
};

/// Lifecycle notifications of the execution an RPC belongs to
pub trait ExecutionEvents: Send + Sync {
    fn post_canceled(&self);
    fn post_failed(&self, error_message: &str);
}

/// Destination of the terminating status. Consumed on delivery.
pub trait ErrorSink {
    fn send_error(self, status: Status);
}

impl<T: Send + 'static> ErrorSink for mpsc::Sender<Result<T, Status>> {
    fn send_error(self, status: Status) {
        match self.try_send(Err(status)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(item)) => match Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if self.send(item).await.is_err() {
                            tracing::debug!("Response stream closed before error delivery");
                        }
                    });
                }
                // No runtime to defer to; wait for the consumer to make room
                Err(_) => {
                    if self.blocking_send(item).is_err() {
                        tracing::debug!("Response stream closed before error delivery");
                    }
                }
            },
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Response stream closed before error delivery");
            }
        }
    }
}

impl<T> ErrorSink for mpsc::UnboundedSender<Result<T, Status>> {
    fn send_error(self, status: Status) {
        if self.send(Err(status)).is_err() {
            tracing::debug!("Response stream closed before error delivery");
        }
    }
}

impl ErrorSink for oneshot::Sender<Status> {
    fn send_error(self, status: Status) {
        if self.send(status).is_err() {
            tracing::debug!("Unary caller went away before error delivery");
        }
    }
}

/// Outcome of a handled failure
#[derive(Debug, Clone)]
pub struct HandledError {
    pub kind: FailureKind,
    pub code: Code,
    /// Severity the failure was logged at
    pub level: Level,
    pub server_fault: bool,
    /// Correlation id when the session has enrichment enabled
    pub error_id: Option<String>,
}

/// Error handling strategy bound to one RPC invocation
pub struct ErrorHandler<S> {
    context: InvocationContext,
    sessions: Arc<dyn SessionProvider>,
    config: Arc<ServerConfig>,
    formatter: Arc<dyn ErrorMessageFormatter>,
    events: Option<Arc<dyn ExecutionEvents>>,
    interrupted: bool,
    sink: S,
}

impl<S: ErrorSink> ErrorHandler<S> {
    pub fn new(
        context: InvocationContext,
        sessions: Arc<dyn SessionProvider>,
        config: Arc<ServerConfig>,
        sink: S,
    ) -> Self {
        Self {
            context,
            sessions,
            config,
            formatter: Arc::new(DefaultMessageFormatter),
            events: None,
            interrupted: false,
            sink,
        }
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn ErrorMessageFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Attaches the execution the invocation runs. Failures of an execution
    /// are expected user errors and are logged at INFO.
    pub fn with_events(mut self, events: Arc<dyn ExecutionEvents>) -> Self {
        self.events = Some(events);
        self
    }

    /// Marks the failure as the result of an explicit cancellation
    pub fn interrupted(mut self, interrupted: bool) -> Self {
        self.interrupted = interrupted;
        self
    }

    /// Terminates the stream with the status for `failure`.
    ///
    /// Fatal failures are returned unchanged in `Err` and the sink is left
    /// untouched; the caller must let them reach its own fault handling.
    pub fn handle(self, failure: Failure) -> Result<HandledError, Failure> {
        let ctx = &self.context;
        let session = self.sessions.get_or_create(&ctx.user_id, &ctx.session_id);

        let failure = Arc::new(failure);
        let Some(classification) = classify(&failure) else {
            monitoring::record_propagated();
            return Err(Arc::try_unwrap(failure).unwrap_or_else(|shared| (*shared).clone()));
        };

        let wire = if classification.builds_metadata() {
            StatusBuilder::new(&self.config, self.formatter.as_ref())
                .build(&classification.status_failure, &session)
        } else {
            WireStatus::unknown(&classification.status_failure)
        };
        let error_id = wire.metadata(ERROR_ID_KEY).map(str::to_string);
        let code = wire.code;
        let status = wire.into_status();

        let server_fault = self.events.is_none() || !classification.kind.is_user_error();
        let level = if server_fault { Level::ERROR } else { Level::INFO };
        log_failure(level, ctx, &failure, &classification.log_failure);

        if let Some(events) = &self.events {
            if self.interrupted {
                events.post_canceled();
            } else {
                events.post_failed(status.message());
            }
        }

        monitoring::record_handled(classification.kind, code);
        self.sink.send_error(status);

        Ok(HandledError {
            kind: classification.kind,
            code,
            level,
            server_fault,
            error_id,
        })
    }
}

fn log_failure(level: Level, ctx: &InvocationContext, original: &Failure, reported: &Failure) {
    if level == Level::INFO {
        tracing::info!(
            operation = %ctx.operation,
            user_id = %ctx.user_id,
            session_id = %ctx.session_id,
            error = %original,
            reported = %reported,
            "Error during execution of {}", ctx.operation
        );
    } else {
        tracing::error!(
            operation = %ctx.operation,
            user_id = %ctx.user_id,
            session_id = %ctx.session_id,
            error = %original,
            reported = %reported,
            stack_trace = %original.render_stack_trace(),
            "RPC error during {}", ctx.operation
        );
    }
}
