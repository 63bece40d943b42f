//! # Error Details Service
//!
//! gRPC endpoint for `FetchErrorDetails`. A client that received a status
//! with an `errorId` calls it to retrieve the failure's flattened cause
//! chain. Each cached failure can be fetched once.

use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::chain::flatten;
use crate::proto::error_details_service_server::ErrorDetailsService;
use crate::proto::{FetchErrorDetailsRequest, FetchErrorDetailsResponse};
use crate::session::SessionProvider;

pub use crate::proto::error_details_service_server::ErrorDetailsServiceServer;

pub struct ErrorDetailsServer {
    sessions: Arc<dyn SessionProvider>,
}

impl ErrorDetailsServer {
    pub fn new(sessions: Arc<dyn SessionProvider>) -> Self {
        Self { sessions }
    }

    /// Wraps the server for registration with `tonic::transport::Server`
    pub fn into_service(self) -> ErrorDetailsServiceServer<Self> {
        ErrorDetailsServiceServer::new(self)
    }
}

#[tonic::async_trait]
impl ErrorDetailsService for ErrorDetailsServer {
    async fn fetch_error_details(
        &self,
        request: Request<FetchErrorDetailsRequest>,
    ) -> Result<Response<FetchErrorDetailsResponse>, Status> {
        let req = request.into_inner();

        if req.error_id.is_empty() {
            return Err(Status::invalid_argument("error_id must not be empty"));
        }

        let session = self.sessions.get(&req.user_id, &req.session_id).ok_or_else(|| {
            Status::not_found(format!(
                "Session {} for user {} not found",
                req.session_id, req.user_id
            ))
        })?;

        let Some(failure) = session.error_cache().take(&req.error_id) else {
            tracing::debug!(
                user_id = %req.user_id,
                session_id = %req.session_id,
                error_id = %req.error_id,
                "No cached failure for error id"
            );
            return Ok(Response::new(FetchErrorDetailsResponse::default()));
        };

        let include_stack_trace = session.config().server_stack_trace_enabled;
        let response = flatten(&failure, include_stack_trace);

        tracing::debug!(
            user_id = %req.user_id,
            session_id = %req.session_id,
            error_id = %req.error_id,
            records = response.errors.len(),
            "Returning error details"
        );

        Ok(Response::new(response))
    }
}
