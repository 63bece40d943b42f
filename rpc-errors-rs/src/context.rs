//! # Invocation Context
//!
//! Identifies the RPC an error handler is bound to. The fields are attached
//! to every log event the handler emits.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The RPC invocation an error belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationContext {
    /// Name of the RPC operation, e.g. `execute` or `analyze`
    pub operation: String,
    pub user_id: String,
    pub session_id: String,
}

impl InvocationContext {
    pub fn new<O, U, S>(operation: O, user_id: U, session_id: S) -> Self
    where
        O: Into<String>,
        U: Into<String>,
        S: Into<String>,
    {
        Self {
            operation: operation.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl fmt::Display for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [user: {}, session: {}]",
            self.operation, self.user_id, self.session_id
        )
    }
}
