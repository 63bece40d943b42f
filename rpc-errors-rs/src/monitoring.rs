//! Metrics for handled RPC errors.
//!
//! Uses the `metrics` facade; without an installed recorder the calls are
//! no-ops.

use metrics::counter;
use tonic::Code;

use crate::classify::FailureKind;

pub const HANDLED_ERRORS_METRIC: &str = "rpc_errors_handled_total";
pub const PROPAGATED_ERRORS_METRIC: &str = "rpc_errors_propagated_total";

/// Counts an error that terminated an RPC
pub fn record_handled(kind: FailureKind, code: Code) {
    counter!(HANDLED_ERRORS_METRIC, 1, "kind" => kind.as_str(), "code" => code_label(code));
}

/// Counts a fatal failure handed back to the caller
pub fn record_propagated() {
    counter!(PROPAGATED_ERRORS_METRIC, 1);
}

fn code_label(code: Code) -> &'static str {
    match code {
        Code::Internal => "internal",
        Code::Unknown => "unknown",
        _ => "other",
    }
}
