//! # Failure Classification
//!
//! Decides how a failure is reported. Rules are evaluated in order and the
//! first match wins; a failure no rule accepts (a fatal one) is handed back
//! to the caller untouched.

use std::sync::Arc;

use crate::failure::Failure;
use crate::hierarchy::{EXECUTION_ERROR, FOREIGN_PROCESS_ERROR, PANIC};

/// Stack frame marker of the worker runner that executes user code out of
/// process
pub const USER_CODE_RUNNER_MARKER: &str = "udf::runner";

/// Which rule accepted a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// User code failed in a worker process; reported from the worker's failure
    ForeignUserCode,
    /// Structured or recoverable failure raised while serving the query
    Query,
    /// Anything else that is not fatal, e.g. a caught panic
    Unclassified,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ForeignUserCode => "foreign_user_code",
            FailureKind::Query => "query",
            FailureKind::Unclassified => "unclassified",
        }
    }

    /// User/query failures are expected outcomes of running client requests
    pub fn is_user_error(&self) -> bool {
        !matches!(self, FailureKind::Unclassified)
    }
}

/// Result of classifying a failure
#[derive(Debug, Clone)]
pub struct Classification {
    pub kind: FailureKind,
    /// The failure that gets logged
    pub log_failure: Arc<Failure>,
    /// The failure the status is built from
    pub status_failure: Arc<Failure>,
}

impl Classification {
    /// Whether the status carries `ErrorInfo` metadata (`INTERNAL`) rather
    /// than being a bare `UNKNOWN`
    pub fn builds_metadata(&self) -> bool {
        self.kind != FailureKind::Unclassified
    }
}

struct Rule {
    kind: FailureKind,
    matches: fn(&Failure) -> bool,
    target: fn(&Arc<Failure>) -> Arc<Failure>,
}

const RULES: &[Rule] = &[
    Rule {
        kind: FailureKind::ForeignUserCode,
        matches: is_foreign_user_code_failure,
        target: unwrap_cause,
    },
    Rule {
        kind: FailureKind::Query,
        matches: is_recoverable,
        target: Arc::clone,
    },
    Rule {
        kind: FailureKind::Unclassified,
        matches: is_not_fatal,
        target: Arc::clone,
    },
];

/// Classifies `failure`; `None` means it must be propagated unchanged
pub fn classify(failure: &Arc<Failure>) -> Option<Classification> {
    RULES.iter().find(|rule| (rule.matches)(failure)).map(|rule| {
        let target = (rule.target)(failure);
        Classification {
            kind: rule.kind,
            log_failure: target.clone(),
            status_failure: target,
        }
    })
}

/// An execution wrapper around a worker-process failure whose stack passes
/// through the user code runner
fn is_foreign_user_code_failure(failure: &Failure) -> bool {
    if !failure.class().is_a(&EXECUTION_ERROR) {
        return false;
    }
    failure.cause().is_some_and(|cause| {
        cause.class().is_a(&FOREIGN_PROCESS_ERROR)
            && cause
                .stack_trace()
                .iter()
                .any(|frame| frame.declaring_type.contains(USER_CODE_RUNNER_MARKER))
    })
}

fn is_recoverable(failure: &Failure) -> bool {
    !failure.is_fatal() && (failure.structured().is_some() || !failure.class().is_a(&PANIC))
}

fn is_not_fatal(failure: &Failure) -> bool {
    !failure.is_fatal()
}

fn unwrap_cause(failure: &Arc<Failure>) -> Arc<Failure> {
    failure.cause().cloned().unwrap_or_else(|| failure.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::StackFrame;
    use crate::hierarchy::{ANALYSIS_ERROR, OUT_OF_MEMORY, RUNTIME_ERROR, STACK_OVERFLOW};

    fn foreign_failure(frame_type: &str) -> Failure {
        Failure::new(&FOREIGN_PROCESS_ERROR, "ZeroDivisionError: division by zero")
            .with_stack_trace(vec![StackFrame::new(frame_type, "read_result", Some("runner.rs"), 71)])
    }

    #[test]
    fn test_unwraps_foreign_user_code() {
        let failure = Arc::new(
            Failure::new(&EXECUTION_ERROR, "Job aborted due to stage failure")
                .caused_by(foreign_failure("phoenix::udf::runner::WorkerRunner")),
        );

        let classification = classify(&failure).unwrap();
        assert_eq!(classification.kind, FailureKind::ForeignUserCode);
        assert_eq!(classification.status_failure.class(), &FOREIGN_PROCESS_ERROR);
        assert!(Arc::ptr_eq(&classification.status_failure, failure.cause().unwrap()));
        assert!(Arc::ptr_eq(&classification.log_failure, &classification.status_failure));
        assert!(classification.kind.is_user_error());
    }

    #[test]
    fn test_foreign_failure_without_marker_is_not_unwrapped() {
        let failure = Arc::new(
            Failure::new(&EXECUTION_ERROR, "Job aborted")
                .caused_by(foreign_failure("phoenix::exec::Shuffle")),
        );

        let classification = classify(&failure).unwrap();
        assert_eq!(classification.kind, FailureKind::Query);
        assert!(Arc::ptr_eq(&classification.status_failure, &failure));
    }

    #[test]
    fn test_marker_outside_wrapper_is_not_unwrapped() {
        let failure = Arc::new(
            Failure::new(&RUNTIME_ERROR, "wrapper")
                .caused_by(foreign_failure("phoenix::udf::runner::WorkerRunner")),
        );
        assert_eq!(classify(&failure).unwrap().kind, FailureKind::Query);
    }

    #[test]
    fn test_recoverable_failures() {
        for class in [&RUNTIME_ERROR, &ANALYSIS_ERROR] {
            let failure = Arc::new(Failure::new(class, "bad input"));
            let classification = classify(&failure).unwrap();
            assert_eq!(classification.kind, FailureKind::Query);
            assert!(classification.builds_metadata());
            assert!(Arc::ptr_eq(&classification.status_failure, &failure));
        }
    }

    #[test]
    fn test_structured_panic_is_treated_as_query_failure() {
        let failure = Arc::new(
            Failure::new(&PANIC, "assertion failed")
                .with_error_class("INTERNAL_ERROR", [("reason", "invariant broken")]),
        );
        assert_eq!(classify(&failure).unwrap().kind, FailureKind::Query);
    }

    #[test]
    fn test_panic_is_unclassified() {
        let failure = Arc::new(Failure::new(&PANIC, "index out of bounds"));
        let classification = classify(&failure).unwrap();
        assert_eq!(classification.kind, FailureKind::Unclassified);
        assert!(!classification.builds_metadata());
        assert!(!classification.kind.is_user_error());
    }

    #[test]
    fn test_fatal_failures_are_not_classified() {
        for class in [&OUT_OF_MEMORY, &STACK_OVERFLOW] {
            let failure = Arc::new(Failure::new(class, "unrecoverable"));
            assert!(classify(&failure).is_none());
        }
    }

    #[test]
    fn test_structured_fatal_failure_is_not_classified() {
        let failure = Arc::new(
            Failure::new(&OUT_OF_MEMORY, "heap exhausted")
                .with_error_class("MEMORY_LIMIT", [("limit", "4g")]),
        );
        assert!(classify(&failure).is_none());
    }
}
