//! # Failure Class Hierarchy
//!
//! Failures carry a static class descriptor linked to its parent. The
//! resolver walks that link to produce the ancestry reported to clients
//! under the `classes` metadata key and in every fetched error record.

use std::fmt;

/// Static descriptor for the runtime type of a failure.
///
/// Classes form a single-inheritance tree rooted at [`FAILURE`]. Declare new
/// classes as statics so they can be referenced by `&'static` from failures:
///
/// ```
/// use rpc_errors::hierarchy::{FailureClass, RUNTIME_ERROR};
///
/// static PLAN_ERROR: FailureClass = FailureClass::new("planner::PlanError", Some(&RUNTIME_ERROR));
/// assert!(PLAN_ERROR.is_a(&RUNTIME_ERROR));
/// ```
#[derive(Debug)]
pub struct FailureClass {
    name: &'static str,
    parent: Option<&'static FailureClass>,
}

impl FailureClass {
    pub const fn new(name: &'static str, parent: Option<&'static FailureClass>) -> Self {
        Self { name, parent }
    }

    /// Fully-qualified class name
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parent(&self) -> Option<&'static FailureClass> {
        self.parent
    }

    /// Returns true if this class is `other` or descends from it
    pub fn is_a(&self, other: &FailureClass) -> bool {
        if self == other {
            return true;
        }
        let mut current = self.parent;
        while let Some(class) = current {
            if class == other {
                return true;
            }
            current = class.parent;
        }
        false
    }

    /// Fatal failures are never converted into a wire status
    pub fn is_fatal(&self) -> bool {
        self.is_a(&FATAL)
    }
}

impl PartialEq for FailureClass {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for FailureClass {}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Universal base class; never reported in a hierarchy
pub static FAILURE: FailureClass = FailureClass::new("phoenix::Failure", None);

// Recoverable errors
pub static ERROR: FailureClass = FailureClass::new("phoenix::Error", Some(&FAILURE));
pub static RUNTIME_ERROR: FailureClass = FailureClass::new("phoenix::RuntimeError", Some(&ERROR));
pub static INVALID_ARGUMENT: FailureClass =
    FailureClass::new("phoenix::InvalidArgumentError", Some(&RUNTIME_ERROR));
pub static ILLEGAL_STATE: FailureClass =
    FailureClass::new("phoenix::IllegalStateError", Some(&RUNTIME_ERROR));
pub static UNSUPPORTED_OPERATION: FailureClass =
    FailureClass::new("phoenix::UnsupportedOperationError", Some(&RUNTIME_ERROR));
pub static IO_ERROR: FailureClass = FailureClass::new("phoenix::IoError", Some(&ERROR));
pub static QUERY_ERROR: FailureClass = FailureClass::new("phoenix::query::QueryError", Some(&ERROR));
pub static ANALYSIS_ERROR: FailureClass =
    FailureClass::new("phoenix::query::AnalysisError", Some(&QUERY_ERROR));

/// Wrapper raised by the execution engine around task failures
pub static EXECUTION_ERROR: FailureClass =
    FailureClass::new("phoenix::exec::ExecutionError", Some(&ERROR));

/// Failure of user code that ran in a separate worker process
pub static FOREIGN_PROCESS_ERROR: FailureClass =
    FailureClass::new("phoenix::exec::ForeignProcessError", Some(&RUNTIME_ERROR));

// Unrecoverable conditions
pub static FATAL: FailureClass = FailureClass::new("phoenix::Fatal", Some(&FAILURE));
pub static OUT_OF_MEMORY: FailureClass = FailureClass::new("phoenix::OutOfMemory", Some(&FATAL));
pub static STACK_OVERFLOW: FailureClass = FailureClass::new("phoenix::StackOverflow", Some(&FATAL));
pub static INTERRUPTED: FailureClass = FailureClass::new("phoenix::Interrupted", Some(&FATAL));
pub static LINKAGE_ERROR: FailureClass = FailureClass::new("phoenix::LinkageError", Some(&FATAL));

/// A panic caught at a task boundary. Neither recoverable nor fatal: it is
/// reported with an `UNKNOWN` status.
pub static PANIC: FailureClass = FailureClass::new("phoenix::Panic", Some(&FAILURE));

/// Resolves the ancestry of `class`, self first, stopping before [`FAILURE`].
pub fn resolve(class: Option<&'static FailureClass>) -> Vec<&'static FailureClass> {
    let mut hierarchy = Vec::new();
    let mut current = class;
    while let Some(class) = current {
        if *class == FAILURE {
            break;
        }
        hierarchy.push(class);
        current = class.parent;
    }
    hierarchy
}

/// Same as [`resolve`] but returns the class names
pub fn resolve_names(class: Option<&'static FailureClass>) -> Vec<String> {
    resolve(class).into_iter().map(|c| c.name.to_string()).collect()
}
