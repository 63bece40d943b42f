//! # Failure Model
//!
//! A [`Failure`] is the value translated by this crate: a classed message
//! with an optional cause, captured stack frames, and optional structured
//! error metadata (an error class code plus named message parameters).

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::hierarchy::{self, FailureClass};

/// One frame of a failure's stack trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub declaring_type: String,
    pub method_name: String,
    pub file_name: Option<String>,
    pub line_number: i32,
}

impl StackFrame {
    pub fn new<D, M>(declaring_type: D, method_name: M, file_name: Option<&str>, line_number: i32) -> Self
    where
        D: Into<String>,
        M: Into<String>,
    {
        Self {
            declaring_type: declaring_type.into(),
            method_name: method_name.into(),
            file_name: file_name.map(str::to_string),
            line_number,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring_type, self.method_name)?;
        match &self.file_name {
            Some(file) if self.line_number >= 0 => write!(f, "({}:{})", file, self.line_number),
            Some(file) => write!(f, "({})", file),
            None => write!(f, "(Unknown Source)"),
        }
    }
}

/// Structured error metadata: a stable error class code and the named
/// parameters used to render its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredError {
    pub error_class: String,
    pub message_parameters: BTreeMap<String, String>,
}

/// A failure and its causal chain
#[derive(Debug, Clone)]
pub struct Failure {
    class: &'static FailureClass,
    message: Option<String>,
    cause: Option<Arc<Failure>>,
    stack_trace: Vec<StackFrame>,
    structured: Option<StructuredError>,
}

impl Failure {
    /// Creates a failure of the given class with a message
    pub fn new<S: Into<String>>(class: &'static FailureClass, message: S) -> Self {
        Self {
            class,
            message: Some(message.into()),
            cause: None,
            stack_trace: Vec::new(),
            structured: None,
        }
    }

    /// Creates a failure of the given class without a message
    pub fn bare(class: &'static FailureClass) -> Self {
        Self {
            class,
            message: None,
            cause: None,
            stack_trace: Vec::new(),
            structured: None,
        }
    }

    /// Chains this failure with its cause
    pub fn caused_by<C: Into<Arc<Failure>>>(mut self, cause: C) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn with_stack_trace(mut self, frames: Vec<StackFrame>) -> Self {
        self.stack_trace = frames;
        self
    }

    /// Attaches structured error metadata
    pub fn with_error_class<S, I, K, V>(mut self, error_class: S, parameters: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.structured = Some(StructuredError {
            error_class: error_class.into(),
            message_parameters: parameters
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        });
        self
    }

    /// Replaces the stack trace with the frames of the calling thread
    pub fn capture_stack_trace(mut self) -> Self {
        self.stack_trace = capture_frames();
        self
    }

    pub fn class(&self) -> &'static FailureClass {
        self.class
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn cause(&self) -> Option<&Arc<Failure>> {
        self.cause.as_ref()
    }

    pub fn stack_trace(&self) -> &[StackFrame] {
        &self.stack_trace
    }

    pub fn structured(&self) -> Option<&StructuredError> {
        self.structured.as_ref()
    }

    pub fn is_fatal(&self) -> bool {
        self.class.is_fatal()
    }

    /// Builds a failure chain from any std error, following `source()`.
    ///
    /// Every link is classed as [`hierarchy::RUNTIME_ERROR`]; links that are
    /// already [`Failure`]s keep their own class and chain.
    pub fn from_std_error(err: &(dyn StdError + 'static)) -> Self {
        if let Some(failure) = err.downcast_ref::<Failure>() {
            return failure.clone();
        }
        let failure = Self::new(&hierarchy::RUNTIME_ERROR, err.to_string());
        match err.source() {
            Some(source) => failure.caused_by(Self::from_std_error(source)),
            None => failure,
        }
    }

    /// Renders the failure and its causes as stack trace text
    pub fn render_stack_trace(&self) -> String {
        let mut out = String::new();
        let mut current = Some(self);
        let mut first = true;
        while let Some(failure) = current {
            if !first {
                out.push_str("Caused by: ");
            }
            first = false;
            let _ = writeln!(out, "{}", failure);
            for frame in &failure.stack_trace {
                let _ = writeln!(out, "\tat {}", frame);
            }
            current = failure.cause.as_deref();
        }
        out
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.class, message),
            None => write!(f, "{}", self.class),
        }
    }
}

impl StdError for Failure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn StdError + 'static))
    }
}

impl From<std::io::Error> for Failure {
    fn from(err: std::io::Error) -> Self {
        let failure = Self::new(&hierarchy::IO_ERROR, err.to_string());
        match err.source() {
            Some(source) => failure.caused_by(Self::from_std_error(source)),
            None => failure,
        }
    }
}

impl From<tokio::task::JoinError> for Failure {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            return Self::new(&hierarchy::INTERRUPTED, "task was cancelled");
        }
        match err.try_into_panic() {
            Ok(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned());
                match message {
                    Some(message) => Self::new(&hierarchy::PANIC, message),
                    None => Self::bare(&hierarchy::PANIC),
                }
            }
            Err(err) => Self::new(&hierarchy::RUNTIME_ERROR, err.to_string()),
        }
    }
}

fn capture_frames() -> Vec<StackFrame> {
    let trace = backtrace::Backtrace::new();
    let mut frames = Vec::new();
    for frame in trace.frames() {
        for symbol in frame.symbols() {
            let Some(name) = symbol.name() else {
                continue;
            };
            // `{:#}` drops the trailing symbol hash
            let path = format!("{:#}", name);
            let (declaring_type, method_name) = match path.rsplit_once("::") {
                Some((module, function)) => (module.to_string(), function.to_string()),
                None => (String::new(), path),
            };
            frames.push(StackFrame {
                declaring_type,
                method_name,
                file_name: symbol.filename().map(|p| p.display().to_string()),
                line_number: frame_line_number(symbol.lineno()),
            });
        }
    }
    frames
}

/// Wire line number of a captured frame, `-1` when unknown or out of range
fn frame_line_number(lineno: Option<u32>) -> i32 {
    lineno.and_then(|l| i32::try_from(l).ok()).unwrap_or(-1)
}
