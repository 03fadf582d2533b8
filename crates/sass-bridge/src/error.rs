//! Error types for the SASS bridge.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Errors fall into two groups:
//! - Local errors raised while building or marshaling values
//!   (`ValueError`, `SignatureError`, `HostError`, `EngineError`)
//! - The single `RenderError` shape every render job reports, regardless
//!   of whether it ran through the blocking or the async entry point

use serde::Serialize;
use thiserror::Error;

/// Message used when a host callable fails without saying why.
pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred";

/// Message used when a callable hands back something that is not a value.
pub const SASS_VALUE_EXPECTED: &str = "A SassValue object was expected";

/// Errors raised by value constructors, setters and host marshaling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// A constructor rejected its arguments
    #[error("{0}")]
    Construction(String),

    /// A value or argument had the wrong type
    #[error("{0}")]
    Type(String),

    /// Index outside a fixed-length list or map
    #[error("Out of bound index {index} for container of length {len}")]
    Range { index: usize, len: usize },
}

impl ValueError {
    pub(crate) fn construction(msg: impl Into<String>) -> Self {
        Self::Construction(msg.into())
    }

    pub(crate) fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }
}

/// A function signature that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid function signature `{signature}`: {reason}")]
pub struct SignatureError {
    pub signature: String,
    pub reason: String,
}

/// Failure raised by host code inside a custom function or importer.
///
/// Host callables return `Result<_, HostError>`, so both value constructor
/// failures and arbitrary `anyhow` errors propagate with `?`.
#[derive(Debug, Error)]
pub enum HostError {
    /// A fault with a message (a thrown error, an explicit failure)
    #[error("{0}")]
    Fault(String),

    /// A fault that carries no message at all
    #[error("{}", UNEXPECTED_ERROR)]
    Opaque,

    /// A value constructor or setter rejected its arguments
    #[error(transparent)]
    Value(#[from] ValueError),
}

impl HostError {
    /// Create a fault from any message. Empty messages become [`HostError::Opaque`].
    pub fn fault(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        if msg.trim().is_empty() {
            Self::Opaque
        } else {
            Self::Fault(msg)
        }
    }
}

impl From<anyhow::Error> for HostError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ValueError>() {
            Ok(value_err) => Self::Value(value_err),
            Err(other) => Self::fault(other.to_string()),
        }
    }
}

/// Errors produced while locating a native engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine could not be found at all
    #[error("{0}")]
    Missing(String),

    /// The engine was found but does not respond like one
    #[error("Engine at {path} is not usable: {reason}")]
    Unusable { path: String, reason: String },
}

/// A syntax or semantic failure reported by the native engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompileError {
    pub message: String,
    /// 1-based line
    pub line: Option<usize>,
    /// 1-based column
    pub column: Option<usize>,
    pub file: Option<String>,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Attach a source location.
    pub fn at(mut self, file: impl Into<String>, line: usize, column: usize) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CompileError {}

/// Which part of the bridge a render failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Malformed or conflicting options
    Options,
    /// Syntax or semantic failure inside the engine
    Compile,
    /// An importer returned or raised an error
    Importer,
    /// A custom function returned something that is not a value
    Value,
    /// A value constructor or setter failed inside a callable
    ValueConstruction,
    /// A callable raised a fault
    HostFault,
    /// The native engine could not be located
    EngineMissing,
}

impl ErrorKind {
    /// Exit-style status reported alongside the message.
    pub fn status(self) -> u32 {
        match self {
            ErrorKind::Options => 3,
            ErrorKind::EngineMissing => 4,
            _ => 1,
        }
    }
}

/// The normalized error every render job reports.
///
/// Serializes to `{message, status, line?, column?, file?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct RenderError {
    #[serde(skip)]
    pub kind: ErrorKind,
    pub message: String,
    pub status: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl RenderError {
    /// Create an error of the given kind without a source location.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: kind.status(),
            line: None,
            column: None,
            file: None,
        }
    }

    pub fn options(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Options, message)
    }

    pub fn engine_missing(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EngineMissing, message)
    }

    /// Render the error the way the engine prints it on a terminal.
    pub fn formatted(&self) -> String {
        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(column)) => format!(
                "Error: {}\n        on line {}:{} of {}",
                self.message, line, column, file
            ),
            (None, Some(line), Some(column)) => {
                format!("Error: {}\n        on line {}:{}", self.message, line, column)
            }
            _ => format!("Error: {}", self.message),
        }
    }

    /// Serialize to the JSON error shape.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// A custom function or importer invocation that failed.
///
/// The engine only needs the message to abort compilation; the kind is
/// kept so the final render error reports where the failure came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl CallFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CallFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CallFailure {}

impl From<CallFailure> for CompileError {
    fn from(failure: CallFailure) -> Self {
        CompileError::new(failure.message)
    }
}

impl From<CallFailure> for RenderError {
    fn from(failure: CallFailure) -> Self {
        RenderError::new(failure.kind, failure.message)
    }
}

impl From<CompileError> for RenderError {
    fn from(err: CompileError) -> Self {
        Self {
            kind: ErrorKind::Compile,
            status: ErrorKind::Compile.status(),
            message: err.message,
            line: err.line,
            column: err.column,
            file: err.file,
        }
    }
}

impl From<EngineError> for RenderError {
    fn from(err: EngineError) -> Self {
        Self::engine_missing(err.to_string())
    }
}

impl From<SignatureError> for RenderError {
    fn from(err: SignatureError) -> Self {
        Self::options(err.to_string())
    }
}
