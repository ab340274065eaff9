//! Host-level error type.
//!
//! The plugin engine keeps its own error taxonomy; everything that reaches
//! the host binary is folded into [`AppError`], tagged with an [`ErrorKind`]
//! that decides how the host reacts (exit code, log level).

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Category of a host-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad configuration file, bad catalog entry, duplicate id, cycle.
    Configuration,
    /// A required plugin failed to come up.
    Activation,
    /// A fatal hook handler failed.
    Handler,
    /// Unloading targeted a plugin that was already gone.
    Unload,
    /// A referenced plugin or resource does not exist.
    NotFound,
    /// A connector command was malformed or unknown.
    Command,
    Io,
    Serialization,
}

impl ErrorKind {
    /// Stable lowercase code, used in log output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Activation => "activation",
            Self::Handler => "handler",
            Self::Unload => "unload",
            Self::NotFound => "not_found",
            Self::Command => "command",
            Self::Io => "io",
            Self::Serialization => "serialization",
        }
    }

    /// Process exit code the host uses when it stops on this kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration | Self::Serialization => 78,
            Self::Activation | Self::Handler => 70,
            Self::Io => 74,
            Self::Unload | Self::NotFound | Self::Command => 1,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An error surfaced to the host, with an optional underlying cause.
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Wraps `source`, keeping it reachable through [`StdError::source`].
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn command(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Command, message)
    }

    /// Exit code for this error; see [`ErrorKind::exit_code`].
    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        let message = format!("cannot read configuration: {err}");
        Self::with_source(ErrorKind::Configuration, message, err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        let message = format!("invalid JSON value: {err}");
        Self::with_source(ErrorKind::Serialization, message, err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        let message = format!("I/O failure: {err}");
        Self::with_source(ErrorKind::Io, message, err)
    }
}
