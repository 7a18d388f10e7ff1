//! Error types for the vision-snip-core library.
//!
//! Startup and UI failures are [`AppError`]s. Failures of a single
//! capture-analyze cycle are split into [`CaptureError`] (before a request
//! exists) and [`VisionError`] (while talking to the vision API); neither of
//! those ends the session.

use std::fmt;
use thiserror::Error;

/// Errors that stop the application from starting or running its window.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (invalid values, unusable URLs).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required environment variable was not found.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Requested screen/monitor index was not found.
    #[error("Screen not found: index {0}")]
    ScreenNotFound(usize),

    /// The screen could not be reached at startup.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// UI-related errors (rendering, window management).
    #[error("UI error: {0}")]
    Ui(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a UI error with the given message.
    pub fn ui(msg: impl Into<String>) -> Self {
        Self::Ui(msg.into())
    }
}

/// Failures while turning a selection into pixels.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// No accessible screen buffer.
    #[error("Display unavailable: {0}")]
    DisplayUnavailable(String),

    /// The selection has no area, before or after clamping to the screen.
    #[error("Selection area is empty or invalid")]
    EmptyRegion,
}

impl CaptureError {
    pub fn display(msg: impl Into<String>) -> Self {
        Self::DisplayUnavailable(msg.into())
    }
}

/// The four ways an analysis request can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisErrorKind {
    /// Connectivity problems: DNS, refused connections, timeouts.
    Network,
    /// Missing or rejected credential.
    Auth,
    /// The API answered with an error or an unusable body.
    Api,
    /// The image could not be turned into a request payload.
    Encoding,
}

impl AnalysisErrorKind {
    /// Label written to the diagnostic log.
    pub fn log_label(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Auth => "AUTH_ERROR",
            Self::Api => "API_ERROR",
            Self::Encoding => "ENCODING_ERROR",
        }
    }
}

impl fmt::Display for AnalysisErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "Network error",
            Self::Auth => "Authentication error",
            Self::Api => "API error",
            Self::Encoding => "Encoding error",
        };
        f.write_str(name)
    }
}

/// A classified failure from the vision client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct VisionError {
    pub kind: AnalysisErrorKind,
    pub message: String,
}

impl VisionError {
    pub fn new(kind: AnalysisErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AnalysisErrorKind::Network, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(AnalysisErrorKind::Auth, message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(AnalysisErrorKind::Api, message)
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::new(AnalysisErrorKind::Encoding, message)
    }
}

/// A convenient alias for Result with [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
