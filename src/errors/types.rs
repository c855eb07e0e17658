//! Error type definitions for iptv-ranker
//!
//! This module defines the hierarchical error types used throughout the
//! crate. Only [`AppError`] ever escapes a run; [`ProbeError`] is data.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid or inconsistent run configuration (fatal, reported before probing)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Configuration could not be loaded or deserialized
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] Box<figment::Error>),

    /// Playlist acquisition errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Rendering or writing the ranked playlist failed
    #[error("Output error: {path:?} - {message}")]
    Output { path: PathBuf, message: String },

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Playlist acquisition specific errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// Upstream answered with a non-success status
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// The fetch did not complete within its deadline
    #[error("Connection timeout: {url}")]
    Timeout { url: String },

    /// Neither the remote playlist nor a local copy could be read
    #[error("Playlist unavailable: {message}")]
    Unavailable { message: String },
}

/// Reason a single probe failed
///
/// A failed probe always reports an infinite latency; the reason is kept for
/// logs and reports only and never influences ranking.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("name resolution failed: {0}")]
    Resolve(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("timed out")]
    TimedOut,

    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to start probe process: {0}")]
    Spawn(String),

    #[error("stream could not be decoded: {0}")]
    Decode(String),

    /// The run was cancelled or hit its overall deadline before this probe finished
    #[error("probe abandoned before completion")]
    Abandoned,
}

impl AppError {
    /// Create a configuration error with a custom message
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an output error for the given destination
    pub fn output<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Output {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a source error
    pub fn source_error<S: Into<String>>(message: S) -> Self {
        Self::Source(SourceError::Unavailable {
            message: message.into(),
        })
    }

    /// Whether this error was caused by configuration rather than the environment
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::ConfigLoad(_))
    }
}

impl From<figment::Error> for AppError {
    fn from(error: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(error))
    }
}

impl ProbeError {
    /// Short machine-friendly label used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::InvalidUrl(_) => "invalid_url",
            ProbeError::UnsupportedScheme(_) => "unsupported_scheme",
            ProbeError::Resolve(_) => "resolve",
            ProbeError::Connect(_) => "connect",
            ProbeError::TimedOut => "timeout",
            ProbeError::HttpStatus(_) => "http_status",
            ProbeError::Transport(_) => "transport",
            ProbeError::Spawn(_) => "spawn",
            ProbeError::Decode(_) => "decode",
            ProbeError::Abandoned => "abandoned",
        }
    }
}
