//! Error types for GPIO and PWM control
//!
//! Every operation in this crate reports failures through [`Error`]. The
//! taxonomy is deliberately small:
//!
//! - **InvalidArgument**: out-of-range pin offset, duty cycle above 100%,
//!   empty chip path, inconsistent configuration
//! - **ResourceUnavailable**: chip could not be opened, line request denied
//! - **Io**: a write to the device interface did not complete
//! - **Config**: configuration file could not be read or parsed

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    ResourceUnavailable,
    Io,
    Config,
}

/// Errors returned by GPIO, PWM and backlight operations
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied value is out of range or missing
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A chip or line could not be obtained
    #[error("{resource} unavailable: {reason}")]
    ResourceUnavailable { resource: String, reason: String },

    /// A device write (or read) failed or was short
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::ResourceUnavailable { .. } => ErrorKind::ResourceUnavailable,
            Self::Io { .. } => ErrorKind::Io,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn unavailable(resource: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::ResourceUnavailable {
            resource: resource.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, Error>;
