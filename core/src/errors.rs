//! Error types for the collection engine.
//!
//! None of these reach a scrape response: channel errors are absorbed by
//! [`CommandChannel`](crate::channel::CommandChannel) (empty output), parse
//! errors by the [`NodeCollector`](crate::collector::NodeCollector) (missing
//! metrics). Only [`ConfigError`] stops the process, at startup.

use thiserror::Error;

/// Top-level error type encompassing all core error categories.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A remote channel error.
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// A source could not be turned into metrics.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Invalid or missing configuration.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures establishing or using the remote session.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// TCP connection to the remote host failed or timed out.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The SSH handshake failed.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The remote host key was rejected by the verification policy.
    #[error("Host key verification failed: {0}")]
    HostKey(String),

    /// Authentication was rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// No session is open.
    #[error("Not connected")]
    NotConnected,

    /// Opening a channel, running the command or reading its output failed.
    #[error("Exec failed: {0}")]
    Exec(String),

    /// A low-level I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A statistics source was missing or did not have the expected shape.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The source was empty (missing file or failed command).
    #[error("{0} unavailable")]
    Unavailable(String),

    /// The source was present but could not be parsed.
    #[error("{path}: {reason}")]
    Malformed { path: String, reason: String },
}

impl ParseError {
    pub(crate) fn malformed(path: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Invalid exporter configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A variable holds an unusable value.
    #[error("invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}
