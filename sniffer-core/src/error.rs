//! Error types for the sniffer pipeline

use thiserror::Error;

/// Result type alias for sniffer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the sniffer workspace
#[derive(Error, Debug)]
pub enum Error {
    /// Interface not found
    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    /// Capture device could not be opened, activated or read
    #[error("Packet capture error: {0}")]
    Capture(String),

    /// Invalid configuration value
    #[error("Invalid configuration '{name}': {reason}")]
    InvalidConfig { name: String, reason: String },

    /// Record could not be serialized for the sink
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Sink construction or write error
    #[error("Sink error: {0}")]
    Sink(String),

    /// The sink could not be reached within the retry budget
    #[error("Sink unreachable after {attempts} attempts: {reason}")]
    SinkUnreachable { attempts: u32, reason: String },

    /// The sink refused the write call outright
    #[error("Sink rejected write: {0}")]
    SinkRejected(String),

    /// Pipeline lifecycle error (bad state transition, task failure)
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl Error {
    /// Create a capture error with a custom message
    pub fn capture<S: Into<String>>(msg: S) -> Self {
        Error::Capture(msg.into())
    }

    /// Create a sink error with a custom message
    pub fn sink<S: Into<String>>(msg: S) -> Self {
        Error::Sink(msg.into())
    }

    /// Create a pipeline error with a custom message
    pub fn pipeline<S: Into<String>>(msg: S) -> Self {
        Error::Pipeline(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Error::InvalidConfig {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
