//! Error types for the oracle boundary and configuration

use thiserror::Error;

/// Result type for oracle calls
pub type Result<T> = std::result::Result<T, OracleError>;

/// Failures at the boundary with an external oracle.
///
/// None of these are fatal: the run orchestrator substitutes a degraded
/// result and the conversation assembler appends an apology.
#[derive(Error, Debug)]
pub enum OracleError {
    /// The oracle could not be reached or refused the request
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// The oracle answered with something that is not a valid payload
    #[error("malformed oracle response: {0}")]
    Malformed(String),

    /// Process or pipe failure while talking to an external oracle
    #[error("oracle I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request or response (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while reading the session configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}
