//! Error types for engine operations.

use thiserror::Error;

/// Errors produced by the aggregation engine.
///
/// Every variant is local and recoverable: a failed call leaves the ledger,
/// cached targets and observer chains exactly as they were.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QosError {
    /// Class name or index is not in the registry.
    #[error("unknown class: {0}")]
    UnknownClass(String),
    /// Handle was closed or never opened against this engine.
    #[error("invalid handle")]
    InvalidHandle,
    /// Malformed payload written through an external endpoint.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Engine used before class definitions were loaded.
    #[error("engine not initialized")]
    NotInitialized,
    /// Class definitions were already loaded.
    #[error("engine already initialized")]
    AlreadyInitialized,
    /// Class or pair definitions are inconsistent.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Application-facing result using anyhow for observer callbacks.
pub type AppResult<T> = Result<T, anyhow::Error>;
