//! Crate-level error type for instrumentation setup failures.
//!
//! Application errors raised by instrumented operations never flow through
//! this type; those travel as [`crate::Fault`]. `Error` covers the
//! configure-time failures: unresolvable stats endpoints, socket setup,
//! malformed environment values.

use std::io;

/// Errors raised while configuring the instrumentation layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or unresolvable configuration (endpoint, port, namespace).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Transport setup failed (socket bind, non-blocking mode).
    #[error("transport setup failed: {source}")]
    Transport {
        /// Underlying IO error
        #[from]
        source: io::Error,
    },
}

/// Result type for instrumentation setup operations.
pub type Result<T> = std::result::Result<T, Error>;
