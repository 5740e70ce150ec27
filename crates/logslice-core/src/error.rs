//! Error types for window slicing and log retrieval.

use thiserror::Error;

use crate::types::TimeInterval;

/// Errors that can abort a retrieval run.
///
/// Every variant is fatal for the run that produced it: nothing is retried.
#[derive(Debug, Error)]
pub enum SliceError {
    /// The server answered with a status other than 200.
    #[error("the server returned {status} ({reason}) for {url}")]
    Transport {
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase for the status.
        reason: String,
        /// The request URL.
        url: String,
    },

    /// The request never produced a status (connection, TLS, body read).
    #[error("request failed: {0}")]
    Request(String),

    /// An interval with `start > end` was requested.
    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    /// Window tuning parameters are out of range.
    #[error("invalid window policy: {0}")]
    InvalidPolicy(String),

    /// A window at the minimum delta still exceeds the page limit.
    #[error("window {window} still holds {count} entries at the minimum window size")]
    Saturated {
        /// The smallest window that was probed.
        window: TimeInterval,
        /// The count reported for it.
        count: u64,
    },

    /// Sizing a single window took more count requests than allowed.
    #[error("gave up sizing the window starting at {cursor} after {probes} count requests")]
    ProbeLimit {
        /// Start of the window being sized.
        cursor: String,
        /// Number of count requests issued.
        probes: u32,
    },

    /// The count pattern for a source could not be compiled.
    #[error("invalid count pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A search response was not valid JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing the output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for slicing operations.
pub type Result<T> = std::result::Result<T, SliceError>;
