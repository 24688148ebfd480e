//! Error types for the tattle telemetry library.

use thiserror::Error;

/// The main error type for all tattle operations.
///
/// Every failure mode degrades to "pending data stays queued, try again on
/// the next trigger" — no variant is fatal to the host process.
#[derive(Error, Debug)]
pub enum TattleError {
    /// Error delivering a payload to the remote collector.
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Error reading or writing the persistent state store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors that can occur when delivering a metric payload to the collector.
///
/// A `Delivered` outcome is only ever signalled by `Ok`; every variant here
/// means the pending collection for that kind must be retained unchanged
/// for a later attempt.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The payload could not be serialized to JSON. Not retryable as such,
    /// but the pending data is retained as-is.
    #[error("failed to encode payload: {source}")]
    Encode {
        /// The underlying JSON serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// The HTTP transport failed (unreachable network, timeout, TLS).
    #[error("transport failed: {source}")]
    Transport {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The collector responded with a status other than 200.
    #[error("collector rejected payload with status {status}: {body}")]
    Rejected {
        /// The HTTP status code.
        status: u16,
        /// The response body text, kept for diagnostics only.
        body: String,
    },

    /// Failed to construct the HTTP client.
    #[error("failed to create HTTP client: {source}")]
    ClientCreate {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
}

/// Errors that can occur when writing to the persistent state store.
///
/// Read-side decode failures are not represented here: a corrupted blob is
/// recovered locally by substituting the empty collection and is never
/// surfaced to the caller.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing file could not be read or written.
    #[error("failed to access state file '{path}': {source}")]
    Io {
        /// The path that could not be accessed.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize state to JSON.
    #[error("failed to serialize state: {source}")]
    Serialize {
        /// The underlying JSON serialization error.
        #[source]
        source: serde_json::Error,
    },
}

/// Type alias for `Result<T, TattleError>`.
pub type Result<T> = std::result::Result<T, TattleError>;
