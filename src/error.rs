//! Error taxonomy for the rewarder
//!
//! Read-side failures split into transient (retry the same range on the next
//! tick) and fatal (the endpoint rejected the request itself). Malformed logs
//! are skip-and-log, never loop-aborting. Submission failures are carried to
//! the controller as structured batch outcomes, not errors.

use std::time::Duration;

use alloy::primitives::B256;
use thiserror::Error;

/// Failure while reading chain state (head, logs, nonce).
#[derive(Debug, Error)]
pub enum QueryError {
    /// Rate limiting, timeouts, dropped connections. The cursor stays where
    /// it is and the same range is retried on the next tick.
    #[error("transient query failure: {0}")]
    Transient(String),

    /// The endpoint rejected the request itself, e.g. a malformed filter.
    #[error("query rejected: {0}")]
    Fatal(String),
}

impl QueryError {
    /// Classify an RPC error by its message. Unknown failures default to
    /// transient: retrying with an unchanged cursor is always safe.
    pub fn from_rpc<E: std::fmt::Display>(err: E) -> Self {
        let msg = err.to_string();
        let lower = msg.to_lowercase();
        if lower.contains("invalid") || lower.contains("unsupported") || lower.contains("malformed")
        {
            QueryError::Fatal(msg)
        } else {
            QueryError::Transient(msg)
        }
    }
}

/// A single log entry that does not match the shape its event kind requires.
///
/// Fatal for that one event only; the scan skips it and keeps going.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("log has {found} topics, expected at least {expected}")]
    MissingTopics { expected: usize, found: usize },
}

/// Failure while submitting a payment transaction or awaiting its receipt.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no signing account configured")]
    NoSigner,

    #[error("transaction submission failed: {0}")]
    Submission(String),

    #[error("transaction {0} unconfirmed after {1:?}")]
    ConfirmationTimeout(B256, Duration),

    #[error("receipt query failed for {0}: {1}")]
    Receipt(B256, String),
}
