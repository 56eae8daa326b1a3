//! Error taxonomy for the navigation engine.

use ink_core::{CoreError, PageId};
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while navigating, purchasing, or persisting.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A story, page, or choice lookup failed. Fatal for the request.
    #[error("not found: {0}")]
    NotFound(#[from] CoreError),

    /// The requested choice does not depart from the reader's current page.
    /// Stale client state; recoverable by calling `resume` and retrying.
    #[error("invalid transition: reader is at page {at}, choice departs from {from}")]
    InvalidTransition {
        /// The reader's committed current page.
        at: PageId,
        /// The page the requested choice departs from.
        from: PageId,
    },

    /// The reader cannot afford the premium choice. User-actionable; never
    /// retried automatically.
    #[error("insufficient funds: cost {cost}, balance {balance}")]
    InsufficientFunds {
        /// Price of the requested unlock.
        cost: u32,
        /// The reader's balance at evaluation time.
        balance: u64,
    },

    /// An idempotency key was replayed with different parameters. Signals a
    /// client bug, not a retry.
    #[error("idempotency key conflict: {key}")]
    IdempotencyConflict {
        /// The conflicting key.
        key: String,
    },

    /// The reader is already at the start of the story. A boundary
    /// condition, not a failure.
    #[error("already at the start of the story")]
    AtStart,

    /// A credit or debit amount of zero was requested.
    #[error("amount must be positive")]
    InvalidAmount,

    /// The progress record was modified by a concurrent request. Handled
    /// internally by reloading; surfaced only if retries are exhausted.
    #[error("progress was modified concurrently")]
    VersionConflict,

    /// The persistence backend failed. Retried with bounded backoff at the
    /// transaction boundary, then surfaced as fatal.
    #[error("persistence failure: {0}")]
    Persistence(String),
}
