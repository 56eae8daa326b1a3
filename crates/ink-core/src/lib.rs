//! Core types for Inkpath: story graphs, reader progress, and ledger records.
//!
//! This crate defines the data model the navigation engine operates on. It is
//! independent of any storage or service wiring — you can construct a
//! [`StoryGraph`] programmatically or deserialize one from JSON.

/// Error types used throughout the crate.
pub mod error;
/// The story graph arena: pages, choices, and the adjacency index.
pub mod graph;
/// Append-only ledger entries and idempotency keys.
pub mod ledger;
/// Per-reader, per-story navigation state.
pub mod progress;
/// Identifiers, pages, and choices.
pub mod story;

/// Re-export error types.
pub use error::{CoreError, CoreResult};
/// Re-export the graph type.
pub use graph::StoryGraph;
/// Re-export ledger record types.
pub use ledger::{EntryId, EntryReason, IdempotencyKey, LedgerEntry};
/// Re-export progress state.
pub use progress::Progress;
/// Re-export story building blocks.
pub use story::{Choice, ChoiceAccess, ChoiceId, Page, PageId, PageKind, StoryId, UserId};
