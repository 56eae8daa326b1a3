//! Navigation and premium-gating engine for Inkpath branching stories.
//!
//! Readers traverse a directed graph of story pages connected by choices,
//! some gated behind a virtual-currency cost. This crate tracks a reader's
//! position, evaluates which choices are reachable, executes atomic
//! currency-debit purchases, and persists resumable progress — guaranteeing
//! a reader is never double-charged and never granted access they have not
//! paid for. It is a library-level service consumed by request handlers; it
//! owns no wire format or CLI.

/// Bounded, explicit analytics collection.
pub mod analytics;
/// Time-boxed caching with explicit TTL and invalidation.
pub mod cache;
/// Read-only store of validated story graphs.
pub mod catalog;
/// Engine configuration.
pub mod config;
/// Derived engagement metrics.
pub mod engagement;
/// Error taxonomy.
pub mod error;
/// Pure choice accessibility evaluation.
pub mod evaluator;
/// Currency ledger service.
pub mod ledger;
/// The navigation state machine.
pub mod navigation;
/// Persistence seam and the in-memory store.
pub mod store;

/// Re-export the analytics service.
pub use analytics::{AnalyticsCollector, AnalyticsEvent};
/// Re-export the cache.
pub use cache::TtlCache;
/// Re-export the catalog.
pub use catalog::StoryCatalog;
/// Re-export configuration types.
pub use config::{EngineConfig, RestartPolicy};
/// Re-export engagement types.
pub use engagement::{ChurnRisk, EngagementConfig, EngagementSnapshot, compute_snapshot};
/// Re-export error types.
pub use error::{EngineError, EngineResult};
/// Re-export evaluator types.
pub use evaluator::{AccessReason, EvaluatedChoice, evaluate};
/// Re-export the ledger service.
pub use ledger::LedgerService;
/// Re-export the navigation engine.
pub use navigation::{NavigationEngine, NavigationView};
/// Re-export the persistence seam.
pub use store::{AdvanceCommit, CommitOutcome, CreditRequest, DebitRequest, MemoryStore, StateStore};
