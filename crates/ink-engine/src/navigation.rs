//! The navigation state machine: advance, go back, restart, resume.
//!
//! Every operation is a transaction from one steady `AT_PAGE` state to
//! another, or a typed failure that mutates nothing. The premium `advance`
//! path commits its ledger debit and its progress update as one atomic store
//! operation — a partially applied purchase is structurally impossible.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ink_core::{
    ChoiceId, EntryReason, IdempotencyKey, LedgerEntry, Page, Progress, StoryGraph, StoryId,
    UserId,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::analytics::{AnalyticsCollector, AnalyticsEvent};
use crate::catalog::StoryCatalog;
use crate::config::{EngineConfig, RestartPolicy};
use crate::engagement::{EngagementSnapshot, compute_snapshot};
use crate::error::{EngineError, EngineResult};
use crate::evaluator::{EvaluatedChoice, evaluate};
use crate::ledger::LedgerService;
use crate::store::{AdvanceCommit, CommitOutcome, DebitRequest, StateStore};

/// What a client needs to render after any navigation operation: the current
/// page, its annotated choices, and the committed progress.
#[derive(Debug, Clone, Serialize)]
pub struct NavigationView {
    /// The page the reader is now on.
    pub page: Page,
    /// Outgoing choices annotated with accessibility. Empty on endings.
    pub choices: Vec<EvaluatedChoice>,
    /// The committed progress record.
    pub progress: Progress,
}

/// The navigation engine for a catalog of stories.
///
/// Holds the read-only story catalog, the persistence backend, the ledger
/// service, and the analytics collector. Cheap to share behind an `Arc`;
/// all operations take `&self`.
pub struct NavigationEngine<S: StateStore> {
    catalog: StoryCatalog,
    store: Arc<S>,
    ledger: LedgerService<S>,
    analytics: AnalyticsCollector,
    config: EngineConfig,
}

impl<S: StateStore> NavigationEngine<S> {
    /// Create an engine over the given catalog and store.
    pub fn new(
        catalog: StoryCatalog,
        store: Arc<S>,
        analytics: AnalyticsCollector,
        config: EngineConfig,
    ) -> Self {
        let ledger = LedgerService::new(Arc::clone(&store));
        Self {
            catalog,
            store,
            ledger,
            analytics,
            config,
        }
    }

    /// The ledger service (balance reads and webhook credits).
    pub fn ledger(&self) -> &LedgerService<S> {
        &self.ledger
    }

    /// The analytics collector this engine records into.
    pub fn analytics(&self) -> &AnalyticsCollector {
        &self.analytics
    }

    /// The story catalog.
    pub fn catalog(&self) -> &StoryCatalog {
        &self.catalog
    }

    /// Current balance for a reader.
    pub fn balance(&self, user: UserId) -> EngineResult<u64> {
        self.ledger.balance(user)
    }

    /// Credit a reader's account after a confirmed external payment.
    pub fn credit(
        &self,
        user: UserId,
        amount: u32,
        reason: EntryReason,
        key: IdempotencyKey,
    ) -> EngineResult<LedgerEntry> {
        self.ledger.credit(user, amount, reason, key)
    }

    /// Read-only: the reader's current position and annotated choices.
    /// Creates progress at the start page on first navigation into a story.
    pub fn resume(&self, user: UserId, story: StoryId) -> EngineResult<NavigationView> {
        let graph = self.catalog.graph(story)?;
        let progress = self.with_backoff(|| {
            self.store.ensure_progress(user, story, graph.start_page())
        })?;
        self.view(graph, progress)
    }

    /// Take a choice from the reader's current page.
    ///
    /// Premium choices not yet owned are purchased as part of the same
    /// atomic commit. `key` is the client's idempotency token for retries;
    /// when absent, a key is derived from the loaded progress version so a
    /// double submit of the same attempt collapses to one debit. On
    /// [`EngineError::InsufficientFunds`] nothing is mutated.
    pub fn advance(
        &self,
        user: UserId,
        story: StoryId,
        choice_id: ChoiceId,
        key: Option<IdempotencyKey>,
    ) -> EngineResult<NavigationView> {
        let graph = self.catalog.graph(story)?;
        let choice = graph.choice(choice_id)?.clone();

        for _ in 0..self.config.commit_attempts {
            let progress = self.with_backoff(|| {
                self.store.ensure_progress(user, story, graph.start_page())
            })?;

            // A retried request that already committed replays to the
            // original result instead of failing the transition check.
            if let Some(key) = &key {
                if let Some(prior) = self.store.find_entry(user, key)? {
                    if prior.related_choice == Some(choice_id)
                        && prior.matches_replay(
                            -i64::from(choice.cost()),
                            EntryReason::ChoicePurchase,
                            Some(choice_id),
                        )
                    {
                        debug!(user = %user, key = %key, "advance replayed before commit");
                        return self.view(graph, progress);
                    }
                    warn!(user = %user, key = %key, "idempotency key reused for a different request");
                    return Err(EngineError::IdempotencyConflict {
                        key: key.as_str().to_owned(),
                    });
                }
            }

            if choice.from_page != progress.current_page {
                return Err(EngineError::InvalidTransition {
                    at: progress.current_page,
                    from: choice.from_page,
                });
            }

            let balance = self.store.balance(user)?;
            let outgoing = graph.outgoing_choices(progress.current_page)?;
            let evaluated = evaluate(&outgoing, &progress, balance);
            let needs_purchase = evaluated
                .iter()
                .find(|e| e.choice.id == choice_id)
                .is_some_and(|e| e.requires_purchase);

            let terminal = graph.is_terminal(choice.to_page)?;
            let mut next = progress.clone();
            next.record_advance(
                choice.to_page,
                needs_purchase.then_some(choice_id),
                terminal,
            );

            let debit = needs_purchase.then(|| DebitRequest {
                amount: choice.cost(),
                reason: EntryReason::ChoicePurchase,
                related_choice: Some(choice_id),
                key: key.clone().unwrap_or_else(|| {
                    IdempotencyKey::for_purchase(user, choice_id, progress.version)
                }),
            });

            let commit = AdvanceCommit {
                progress: next,
                expected_version: progress.version,
                debit,
            };
            match self.with_backoff(|| self.store.commit_advance(&commit)) {
                Ok(CommitOutcome::Applied {
                    progress: committed,
                    entry,
                }) => {
                    self.analytics.record(AnalyticsEvent::ChoiceMade {
                        user,
                        story,
                        choice: choice_id,
                    });
                    if entry.is_some() {
                        self.analytics.record(AnalyticsEvent::PurchaseCompleted {
                            user,
                            choice: choice_id,
                            cost: choice.cost(),
                        });
                    }
                    if committed.is_completed && !progress.is_completed {
                        self.analytics
                            .record(AnalyticsEvent::StoryCompleted { user, story });
                    }
                    return self.view(graph, committed);
                }
                Ok(CommitOutcome::Replayed {
                    progress: committed, ..
                }) => return self.view(graph, committed),
                Err(EngineError::VersionConflict) => {
                    debug!(user = %user, story = %story, "advance raced, reloading");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(EngineError::Persistence(
            "advance retries exhausted".to_owned(),
        ))
    }

    /// Return to the previously visited page. Never touches the ledger.
    /// Fails with [`EngineError::AtStart`] when history is exhausted.
    pub fn go_back(&self, user: UserId, story: StoryId) -> EngineResult<NavigationView> {
        let graph = self.catalog.graph(story)?;
        for _ in 0..self.config.commit_attempts {
            let progress = self.with_backoff(|| {
                self.store.ensure_progress(user, story, graph.start_page())
            })?;
            let mut next = progress.clone();
            if !next.step_back() {
                return Err(EngineError::AtStart);
            }
            match self.with_backoff(|| self.store.commit_progress(&next, progress.version)) {
                Ok(committed) => return self.view(graph, committed),
                Err(EngineError::VersionConflict) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(EngineError::Persistence(
            "go_back retries exhausted".to_owned(),
        ))
    }

    /// Reset the reader to the story's start page. The ledger is untouched;
    /// whether paid unlocks survive is decided by the configured
    /// [`RestartPolicy`].
    pub fn restart(&self, user: UserId, story: StoryId) -> EngineResult<NavigationView> {
        let graph = self.catalog.graph(story)?;
        let keep = self.config.restart_policy == RestartPolicy::KeepPurchases;
        for _ in 0..self.config.commit_attempts {
            let progress = self.with_backoff(|| {
                self.store.ensure_progress(user, story, graph.start_page())
            })?;
            let mut next = progress.clone();
            next.reset(graph.start_page(), keep);
            match self.with_backoff(|| self.store.commit_progress(&next, progress.version)) {
                Ok(committed) => return self.view(graph, committed),
                Err(EngineError::VersionConflict) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(EngineError::Persistence(
            "restart retries exhausted".to_owned(),
        ))
    }

    /// Derived engagement metrics for a reader. `session_seconds` carries
    /// the recorded session lengths from the analytics pipeline.
    pub fn snapshot_for(
        &self,
        user: UserId,
        session_seconds: &[u32],
    ) -> EngineResult<EngagementSnapshot> {
        let progresses = self.store.progress_for_user(user)?;
        let entries = self.store.entries(user)?;
        Ok(compute_snapshot(
            user,
            &progresses,
            &entries,
            session_seconds,
            &self.config.engagement,
        ))
    }

    fn view(&self, graph: &Arc<StoryGraph>, progress: Progress) -> EngineResult<NavigationView> {
        let page = graph.page(progress.current_page)?.clone();
        let balance = self.store.balance(progress.user_id)?;
        let outgoing = graph.outgoing_choices(progress.current_page)?;
        let choices = evaluate(&outgoing, &progress, balance);
        Ok(NavigationView {
            page,
            choices,
            progress,
        })
    }

    /// Run a store operation, retrying persistence failures with bounded
    /// exponential backoff. Every other outcome is returned as-is.
    fn with_backoff<T>(&self, mut op: impl FnMut() -> EngineResult<T>) -> EngineResult<T> {
        let mut delay = Duration::from_millis(self.config.backoff_base_ms);
        let mut last = String::new();
        for attempt in 0..self.config.commit_attempts {
            match op() {
                Err(EngineError::Persistence(message)) => {
                    warn!(attempt, %message, "persistence failure, backing off");
                    last = message;
                    if attempt + 1 < self.config.commit_attempts {
                        thread::sleep(delay);
                        delay *= 2;
                    }
                }
                other => return other,
            }
        }
        Err(EngineError::Persistence(last))
    }
}
