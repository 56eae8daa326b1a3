//! The persistence seam and its bundled in-memory implementation.
//!
//! [`StateStore`] is the interface the engine needs from a backend:
//! per-(user, story) progress records, per-user ledger accounts, and one
//! atomic commit covering a debit plus a progress update. [`MemoryStore`]
//! satisfies it with per-key mutexes — requests for different readers, or
//! free navigation in different stories, never block each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ink_core::{
    ChoiceId, EntryReason, IdempotencyKey, LedgerEntry, PageId, Progress, StoryId, UserId,
};
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};

/// A requested currency debit, committed together with a progress update.
#[derive(Debug, Clone)]
pub struct DebitRequest {
    /// Amount to debit, in currency units. Must be positive.
    pub amount: u32,
    /// Why the debit happens.
    pub reason: EntryReason,
    /// The choice being unlocked, if any.
    pub related_choice: Option<ChoiceId>,
    /// Replay-safety key for this debit.
    pub key: IdempotencyKey,
}

/// A requested currency credit.
#[derive(Debug, Clone)]
pub struct CreditRequest {
    /// Amount to credit, in currency units. Must be positive.
    pub amount: u32,
    /// Why the credit happens.
    pub reason: EntryReason,
    /// Replay-safety key for this credit.
    pub key: IdempotencyKey,
}

/// One atomic advance: the new progress state plus an optional debit.
///
/// `expected_version` is the version of the progress record the caller read;
/// the commit fails with [`EngineError::VersionConflict`] if another request
/// committed in between.
#[derive(Debug, Clone)]
pub struct AdvanceCommit {
    /// The progress record as it should read after the commit.
    pub progress: Progress,
    /// The version the caller based this mutation on.
    pub expected_version: u64,
    /// The debit to apply in the same transaction, for premium unlocks.
    pub debit: Option<DebitRequest>,
}

/// Result of an advance commit.
#[derive(Debug, Clone)]
pub enum CommitOutcome {
    /// The mutation was applied.
    Applied {
        /// The committed progress record.
        progress: Progress,
        /// The ledger entry, when the advance carried a debit.
        entry: Option<LedgerEntry>,
    },
    /// The debit's idempotency key was already committed: nothing changed,
    /// and the caller receives the previously committed state.
    Replayed {
        /// The progress record as committed by the original request.
        progress: Progress,
        /// The original ledger entry.
        entry: LedgerEntry,
    },
}

/// The persistence interface the navigation engine runs against.
///
/// Implementations must guarantee serializability per key: two commits for
/// the same (user, story) must not both observe the pre-transaction state
/// and both succeed, and the debit + progress pair in
/// [`StateStore::commit_advance`] must be all-or-nothing.
pub trait StateStore: Send + Sync {
    /// Load the progress record, creating one at the start page on first
    /// navigation into a story.
    fn ensure_progress(
        &self,
        user: UserId,
        story: StoryId,
        start_page: PageId,
    ) -> EngineResult<Progress>;

    /// All progress records for a reader, across stories.
    fn progress_for_user(&self, user: UserId) -> EngineResult<Vec<Progress>>;

    /// Replace a progress record, guarded by an expected-version check.
    /// Used by operations that never touch the ledger (go back, restart).
    fn commit_progress(&self, progress: &Progress, expected_version: u64)
    -> EngineResult<Progress>;

    /// Commit a progress update and an optional debit as one atomic unit.
    fn commit_advance(&self, commit: &AdvanceCommit) -> EngineResult<CommitOutcome>;

    /// Current balance of a reader's account. Zero for unknown readers.
    fn balance(&self, user: UserId) -> EngineResult<u64>;

    /// All ledger entries for a reader, oldest first.
    fn entries(&self, user: UserId) -> EngineResult<Vec<LedgerEntry>>;

    /// Look up a committed entry by idempotency key.
    fn find_entry(
        &self,
        user: UserId,
        key: &IdempotencyKey,
    ) -> EngineResult<Option<LedgerEntry>>;

    /// Append a credit entry. Replays with the same key return the original
    /// entry without re-crediting.
    fn append_credit(&self, user: UserId, request: &CreditRequest) -> EngineResult<LedgerEntry>;

    /// Append a debit entry with an atomic balance-sufficiency check.
    /// Replays with the same key return the original entry.
    fn append_debit(&self, user: UserId, request: &DebitRequest) -> EngineResult<LedgerEntry>;
}

/// Per-user account state: current balance plus the append-only entry list.
#[derive(Debug, Default)]
struct Account {
    balance: u64,
    entries: Vec<LedgerEntry>,
    by_key: HashMap<String, usize>,
}

/// Outcome of applying a debit against an account.
enum DebitApplied {
    Fresh(LedgerEntry),
    Replayed(LedgerEntry),
}

impl Account {
    fn find(&self, key: &IdempotencyKey) -> Option<&LedgerEntry> {
        self.by_key.get(key.as_str()).map(|i| &self.entries[*i])
    }

    fn push(&mut self, entry: LedgerEntry) -> LedgerEntry {
        self.by_key
            .insert(entry.idempotency_key.as_str().to_owned(), self.entries.len());
        self.entries.push(entry.clone());
        entry
    }

    fn apply_credit(&mut self, user: UserId, request: &CreditRequest) -> EngineResult<LedgerEntry> {
        if request.amount == 0 {
            return Err(EngineError::InvalidAmount);
        }
        if let Some(prior) = self.find(&request.key) {
            if prior.matches_replay(i64::from(request.amount), request.reason, None) {
                debug!(user = %user, key = %request.key, "credit replayed");
                return Ok(prior.clone());
            }
            warn!(user = %user, key = %request.key, "credit replay with different parameters");
            return Err(EngineError::IdempotencyConflict {
                key: request.key.as_str().to_owned(),
            });
        }
        self.balance += u64::from(request.amount);
        let entry = LedgerEntry::credit(user, request.amount, request.reason, request.key.clone());
        Ok(self.push(entry))
    }

    /// Check the key and the balance, then debit. The sufficiency check and
    /// the mutation happen under the same account lock.
    fn apply_debit(&mut self, user: UserId, request: &DebitRequest) -> EngineResult<DebitApplied> {
        if request.amount == 0 {
            return Err(EngineError::InvalidAmount);
        }
        if let Some(prior) = self.find(&request.key) {
            if prior.matches_replay(
                -i64::from(request.amount),
                request.reason,
                request.related_choice,
            ) {
                debug!(user = %user, key = %request.key, "debit replayed");
                return Ok(DebitApplied::Replayed(prior.clone()));
            }
            warn!(user = %user, key = %request.key, "debit replay with different parameters");
            return Err(EngineError::IdempotencyConflict {
                key: request.key.as_str().to_owned(),
            });
        }
        let cost = u64::from(request.amount);
        if self.balance < cost {
            return Err(EngineError::InsufficientFunds {
                cost: request.amount,
                balance: self.balance,
            });
        }
        self.balance -= cost;
        let entry = LedgerEntry::debit(
            user,
            request.amount,
            request.reason,
            request.related_choice,
            request.key.clone(),
        );
        Ok(DebitApplied::Fresh(self.push(entry)))
    }
}

type ProgressKey = (UserId, StoryId);

/// In-memory [`StateStore`] with per-key locking.
///
/// The outer maps are only locked long enough to fetch or create a per-key
/// cell; the cell mutexes serialize actual mutations. Lock order is always
/// progress cell first, account cell second.
#[derive(Debug, Default)]
pub struct MemoryStore {
    progress: Mutex<HashMap<ProgressKey, Arc<Mutex<Progress>>>>,
    accounts: Mutex<HashMap<UserId, Arc<Mutex<Account>>>>,
}

// Mutation sections never panic between related writes, so a poisoned lock
// still holds consistent data; recover it instead of propagating the panic.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn progress_cell(&self, key: ProgressKey) -> Option<Arc<Mutex<Progress>>> {
        lock(&self.progress).get(&key).cloned()
    }

    fn account_cell(&self, user: UserId) -> Arc<Mutex<Account>> {
        lock(&self.accounts).entry(user).or_default().clone()
    }

    fn existing_progress_cell(&self, key: ProgressKey) -> EngineResult<Arc<Mutex<Progress>>> {
        self.progress_cell(key).ok_or_else(|| {
            EngineError::Persistence(format!(
                "progress record missing for user {} story {}",
                key.0, key.1
            ))
        })
    }
}

impl StateStore for MemoryStore {
    fn ensure_progress(
        &self,
        user: UserId,
        story: StoryId,
        start_page: PageId,
    ) -> EngineResult<Progress> {
        let cell = lock(&self.progress)
            .entry((user, story))
            .or_insert_with(|| Arc::new(Mutex::new(Progress::start(user, story, start_page))))
            .clone();
        let progress = lock(&cell).clone();
        Ok(progress)
    }

    fn progress_for_user(&self, user: UserId) -> EngineResult<Vec<Progress>> {
        let cells: Vec<Arc<Mutex<Progress>>> = lock(&self.progress)
            .iter()
            .filter(|((owner, _), _)| *owner == user)
            .map(|(_, cell)| cell.clone())
            .collect();
        Ok(cells.iter().map(|cell| lock(cell).clone()).collect())
    }

    fn commit_progress(
        &self,
        progress: &Progress,
        expected_version: u64,
    ) -> EngineResult<Progress> {
        let cell = self.existing_progress_cell((progress.user_id, progress.story_id))?;
        let mut slot = lock(&cell);
        if slot.version != expected_version {
            return Err(EngineError::VersionConflict);
        }
        *slot = progress.clone();
        debug!(
            user = %progress.user_id,
            story = %progress.story_id,
            page = %progress.current_page,
            version = progress.version,
            "progress committed"
        );
        Ok(slot.clone())
    }

    fn commit_advance(&self, commit: &AdvanceCommit) -> EngineResult<CommitOutcome> {
        let next = &commit.progress;
        let cell = self.existing_progress_cell((next.user_id, next.story_id))?;
        let mut slot = lock(&cell);

        let Some(debit) = &commit.debit else {
            if slot.version != commit.expected_version {
                return Err(EngineError::VersionConflict);
            }
            *slot = next.clone();
            debug!(
                user = %next.user_id,
                story = %next.story_id,
                page = %next.current_page,
                "free advance committed"
            );
            return Ok(CommitOutcome::Applied {
                progress: slot.clone(),
                entry: None,
            });
        };

        // Premium advance: both halves under both locks, progress first.
        let account = self.account_cell(next.user_id);
        let mut account = lock(&account);

        // Replay must win over the version check: the original request
        // already advanced the progress, so a retry sees a newer version.
        if let Some(prior) = account.find(&debit.key) {
            if prior.matches_replay(
                -i64::from(debit.amount),
                debit.reason,
                debit.related_choice,
            ) {
                debug!(user = %next.user_id, key = %debit.key, "advance replayed");
                return Ok(CommitOutcome::Replayed {
                    progress: slot.clone(),
                    entry: prior.clone(),
                });
            }
            warn!(user = %next.user_id, key = %debit.key, "advance replay with different parameters");
            return Err(EngineError::IdempotencyConflict {
                key: debit.key.as_str().to_owned(),
            });
        }

        if slot.version != commit.expected_version {
            return Err(EngineError::VersionConflict);
        }

        match account.apply_debit(next.user_id, debit)? {
            DebitApplied::Fresh(entry) => {
                *slot = next.clone();
                debug!(
                    user = %next.user_id,
                    story = %next.story_id,
                    page = %next.current_page,
                    delta = entry.delta,
                    "premium advance committed"
                );
                Ok(CommitOutcome::Applied {
                    progress: slot.clone(),
                    entry: Some(entry),
                })
            }
            // Unreachable: the key was checked above under the same lock.
            DebitApplied::Replayed(entry) => Ok(CommitOutcome::Replayed {
                progress: slot.clone(),
                entry,
            }),
        }
    }

    fn balance(&self, user: UserId) -> EngineResult<u64> {
        let cell = self.account_cell(user);
        let balance = lock(&cell).balance;
        Ok(balance)
    }

    fn entries(&self, user: UserId) -> EngineResult<Vec<LedgerEntry>> {
        let cell = self.account_cell(user);
        let entries = lock(&cell).entries.clone();
        Ok(entries)
    }

    fn find_entry(
        &self,
        user: UserId,
        key: &IdempotencyKey,
    ) -> EngineResult<Option<LedgerEntry>> {
        let cell = self.account_cell(user);
        let entry = lock(&cell).find(key).cloned();
        Ok(entry)
    }

    fn append_credit(&self, user: UserId, request: &CreditRequest) -> EngineResult<LedgerEntry> {
        let cell = self.account_cell(user);
        let mut account = lock(&cell);
        account.apply_credit(user, request)
    }

    fn append_debit(&self, user: UserId, request: &DebitRequest) -> EngineResult<LedgerEntry> {
        let cell = self.account_cell(user);
        let mut account = lock(&cell);
        match account.apply_debit(user, request)? {
            DebitApplied::Fresh(entry) | DebitApplied::Replayed(entry) => Ok(entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn credit(amount: u32, key: &str) -> CreditRequest {
        CreditRequest {
            amount,
            reason: EntryReason::TopUp,
            key: IdempotencyKey::new(key),
        }
    }

    fn debit(amount: u32, key: &str) -> DebitRequest {
        DebitRequest {
            amount,
            reason: EntryReason::ChoicePurchase,
            related_choice: Some(ChoiceId::new()),
            key: IdempotencyKey::new(key),
        }
    }

    #[test]
    fn credit_then_balance() {
        let store = MemoryStore::new();
        let user = UserId::new();
        store.append_credit(user, &credit(100, "c1")).unwrap();
        assert_eq!(store.balance(user).unwrap(), 100);
    }

    #[test]
    fn zero_amount_is_invalid() {
        let store = MemoryStore::new();
        let user = UserId::new();
        assert!(matches!(
            store.append_credit(user, &credit(0, "c1")),
            Err(EngineError::InvalidAmount)
        ));
        assert!(matches!(
            store.append_debit(user, &debit(0, "d1")),
            Err(EngineError::InvalidAmount)
        ));
    }

    #[test]
    fn debit_checks_balance() {
        let store = MemoryStore::new();
        let user = UserId::new();
        store.append_credit(user, &credit(10, "c1")).unwrap();

        let err = store.append_debit(user, &debit(15, "d1")).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientFunds {
                cost: 15,
                balance: 10
            }
        ));
        assert_eq!(store.balance(user).unwrap(), 10);
        assert_eq!(store.entries(user).unwrap().len(), 1);
    }

    #[test]
    fn debit_replay_is_a_no_op() {
        let store = MemoryStore::new();
        let user = UserId::new();
        store.append_credit(user, &credit(100, "c1")).unwrap();

        let request = debit(30, "d1");
        let first = store.append_debit(user, &request).unwrap();
        let second = store.append_debit(user, &request).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.balance(user).unwrap(), 70);
        assert_eq!(store.entries(user).unwrap().len(), 2);
    }

    #[test]
    fn replay_with_different_amount_conflicts() {
        let store = MemoryStore::new();
        let user = UserId::new();
        store.append_credit(user, &credit(100, "c1")).unwrap();
        let original = debit(30, "d1");
        store.append_debit(user, &original).unwrap();

        let mut tampered = original.clone();
        tampered.amount = 40;
        assert!(matches!(
            store.append_debit(user, &tampered),
            Err(EngineError::IdempotencyConflict { .. })
        ));
        assert_eq!(store.balance(user).unwrap(), 70);
    }

    #[test]
    fn credit_replay_returns_original() {
        let store = MemoryStore::new();
        let user = UserId::new();
        let request = credit(100, "c1");
        let first = store.append_credit(user, &request).unwrap();
        let second = store.append_credit(user, &request).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.balance(user).unwrap(), 100);
    }

    #[test]
    fn ensure_progress_creates_once() {
        let store = MemoryStore::new();
        let user = UserId::new();
        let story = StoryId::new();
        let start = PageId::new();

        let first = store.ensure_progress(user, story, start).unwrap();
        let mut advanced = first.clone();
        advanced.record_advance(PageId::new(), None, false);
        store.commit_progress(&advanced, first.version).unwrap();

        // A second ensure returns the committed record, not a fresh one.
        let reloaded = store.ensure_progress(user, story, start).unwrap();
        assert_eq!(reloaded.version, 1);
        assert_eq!(reloaded.current_page, advanced.current_page);
    }

    #[test]
    fn stale_version_is_rejected() {
        let store = MemoryStore::new();
        let user = UserId::new();
        let story = StoryId::new();
        let start = PageId::new();

        let loaded = store.ensure_progress(user, story, start).unwrap();
        let mut a = loaded.clone();
        a.record_advance(PageId::new(), None, false);
        let mut b = loaded.clone();
        b.record_advance(PageId::new(), None, false);

        store.commit_progress(&a, loaded.version).unwrap();
        assert!(matches!(
            store.commit_progress(&b, loaded.version),
            Err(EngineError::VersionConflict)
        ));
    }

    #[test]
    fn failed_premium_commit_leaves_everything_untouched() {
        let store = MemoryStore::new();
        let user = UserId::new();
        let story = StoryId::new();
        let start = PageId::new();
        store.append_credit(user, &credit(10, "c1")).unwrap();

        let loaded = store.ensure_progress(user, story, start).unwrap();
        let mut next = loaded.clone();
        let choice = ChoiceId::new();
        next.record_advance(PageId::new(), Some(choice), false);

        let err = store
            .commit_advance(&AdvanceCommit {
                progress: next,
                expected_version: loaded.version,
                debit: Some(DebitRequest {
                    amount: 15,
                    reason: EntryReason::ChoicePurchase,
                    related_choice: Some(choice),
                    key: IdempotencyKey::new("d1"),
                }),
            })
            .unwrap_err();

        assert!(matches!(err, EngineError::InsufficientFunds { .. }));
        assert_eq!(store.balance(user).unwrap(), 10);
        let reloaded = store.ensure_progress(user, story, start).unwrap();
        assert_eq!(reloaded.current_page, start);
        assert_eq!(reloaded.version, 0);
    }

    #[test]
    fn concurrent_debits_never_go_negative() {
        let store = Arc::new(MemoryStore::new());
        let user = UserId::new();
        store.append_credit(user, &credit(50, "seed")).unwrap();

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.append_debit(user, &debit(10, &format!("d{i}"))))
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(Result::is_ok)
            .count();

        assert_eq!(successes, 5);
        assert_eq!(store.balance(user).unwrap(), 0);
    }

    #[test]
    fn accounts_are_isolated_per_user() {
        let store = MemoryStore::new();
        let alice = UserId::new();
        let bob = UserId::new();
        store.append_credit(alice, &credit(100, "c1")).unwrap();

        assert_eq!(store.balance(alice).unwrap(), 100);
        assert_eq!(store.balance(bob).unwrap(), 0);
        assert!(store.entries(bob).unwrap().is_empty());
    }
}
