//! Currency ledger service: balances, credits, and atomic debits.

use std::sync::Arc;

use ink_core::{ChoiceId, EntryReason, IdempotencyKey, LedgerEntry, UserId};

use crate::error::EngineResult;
use crate::store::{CreditRequest, DebitRequest, StateStore};

/// Thin service over the store's per-user accounts.
///
/// The navigation engine performs purchase debits through
/// [`StateStore::commit_advance`] so they commit atomically with the
/// progress update; this service carries the standalone operations — the
/// payment-webhook credit path and balance reads.
#[derive(Debug)]
pub struct LedgerService<S: StateStore> {
    store: Arc<S>,
}

impl<S: StateStore> Clone for LedgerService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: StateStore> LedgerService<S> {
    /// Create a service over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Current balance. Zero for readers without an account yet.
    pub fn balance(&self, user: UserId) -> EngineResult<u64> {
        self.store.balance(user)
    }

    /// All committed entries for a reader, oldest first.
    pub fn entries(&self, user: UserId) -> EngineResult<Vec<LedgerEntry>> {
        self.store.entries(user)
    }

    /// Credit a reader's account. The sole integration point with billing:
    /// invoked after a payment provider confirms payment. Fails with
    /// [`crate::EngineError::InvalidAmount`] when `amount` is zero; replays
    /// with the same key return the original entry.
    pub fn credit(
        &self,
        user: UserId,
        amount: u32,
        reason: EntryReason,
        key: IdempotencyKey,
    ) -> EngineResult<LedgerEntry> {
        self.store.append_credit(
            user,
            &CreditRequest {
                amount,
                reason,
                key,
            },
        )
    }

    /// Debit a reader's account atomically: balance check, entry append, and
    /// balance update happen under one account lock. Replays with the same
    /// key return the original entry without re-checking the balance.
    pub fn debit(
        &self,
        user: UserId,
        amount: u32,
        reason: EntryReason,
        related_choice: Option<ChoiceId>,
        key: IdempotencyKey,
    ) -> EngineResult<LedgerEntry> {
        self.store.append_debit(
            user,
            &DebitRequest {
                amount,
                reason,
                related_choice,
                key,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::store::MemoryStore;

    fn service() -> LedgerService<MemoryStore> {
        LedgerService::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn credit_and_debit_round_trip() {
        let ledger = service();
        let user = UserId::new();

        ledger
            .credit(user, 100, EntryReason::TopUp, IdempotencyKey::new("c1"))
            .unwrap();
        let entry = ledger
            .debit(
                user,
                40,
                EntryReason::ChoicePurchase,
                Some(ChoiceId::new()),
                IdempotencyKey::new("d1"),
            )
            .unwrap();

        assert_eq!(entry.delta, -40);
        assert_eq!(ledger.balance(user).unwrap(), 60);
        assert_eq!(ledger.entries(user).unwrap().len(), 2);
    }

    #[test]
    fn zero_credit_rejected() {
        let ledger = service();
        let err = ledger
            .credit(
                UserId::new(),
                0,
                EntryReason::TopUp,
                IdempotencyKey::new("c1"),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount));
    }

    #[test]
    fn insufficient_funds_surface_distinctly() {
        let ledger = service();
        let user = UserId::new();
        let err = ledger
            .debit(
                user,
                5,
                EntryReason::ChoicePurchase,
                None,
                IdempotencyKey::new("d1"),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientFunds { .. }));
    }
}
