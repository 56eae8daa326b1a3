use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::story::{ChoiceId, UserId};

/// Unique identifier for a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub Uuid);

impl EntryId {
    /// Generate a new random entry ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Why a ledger entry was committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryReason {
    /// A premium choice was unlocked.
    ChoicePurchase,
    /// Currency granted after a confirmed external payment.
    TopUp,
    /// Currency granted by a promotion or support action.
    Promotional,
}

impl fmt::Display for EntryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChoicePurchase => write!(f, "choice_purchase"),
            Self::TopUp => write!(f, "top_up"),
            Self::Promotional => write!(f, "promotional"),
        }
    }
}

/// Client-supplied token ensuring a retried request has exactly one effect.
///
/// For a given key at most one ledger entry is ever committed; a replay with
/// the same key returns the original entry instead of re-debiting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Wrap a caller-supplied key.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Derive the key for one logical purchase attempt.
    ///
    /// Includes the progress version, so a double submit of the same attempt
    /// collapses to one debit while a deliberate re-purchase after further
    /// navigation gets a fresh key.
    pub fn for_purchase(user: UserId, choice: ChoiceId, progress_version: u64) -> Self {
        Self(format!(
            "purchase:{}:{}:{progress_version}",
            user.0, choice.0
        ))
    }

    /// The raw key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One append-only record of a balance change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique identifier of this entry.
    pub id: EntryId,
    /// The account holder.
    pub user_id: UserId,
    /// Signed balance change: negative for debits, positive for credits.
    pub delta: i64,
    /// Why the balance changed.
    pub reason: EntryReason,
    /// The unlocked choice, for purchase debits.
    pub related_choice: Option<ChoiceId>,
    /// When the entry was committed.
    pub created_at: DateTime<Utc>,
    /// The key that makes this entry replay-safe.
    pub idempotency_key: IdempotencyKey,
}

impl LedgerEntry {
    /// Build a debit entry (negative delta).
    pub fn debit(
        user_id: UserId,
        amount: u32,
        reason: EntryReason,
        related_choice: Option<ChoiceId>,
        idempotency_key: IdempotencyKey,
    ) -> Self {
        Self {
            id: EntryId::new(),
            user_id,
            delta: -i64::from(amount),
            reason,
            related_choice,
            created_at: Utc::now(),
            idempotency_key,
        }
    }

    /// Build a credit entry (positive delta).
    pub fn credit(
        user_id: UserId,
        amount: u32,
        reason: EntryReason,
        idempotency_key: IdempotencyKey,
    ) -> Self {
        Self {
            id: EntryId::new(),
            user_id,
            delta: i64::from(amount),
            reason,
            related_choice: None,
            created_at: Utc::now(),
            idempotency_key,
        }
    }

    /// Whether a replayed request carries the same parameters as this entry.
    ///
    /// A replay with a different delta or reason is a client bug, not a
    /// retry, and must be surfaced as a conflict.
    pub fn matches_replay(
        &self,
        delta: i64,
        reason: EntryReason,
        related_choice: Option<ChoiceId>,
    ) -> bool {
        self.delta == delta && self.reason == reason && self.related_choice == related_choice
    }
}
