//! Derived engagement metrics: score and churn-risk classification.
//!
//! Snapshots are recomputed on demand from committed progress and ledger
//! state; they are never authoritative and are safe to cache with a short
//! TTL (see [`crate::cache::TtlCache`]).

use std::fmt;

use ink_core::{EntryReason, LedgerEntry, Progress, UserId};
use serde::Serialize;

/// How likely a reader is to stop using the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChurnRisk {
    /// Long sessions and many choices: an engaged reader.
    Low,
    /// Moderate sessions and some choices.
    Medium,
    /// Everyone else.
    High,
}

impl fmt::Display for ChurnRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Scoring weights and churn thresholds. Policy, not physics: the defaults
/// match the product's classification boundaries.
#[derive(Debug, Clone)]
pub struct EngagementConfig {
    /// Score points per story read.
    pub story_weight: f64,
    /// Score points per choice made.
    pub choice_weight: f64,
    /// Score points per premium purchase.
    pub purchase_weight: f64,
    /// Score points per average session second.
    pub session_weight: f64,
    /// Score ceiling.
    pub score_cap: f64,
    /// Minimum average session seconds for low churn risk.
    pub low_session_secs: f64,
    /// Minimum choices made for low churn risk.
    pub low_choices: u64,
    /// Minimum average session seconds for medium churn risk.
    pub medium_session_secs: f64,
    /// Minimum choices made for medium churn risk.
    pub medium_choices: u64,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            story_weight: 10.0,
            choice_weight: 2.0,
            purchase_weight: 50.0,
            session_weight: 0.1,
            score_cap: 100.0,
            low_session_secs: 1800.0,
            low_choices: 20,
            medium_session_secs: 600.0,
            medium_choices: 5,
        }
    }
}

/// Derived, non-authoritative engagement metrics for one reader.
#[derive(Debug, Clone, Serialize)]
pub struct EngagementSnapshot {
    /// The reader the snapshot describes.
    pub user_id: UserId,
    /// Number of stories the reader has started.
    pub stories_read: u64,
    /// Total choices taken across all stories.
    pub choices_made: u64,
    /// Number of committed premium purchase debits.
    pub premium_purchases: u64,
    /// Mean session length in seconds, zero when no sessions were recorded.
    pub avg_session_seconds: f64,
    /// Weighted engagement score, capped.
    pub engagement_score: f64,
    /// Churn-risk classification.
    pub churn_risk: ChurnRisk,
}

/// Compute a snapshot from committed state.
///
/// Pure: reads progress records, ledger entries, and recorded session
/// lengths, and mutates nothing. Session lengths come from session-end
/// analytics events — they are not derivable from progress rows.
pub fn compute_snapshot(
    user_id: UserId,
    progresses: &[Progress],
    entries: &[LedgerEntry],
    session_seconds: &[u32],
    config: &EngagementConfig,
) -> EngagementSnapshot {
    let stories_read = progresses.len() as u64;
    let choices_made: u64 = progresses.iter().map(Progress::choices_made).sum();
    let premium_purchases = entries
        .iter()
        .filter(|e| e.reason == EntryReason::ChoicePurchase && e.delta < 0)
        .count() as u64;

    let avg_session_seconds = if session_seconds.is_empty() {
        0.0
    } else {
        let total: u64 = session_seconds.iter().map(|s| u64::from(*s)).sum();
        total as f64 / session_seconds.len() as f64
    };

    let raw_score = stories_read as f64 * config.story_weight
        + choices_made as f64 * config.choice_weight
        + premium_purchases as f64 * config.purchase_weight
        + avg_session_seconds * config.session_weight;
    let engagement_score = raw_score.min(config.score_cap);

    let churn_risk = if avg_session_seconds > config.low_session_secs
        && choices_made > config.low_choices
    {
        ChurnRisk::Low
    } else if avg_session_seconds > config.medium_session_secs && choices_made > config.medium_choices
    {
        ChurnRisk::Medium
    } else {
        ChurnRisk::High
    };

    EngagementSnapshot {
        user_id,
        stories_read,
        choices_made,
        premium_purchases,
        avg_session_seconds,
        engagement_score,
        churn_risk,
    }
}
