//! Configuration for the navigation engine.

use crate::engagement::EngagementConfig;

/// What happens to paid unlocks when a reader restarts a story.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Restart clears purchased choices: re-reaching a gated branch shows it
    /// locked again. The ledger is untouched either way.
    #[default]
    ForfeitPurchases,
    /// Ownership of paid choices persists across restarts; only the cursor
    /// and history reset.
    KeepPurchases,
}

/// Tunables for the navigation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Restart behavior for purchased choices.
    pub restart_policy: RestartPolicy,
    /// Attempts per commit before a persistence failure is surfaced.
    pub commit_attempts: u32,
    /// Initial backoff between persistence retries, doubled per attempt.
    pub backoff_base_ms: u64,
    /// Engagement scoring weights and churn thresholds.
    pub engagement: EngagementConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            restart_policy: RestartPolicy::default(),
            commit_attempts: 3,
            backoff_base_ms: 10,
            engagement: EngagementConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Set the restart policy.
    pub fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    /// Set the commit attempt bound (clamped to at least 1).
    pub fn with_commit_attempts(mut self, attempts: u32) -> Self {
        self.commit_attempts = attempts.max(1);
        self
    }

    /// Set the initial retry backoff in milliseconds.
    pub fn with_backoff_base_ms(mut self, ms: u64) -> Self {
        self.backoff_base_ms = ms;
        self
    }

    /// Set the engagement configuration.
    pub fn with_engagement(mut self, engagement: EngagementConfig) -> Self {
        self.engagement = engagement;
        self
    }
}
