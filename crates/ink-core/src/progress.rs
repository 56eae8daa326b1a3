use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::story::{ChoiceId, PageId, StoryId, UserId};

/// Per-reader, per-story navigation state.
///
/// `visited_history` records every page visited in order, start page
/// included; its last element is always the current page. Duplicates are
/// expected on cycles. The `version` counter is bumped by every committed
/// mutation and backs both optimistic concurrency checks and derived
/// purchase idempotency keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    /// The reader this progress belongs to.
    pub user_id: UserId,
    /// The story this progress belongs to.
    pub story_id: StoryId,
    /// The page the reader is currently on.
    pub current_page: PageId,
    /// Every page visited, in order, current page last.
    pub visited_history: Vec<PageId>,
    /// Premium choices the reader has paid to unlock.
    pub purchased_choices: HashSet<ChoiceId>,
    /// Whether the reader has reached a terminal page.
    pub is_completed: bool,
    /// Timestamp of the last committed mutation.
    pub last_read_at: DateTime<Utc>,
    /// Monotonic mutation counter for optimistic concurrency.
    pub version: u64,
}

impl Progress {
    /// Fresh progress positioned at the story's start page.
    pub fn start(user_id: UserId, story_id: StoryId, start_page: PageId) -> Self {
        Self {
            user_id,
            story_id,
            current_page: start_page,
            visited_history: vec![start_page],
            purchased_choices: HashSet::new(),
            is_completed: false,
            last_read_at: Utc::now(),
            version: 0,
        }
    }

    /// Whether the reader already owns a premium choice.
    pub fn has_purchased(&self, choice: ChoiceId) -> bool {
        self.purchased_choices.contains(&choice)
    }

    /// Number of choices the reader has taken in this story.
    pub fn choices_made(&self) -> u64 {
        (self.visited_history.len() as u64).saturating_sub(1)
    }

    /// Apply a successful advance: move to `to_page`, record the purchase if
    /// the edge was a paid unlock, and mark completion on terminal pages.
    pub fn record_advance(&mut self, to_page: PageId, purchased: Option<ChoiceId>, terminal: bool) {
        self.visited_history.push(to_page);
        self.current_page = to_page;
        if let Some(choice) = purchased {
            self.purchased_choices.insert(choice);
        }
        if terminal {
            self.is_completed = true;
        }
        self.touch();
    }

    /// Step back to the previously visited page. Returns `false` when the
    /// reader is already at the start (nothing is mutated in that case).
    pub fn step_back(&mut self) -> bool {
        if self.visited_history.len() <= 1 {
            return false;
        }
        self.visited_history.pop();
        // Non-empty by the guard above.
        if let Some(previous) = self.visited_history.last() {
            self.current_page = *previous;
        }
        self.is_completed = false;
        self.touch();
        true
    }

    /// Reset to the start page, clearing history and completion.
    ///
    /// When `keep_purchases` is false (the default restart policy), paid
    /// unlocks are forfeited as well; the ledger is never touched either way.
    pub fn reset(&mut self, start_page: PageId, keep_purchases: bool) {
        self.current_page = start_page;
        self.visited_history = vec![start_page];
        if !keep_purchases {
            self.purchased_choices.clear();
        }
        self.is_completed = false;
        self.touch();
    }

    fn touch(&mut self) {
        self.last_read_at = Utc::now();
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (Progress, PageId) {
        let start = PageId::new();
        (Progress::start(UserId::new(), StoryId::new(), start), start)
    }

    #[test]
    fn starts_at_start_page_with_seeded_history() {
        let (progress, start) = fresh();
        assert_eq!(progress.current_page, start);
        assert_eq!(progress.visited_history, vec![start]);
        assert_eq!(progress.version, 0);
        assert_eq!(progress.choices_made(), 0);
        assert!(!progress.is_completed);
    }

    #[test]
    fn advance_moves_cursor_and_bumps_version() {
        let (mut progress, start) = fresh();
        let next = PageId::new();
        progress.record_advance(next, None, false);

        assert_eq!(progress.current_page, next);
        assert_eq!(progress.visited_history, vec![start, next]);
        assert_eq!(progress.version, 1);
        assert_eq!(progress.choices_made(), 1);
    }

    #[test]
    fn paid_advance_records_purchase() {
        let (mut progress, _) = fresh();
        let choice = ChoiceId::new();
        progress.record_advance(PageId::new(), Some(choice), false);
        assert!(progress.has_purchased(choice));
    }

    #[test]
    fn terminal_advance_completes_story() {
        let (mut progress, _) = fresh();
        progress.record_advance(PageId::new(), None, true);
        assert!(progress.is_completed);
    }

    #[test]
    fn step_back_returns_to_previous_page() {
        let (mut progress, start) = fresh();
        let next = PageId::new();
        progress.record_advance(next, None, true);

        assert!(progress.step_back());
        assert_eq!(progress.current_page, start);
        assert_eq!(progress.visited_history, vec![start]);
        // Stepping off a terminal page clears completion.
        assert!(!progress.is_completed);
    }

    #[test]
    fn step_back_at_start_is_refused() {
        let (mut progress, start) = fresh();
        let version = progress.version;
        assert!(!progress.step_back());
        assert_eq!(progress.current_page, start);
        assert_eq!(progress.version, version);
    }

    #[test]
    fn reset_forfeits_purchases_by_default() {
        let (mut progress, start) = fresh();
        let choice = ChoiceId::new();
        progress.record_advance(PageId::new(), Some(choice), true);

        progress.reset(start, false);
        assert_eq!(progress.current_page, start);
        assert_eq!(progress.visited_history, vec![start]);
        assert!(!progress.has_purchased(choice));
        assert!(!progress.is_completed);
    }

    #[test]
    fn reset_can_keep_purchases() {
        let (mut progress, start) = fresh();
        let choice = ChoiceId::new();
        progress.record_advance(PageId::new(), Some(choice), false);

        progress.reset(start, true);
        assert!(progress.has_purchased(choice));
        assert_eq!(progress.visited_history, vec![start]);
    }

    #[test]
    fn cycles_duplicate_history_entries() {
        let (mut progress, start) = fresh();
        let next = PageId::new();
        progress.record_advance(next, None, false);
        progress.record_advance(start, None, false);

        assert_eq!(progress.visited_history, vec![start, next, start]);
        assert_eq!(progress.choices_made(), 2);
    }
}

#[cfg(test)]
mod props {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Step {
        Advance(usize),
        Back,
        Reset,
    }

    fn step_strategy() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0usize..8).prop_map(Step::Advance),
            Just(Step::Back),
            Just(Step::Reset),
        ]
    }

    proptest! {
        /// After any sequence of mutations the cursor equals the last
        /// history entry, the history is never empty, and the version
        /// counts the applied mutations.
        #[test]
        fn cursor_always_matches_history(steps in proptest::collection::vec(step_strategy(), 0..50)) {
            let pages: Vec<PageId> = (0..8).map(|_| PageId::new()).collect();
            let start = pages[0];
            let mut progress = Progress::start(UserId::new(), StoryId::new(), start);
            let mut applied = 0u64;

            for step in steps {
                match step {
                    Step::Advance(i) => {
                        progress.record_advance(pages[i], None, false);
                        applied += 1;
                    }
                    Step::Back => {
                        if progress.step_back() {
                            applied += 1;
                        }
                    }
                    Step::Reset => {
                        progress.reset(start, false);
                        applied += 1;
                    }
                }

                prop_assert!(!progress.visited_history.is_empty());
                prop_assert_eq!(progress.visited_history.last().copied(), Some(progress.current_page));
                prop_assert_eq!(progress.version, applied);
            }
        }
    }
}
