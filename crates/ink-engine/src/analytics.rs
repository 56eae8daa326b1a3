//! Process-wide analytics collection with a bounded buffer.
//!
//! The collector is an explicit service instance: construct one per process
//! and pass it to whatever records events. There is no global state. The
//! buffer is bounded — when full, the oldest event is dropped — and
//! [`AnalyticsCollector::flush`] is the explicit hand-off contract to the
//! (external) analytics pipeline.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use ink_core::{ChoiceId, StoryId, UserId};
use serde::Serialize;
use tracing::debug;

/// Something a reader did that the product wants to count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AnalyticsEvent {
    /// A choice was taken.
    ChoiceMade {
        /// The reader.
        user: UserId,
        /// The story navigated.
        story: StoryId,
        /// The choice taken.
        choice: ChoiceId,
    },
    /// A premium choice was paid for.
    PurchaseCompleted {
        /// The reader.
        user: UserId,
        /// The unlocked choice.
        choice: ChoiceId,
        /// The price paid.
        cost: u32,
    },
    /// A reader reached a terminal page.
    StoryCompleted {
        /// The reader.
        user: UserId,
        /// The finished story.
        story: StoryId,
    },
    /// A reading session ended.
    SessionEnded {
        /// The reader.
        user: UserId,
        /// Session length in seconds.
        seconds: u32,
    },
}

/// Bounded in-memory event buffer, cheap to clone and share.
#[derive(Debug, Clone)]
pub struct AnalyticsCollector {
    buffer: Arc<Mutex<VecDeque<AnalyticsEvent>>>,
    capacity: usize,
}

impl AnalyticsCollector {
    /// Create a collector holding at most `capacity` events (at least 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<AnalyticsEvent>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an event. Never blocks on a full buffer; the oldest event is
    /// dropped instead — analytics are best-effort, not authoritative.
    pub fn record(&self, event: AnalyticsEvent) {
        let mut buffer = self.lock();
        if buffer.len() == self.capacity {
            let dropped = buffer.pop_front();
            debug!(?dropped, "analytics buffer full, dropping oldest event");
        }
        buffer.push_back(event);
    }

    /// Drain and return everything recorded since the last flush.
    pub fn flush(&self) -> Vec<AnalyticsEvent> {
        self.lock().drain(..).collect()
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
