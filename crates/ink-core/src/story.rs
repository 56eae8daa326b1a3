use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generate a new random user ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Unique identifier for a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoryId(pub Uuid);

impl StoryId {
    /// Generate a new random story ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Unique identifier for a page within a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId(pub Uuid);

impl PageId {
    /// Generate a new random page ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Unique identifier for a choice (a directed edge between two pages).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChoiceId(pub Uuid);

impl ChoiceId {
    /// Generate a new random choice ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChoiceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// The kind of a page. Rendering and evaluation switch on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    /// A narrative page the reader passes through.
    Story,
    /// A hub page whose purpose is the decision itself.
    Choice,
    /// An authored ending. Pages with no outgoing choices are terminal
    /// regardless of this tag; the tag lets authors mark endings explicitly.
    Ending,
}

/// A node in the story graph; the unit of content a reader views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Unique identifier for this page.
    pub id: PageId,
    /// Authoring-order page number, unique within a story.
    pub page_number: u32,
    /// The narrative text shown to the reader.
    pub content: String,
    /// The page's kind tag.
    pub kind: PageKind,
}

impl Page {
    /// Create a new page with a random ID.
    pub fn new(page_number: u32, content: impl Into<String>, kind: PageKind) -> Self {
        Self {
            id: PageId::new(),
            page_number,
            content: content.into(),
            kind,
        }
    }

    /// Whether the author tagged this page as an ending.
    pub fn is_ending(&self) -> bool {
        self.kind == PageKind::Ending
    }
}

/// Whether a choice is free to take or gated behind a currency cost.
///
/// Premium-with-zero-cost is unrepresentable: a gated choice always carries
/// its price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceAccess {
    /// The choice can always be taken.
    Free,
    /// The choice must be unlocked by debiting `cost` currency units.
    Premium {
        /// Price in currency units.
        cost: u32,
    },
}

/// A directed edge between two pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Unique identifier for this choice.
    pub id: ChoiceId,
    /// The page this choice departs from.
    pub from_page: PageId,
    /// The page this choice leads to. May point backwards — cycles are legal.
    pub to_page: PageId,
    /// The label shown to the reader.
    pub text: String,
    /// Free or premium-gated.
    pub access: ChoiceAccess,
}

impl Choice {
    /// Create a free choice with a random ID.
    pub fn free(from_page: PageId, to_page: PageId, text: impl Into<String>) -> Self {
        Self {
            id: ChoiceId::new(),
            from_page,
            to_page,
            text: text.into(),
            access: ChoiceAccess::Free,
        }
    }

    /// Create a premium choice with a random ID.
    pub fn premium(
        from_page: PageId,
        to_page: PageId,
        text: impl Into<String>,
        cost: u32,
    ) -> Self {
        Self {
            id: ChoiceId::new(),
            from_page,
            to_page,
            text: text.into(),
            access: ChoiceAccess::Premium { cost },
        }
    }

    /// Whether this choice is premium-gated.
    pub fn is_premium(&self) -> bool {
        matches!(self.access, ChoiceAccess::Premium { .. })
    }

    /// The cost to unlock this choice. Zero for free choices.
    pub fn cost(&self) -> u32 {
        match self.access {
            ChoiceAccess::Free => 0,
            ChoiceAccess::Premium { cost } => cost,
        }
    }
}
