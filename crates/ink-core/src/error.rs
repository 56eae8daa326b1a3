use crate::story::{ChoiceId, PageId, StoryId};

/// Alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur when building or querying a story graph.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The requested story ID is not registered.
    #[error("story not found: {0}")]
    StoryNotFound(StoryId),

    /// The requested page ID does not exist in the story.
    #[error("page not found: {0}")]
    PageNotFound(PageId),

    /// The requested choice ID does not exist in the story.
    #[error("choice not found: {0}")]
    ChoiceNotFound(ChoiceId),

    /// A page with this ID was already added.
    #[error("duplicate page: {0}")]
    DuplicatePage(PageId),

    /// A choice with this ID was already added.
    #[error("duplicate choice: {0}")]
    DuplicateChoice(ChoiceId),

    /// A choice references a page that does not exist.
    #[error("choice {choice} references missing page {page}")]
    DanglingChoice {
        /// The offending choice.
        choice: ChoiceId,
        /// The missing endpoint.
        page: PageId,
    },

    /// A page cannot be reached from the start page.
    #[error("page {0} is unreachable from the start page")]
    UnreachablePage(PageId),

    /// A serialized story graph could not be decoded.
    #[error("malformed story graph: {0}")]
    Malformed(String),
}
