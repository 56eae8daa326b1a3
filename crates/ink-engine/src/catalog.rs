//! Read-only store of validated story graphs.

use std::collections::HashMap;
use std::sync::Arc;

use ink_core::{Choice, CoreError, CoreResult, Page, PageId, StoryGraph, StoryId};

/// Story-id-keyed collection of immutable, validated graphs.
///
/// Graphs are registered up front (authored externally, loaded read-only);
/// traversal never mutates them.
#[derive(Debug, Clone, Default)]
pub struct StoryCatalog {
    graphs: HashMap<StoryId, Arc<StoryGraph>>,
}

impl StoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a story graph. Returns the story's ID.
    pub fn insert(&mut self, graph: StoryGraph) -> CoreResult<StoryId> {
        graph.validate()?;
        let id = graph.id;
        self.graphs.insert(id, Arc::new(graph));
        Ok(id)
    }

    /// Deserialize a graph from JSON, validate it, and register it.
    pub fn insert_json(&mut self, json: &str) -> CoreResult<StoryId> {
        let graph: StoryGraph =
            serde_json::from_str(json).map_err(|e| CoreError::Malformed(e.to_string()))?;
        self.insert(graph)
    }

    /// Look up a registered graph.
    pub fn graph(&self, story: StoryId) -> CoreResult<&Arc<StoryGraph>> {
        self.graphs
            .get(&story)
            .ok_or(CoreError::StoryNotFound(story))
    }

    /// Look up a page within a registered story.
    pub fn page(&self, story: StoryId, page: PageId) -> CoreResult<&Page> {
        self.graph(story)?.page(page)
    }

    /// Outgoing choices of a page, in authoring order.
    pub fn outgoing_choices(&self, story: StoryId, page: PageId) -> CoreResult<Vec<&Choice>> {
        self.graph(story)?.outgoing_choices(page)
    }

    /// Number of registered stories.
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}
