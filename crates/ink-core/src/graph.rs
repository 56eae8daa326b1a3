use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::story::{Choice, ChoiceId, Page, PageId, StoryId};

/// The story graph arena. Owns all pages and choices of one story version.
///
/// Pages and choices live in id-keyed maps; edges are plain id references, so
/// cycles (a choice pointing back to an earlier page) carry no ownership
/// implications. The graph is immutable at traversal time — it is built once,
/// validated, and then only read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryGraph {
    /// Unique identifier of the story this graph belongs to.
    pub id: StoryId,
    /// Display title of the story.
    pub title: String,
    start_page: PageId,
    pages: HashMap<PageId, Page>,
    choices: HashMap<ChoiceId, Choice>,

    // Outgoing edges per page, in authoring order.
    outgoing: HashMap<PageId, Vec<ChoiceId>>,
}

impl StoryGraph {
    /// Create a graph containing only the given start page.
    pub fn new(id: StoryId, title: impl Into<String>, start: Page) -> Self {
        let start_page = start.id;
        let mut pages = HashMap::new();
        pages.insert(start_page, start);
        Self {
            id,
            title: title.into(),
            start_page,
            pages,
            choices: HashMap::new(),
            outgoing: HashMap::new(),
        }
    }

    /// The designated start page.
    pub fn start_page(&self) -> PageId {
        self.start_page
    }

    /// Add a page to the graph. Returns the page's ID.
    pub fn add_page(&mut self, page: Page) -> CoreResult<PageId> {
        if self.pages.contains_key(&page.id) {
            return Err(CoreError::DuplicatePage(page.id));
        }
        let id = page.id;
        self.pages.insert(id, page);
        Ok(id)
    }

    /// Add a choice between two existing pages. Returns the choice's ID.
    ///
    /// Both endpoints must already be present; a dangling reference is
    /// rejected here rather than discovered at traversal time.
    pub fn add_choice(&mut self, choice: Choice) -> CoreResult<ChoiceId> {
        if self.choices.contains_key(&choice.id) {
            return Err(CoreError::DuplicateChoice(choice.id));
        }
        if !self.pages.contains_key(&choice.from_page) {
            return Err(CoreError::DanglingChoice {
                choice: choice.id,
                page: choice.from_page,
            });
        }
        if !self.pages.contains_key(&choice.to_page) {
            return Err(CoreError::DanglingChoice {
                choice: choice.id,
                page: choice.to_page,
            });
        }

        let id = choice.id;
        self.outgoing.entry(choice.from_page).or_default().push(id);
        self.choices.insert(id, choice);
        Ok(id)
    }

    /// Get a page by ID.
    pub fn page(&self, id: PageId) -> CoreResult<&Page> {
        self.pages.get(&id).ok_or(CoreError::PageNotFound(id))
    }

    /// Get a choice by ID.
    pub fn choice(&self, id: ChoiceId) -> CoreResult<&Choice> {
        self.choices.get(&id).ok_or(CoreError::ChoiceNotFound(id))
    }

    /// Outgoing choices of a page, in authoring order. Empty for terminal
    /// pages.
    pub fn outgoing_choices(&self, page: PageId) -> CoreResult<Vec<&Choice>> {
        if !self.pages.contains_key(&page) {
            return Err(CoreError::PageNotFound(page));
        }
        Ok(self
            .outgoing
            .get(&page)
            .map(|ids| ids.iter().filter_map(|id| self.choices.get(id)).collect())
            .unwrap_or_default())
    }

    /// Whether a page has no outgoing choices.
    pub fn is_terminal(&self, page: PageId) -> CoreResult<bool> {
        Ok(self.outgoing_choices(page)?.is_empty())
    }

    /// Number of pages in the graph.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of choices in the graph.
    pub fn choice_count(&self) -> usize {
        self.choices.len()
    }

    /// Check that every page is reachable from the start page.
    ///
    /// Endpoint existence is already enforced by [`StoryGraph::add_choice`];
    /// this pass catches orphaned pages. Cycles are legal and traversed once.
    pub fn validate(&self) -> CoreResult<()> {
        let mut seen: HashSet<PageId> = HashSet::new();
        let mut queue: VecDeque<PageId> = VecDeque::new();
        seen.insert(self.start_page);
        queue.push_back(self.start_page);

        while let Some(page) = queue.pop_front() {
            if let Some(ids) = self.outgoing.get(&page) {
                for choice_id in ids {
                    if let Some(choice) = self.choices.get(choice_id) {
                        if seen.insert(choice.to_page) {
                            queue.push_back(choice.to_page);
                        }
                    }
                }
            }
        }

        for id in self.pages.keys() {
            if !seen.contains(id) {
                return Err(CoreError::UnreachablePage(*id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::PageKind;

    fn linear_graph() -> (StoryGraph, PageId, PageId) {
        let start = Page::new(1, "You wake up in a forest.", PageKind::Story);
        let start_id = start.id;
        let mut graph = StoryGraph::new(StoryId::new(), "The Forest", start);

        let clearing = Page::new(2, "A moonlit clearing.", PageKind::Ending);
        let clearing_id = graph.add_page(clearing).unwrap();
        graph
            .add_choice(Choice::free(start_id, clearing_id, "Walk north"))
            .unwrap();
        (graph, start_id, clearing_id)
    }

    #[test]
    fn add_and_get_page() {
        let (graph, start_id, _) = linear_graph();
        let page = graph.page(start_id).unwrap();
        assert_eq!(page.page_number, 1);
        assert!(page.content.contains("forest"));
    }

    #[test]
    fn missing_page_is_an_error() {
        let (graph, _, _) = linear_graph();
        assert!(matches!(
            graph.page(PageId::new()),
            Err(CoreError::PageNotFound(_))
        ));
    }

    #[test]
    fn duplicate_page_rejected() {
        let (mut graph, start_id, _) = linear_graph();
        let mut dup = Page::new(9, "copy", PageKind::Story);
        dup.id = start_id;
        assert!(matches!(
            graph.add_page(dup),
            Err(CoreError::DuplicatePage(_))
        ));
    }

    #[test]
    fn dangling_choice_rejected() {
        let (mut graph, start_id, _) = linear_graph();
        let result = graph.add_choice(Choice::free(start_id, PageId::new(), "Into the void"));
        assert!(matches!(result, Err(CoreError::DanglingChoice { .. })));
    }

    #[test]
    fn outgoing_choices_keep_authoring_order() {
        let (mut graph, start_id, clearing_id) = linear_graph();
        let cave = graph
            .add_page(Page::new(3, "A dark cave.", PageKind::Story))
            .unwrap();
        graph
            .add_choice(Choice::premium(start_id, cave, "Enter the cave", 15))
            .unwrap();

        let texts: Vec<&str> = graph
            .outgoing_choices(start_id)
            .unwrap()
            .iter()
            .map(|c| c.text.as_str())
            .collect();
        assert_eq!(texts, vec!["Walk north", "Enter the cave"]);

        assert!(graph.outgoing_choices(clearing_id).unwrap().is_empty());
        assert!(graph.is_terminal(clearing_id).unwrap());
    }

    #[test]
    fn validate_accepts_cycles() {
        let (mut graph, start_id, clearing_id) = linear_graph();
        // A loop back to the start is legal.
        graph
            .add_choice(Choice::free(clearing_id, start_id, "Turn back"))
            .unwrap();
        graph.validate().unwrap();
    }

    #[test]
    fn validate_rejects_unreachable_page() {
        let (mut graph, _, _) = linear_graph();
        let island = graph
            .add_page(Page::new(99, "Nobody can get here.", PageKind::Story))
            .unwrap();
        let err = graph.validate().unwrap_err();
        assert!(matches!(err, CoreError::UnreachablePage(id) if id == island));
    }

    #[test]
    fn json_round_trip() {
        let (graph, start_id, _) = linear_graph();
        let json = serde_json::to_string(&graph).unwrap();
        let restored: StoryGraph = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.start_page(), start_id);
        assert_eq!(restored.page_count(), 2);
        assert_eq!(restored.choice_count(), 1);
        assert_eq!(restored.outgoing_choices(start_id).unwrap().len(), 1);
    }
}
