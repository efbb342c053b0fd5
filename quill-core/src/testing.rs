//! Testing utilities for the writing engine.
//!
//! This module provides tools for integration testing:
//! - `MockAssistant` for deterministic suggestion flows without API calls
//! - `StoryBuilder` for assembling story trees without threading parent ids
//! - `EditorHarness` for scripted editing sessions
//! - Assertion helpers for verifying scene state

use crate::document::Block;
use crate::paragraph::ParagraphId;
use crate::scene::Scene;
use crate::session::SceneSession;
use crate::story::{NodeId, NodeKind, Story};
use crate::suggestion::{has_suggestion, SuggestionError, SuggestionLedger, SuggestionTicket};

/// A scripted completion from the mock assistant.
#[derive(Debug, Clone)]
pub enum MockCompletion {
    /// Deliver this text as the suggestion.
    Text(String),
    /// Fail the request, clearing the loading flag.
    Failure,
}

impl MockCompletion {
    pub fn text(text: impl Into<String>) -> Self {
        MockCompletion::Text(text.into())
    }
}

/// A mock assistant that resolves suggestion requests from a script.
///
/// Use this for deterministic integration tests without API calls.
/// Completions route through the real lifecycle ledger, so stale-ticket
/// and cancellation behavior match the live path.
pub struct MockAssistant {
    /// Scripted completions to return in order.
    completions: Vec<MockCompletion>,
    /// Index of next completion to return.
    completion_index: usize,
    /// Lifecycle ledger (shared with the real assistant flow).
    ledger: SuggestionLedger,
}

impl MockAssistant {
    /// Create a new mock assistant with scripted completions.
    pub fn new(completions: Vec<MockCompletion>) -> Self {
        Self {
            completions,
            completion_index: 0,
            ledger: SuggestionLedger::new(),
        }
    }

    /// Run the full suggestion flow using the next scripted completion.
    ///
    /// Returns whether the completion landed on the paragraph.
    pub fn suggest(
        &mut self,
        scene: &mut Scene,
        paragraph_id: ParagraphId,
    ) -> Result<bool, SuggestionError> {
        let ticket = self.ledger.begin(scene, paragraph_id)?;
        Ok(self.resolve(scene, ticket))
    }

    /// Begin a request but hold the completion.
    ///
    /// Lets tests interleave edits, cancellations, or competing requests
    /// between begin and resolve.
    pub fn begin(
        &mut self,
        scene: &mut Scene,
        paragraph_id: ParagraphId,
    ) -> Result<SuggestionTicket, SuggestionError> {
        self.ledger.begin(scene, paragraph_id)
    }

    /// Resolve a held ticket with the next scripted completion.
    pub fn resolve(&mut self, scene: &mut Scene, ticket: SuggestionTicket) -> bool {
        let completion = if self.completion_index < self.completions.len() {
            let c = self.completions[self.completion_index].clone();
            self.completion_index += 1;
            c
        } else {
            MockCompletion::text("The assistant has no more scripted completions.")
        };

        match completion {
            MockCompletion::Text(text) => self.ledger.deliver(scene, ticket, text),
            MockCompletion::Failure => {
                self.ledger.fail(scene, ticket);
                false
            }
        }
    }

    /// Get the lifecycle ledger.
    pub fn ledger(&self) -> &SuggestionLedger {
        &self.ledger
    }

    /// Get the mutable lifecycle ledger.
    pub fn ledger_mut(&mut self) -> &mut SuggestionLedger {
        &mut self.ledger
    }

    /// Add a completion to the queue.
    pub fn queue_completion(&mut self, completion: MockCompletion) {
        self.completions.push(completion);
    }

    /// Reset the completion index to replay from the beginning.
    pub fn reset(&mut self) {
        self.completion_index = 0;
    }
}

/// Builds a story tree for tests without threading parent ids by hand.
///
/// Structural methods chain; `paragraph` returns the new paragraph's id
/// so retrieval tests can target it directly.
pub struct StoryBuilder {
    story: Story,
    current_book: Option<NodeId>,
    current_chapter: Option<NodeId>,
    current_scene: Option<NodeId>,
}

impl StoryBuilder {
    pub fn new() -> Self {
        Self {
            story: Story::new(),
            current_book: None,
            current_chapter: None,
            current_scene: None,
        }
    }

    /// Start a new book; later chapters land under it.
    pub fn book(&mut self, title: impl Into<String>) -> &mut Self {
        let id = self
            .story
            .add_node(NodeKind::Book, title, None)
            .expect("root accepts book nodes");
        self.current_book = Some(id);
        self.current_chapter = None;
        self.current_scene = None;
        self
    }

    /// Start a new chapter under the current book.
    pub fn chapter(&mut self, title: impl Into<String>) -> &mut Self {
        let id = self
            .story
            .add_node(NodeKind::Chapter, title, self.current_book)
            .expect("book accepts chapter nodes");
        self.current_chapter = Some(id);
        self.current_scene = None;
        self
    }

    /// Start a new scene under the current chapter.
    pub fn scene(&mut self, title: impl Into<String>) -> &mut Self {
        let id = self
            .story
            .add_node(NodeKind::Scene, title, self.current_chapter)
            .expect("chapter accepts scene nodes");
        self.current_scene = Some(id);
        self
    }

    /// Append a paragraph to the current scene.
    pub fn paragraph(&mut self, text: impl Into<String>) -> ParagraphId {
        let scene_id = self.current_scene.expect("a scene is open");
        self.story
            .scene_mut(scene_id)
            .expect("open scene exists")
            .create_paragraph(text.into(), None)
    }

    /// The id of the scene currently being filled.
    pub fn current_scene_id(&self) -> Option<NodeId> {
        self.current_scene
    }

    pub fn build(&mut self) -> Story {
        std::mem::take(&mut self.story)
    }
}

impl Default for StoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Test harness for running editing sessions.
///
/// Editor input routes through the real document sync path, so
/// identity-keyed change detection and update accounting are exercised
/// rather than bypassed.
pub struct EditorHarness {
    /// The scene under edit.
    pub scene: Scene,
    /// The open editing session.
    pub session: SceneSession,
    /// The mock assistant.
    pub assistant: MockAssistant,
}

impl EditorHarness {
    /// Create a harness over a scene with the given paragraphs.
    pub fn with_paragraphs(texts: &[&str]) -> Self {
        let mut scene = Scene::new(NodeId::new(), "Test Scene");
        for text in texts {
            scene.create_paragraph(*text, None);
        }
        let session = SceneSession::new(&scene);
        let assistant = MockAssistant::new(Vec::new());

        Self {
            scene,
            session,
            assistant,
        }
    }

    /// Queue a suggestion completion.
    pub fn expect_completion(&mut self, text: impl Into<String>) -> &mut Self {
        self.assistant.queue_completion(MockCompletion::text(text));
        self
    }

    /// Retype one paragraph in the editor and sync the change through.
    ///
    /// Returns the paragraph ids the editor reported as changed.
    pub fn type_text(&mut self, index: usize, text: &str) -> Vec<ParagraphId> {
        let mut document = self.session.document(&self.scene);
        let id = document.blocks[index]
            .id
            .expect("rendered blocks carry ids");
        document.blocks[index] = Block::text(id, text);
        self.session
            .apply_editor_update(&mut self.scene, &document)
            .expect("editor update applies")
    }

    /// Request a suggestion for the paragraph at `index`.
    pub fn suggest(&mut self, index: usize) -> bool {
        let id = self.paragraph_id(index);
        self.assistant
            .suggest(&mut self.scene, id)
            .expect("paragraph exists")
    }

    /// Accept the pending suggestion at `index`.
    pub fn accept(&mut self, index: usize) -> Result<(), SuggestionError> {
        let id = self.paragraph_id(index);
        self.assistant.ledger_mut().accept(&mut self.scene, id)
    }

    /// Reject the pending suggestion at `index`.
    pub fn reject(&mut self, index: usize) -> Result<(), SuggestionError> {
        let id = self.paragraph_id(index);
        self.assistant.ledger_mut().reject(&mut self.scene, id)
    }

    /// Get the id of the paragraph at `index`.
    pub fn paragraph_id(&self, index: usize) -> ParagraphId {
        self.scene.paragraphs[index].id
    }

    /// Get the plain text of the paragraph at `index`.
    pub fn plain_text(&self, index: usize) -> String {
        self.scene.paragraphs[index].plain_text()
    }

    /// Get all paragraph texts in order.
    pub fn plain_texts(&self) -> Vec<String> {
        self.scene
            .paragraphs
            .iter()
            .map(|p| p.plain_text())
            .collect()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the paragraph at `index` holds the expected text.
#[track_caller]
pub fn assert_plain_text(harness: &EditorHarness, index: usize, expected: &str) {
    let actual = harness.plain_text(index);
    assert_eq!(
        actual, expected,
        "Expected paragraph {index} to read '{expected}', got '{actual}'"
    );
}

/// Assert the paragraph at `index` carries a pending suggestion.
#[track_caller]
pub fn assert_has_suggestion(harness: &EditorHarness, index: usize) {
    assert!(
        has_suggestion(&harness.scene.paragraphs[index]),
        "Expected paragraph {index} to carry a suggestion"
    );
}

/// Assert the paragraph at `index` carries NO pending suggestion.
#[track_caller]
pub fn assert_no_suggestion(harness: &EditorHarness, index: usize) {
    assert!(
        !has_suggestion(&harness.scene.paragraphs[index]),
        "Expected paragraph {index} to NOT carry a suggestion"
    );
}

/// Assert the paragraph at `index` is waiting on a request.
#[track_caller]
pub fn assert_loading(harness: &EditorHarness, index: usize) {
    assert!(
        harness.scene.paragraphs[index].extra_loading,
        "Expected paragraph {index} to be loading"
    );
}

/// Assert the scene holds exactly the given texts, in order.
#[track_caller]
pub fn assert_scene_reads(harness: &EditorHarness, expected: &[&str]) {
    let actual = harness.plain_texts();
    assert_eq!(
        actual, expected,
        "Expected scene to read {expected:?}, got {actual:?}"
    );
}
