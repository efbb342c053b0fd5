//! Scene records and the paragraph store.
//!
//! A scene owns the authoritative ordered list of paragraph records. All
//! structural mutation (insert, remove, move) and field updates go through
//! the operations here; the editing surface never touches the list
//! directly. Updates maintain the word count and the AI/human character
//! accounting that drives state demotion.

use crate::paragraph::{
    count_words, now_millis, Comment, InventoryAction, Paragraph, ParagraphId, ParagraphState,
    ParagraphText, PlotAction,
};
use crate::story::{NodeId, PlotPointId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from paragraph store operations.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Unknown paragraph: {0}")]
    UnknownParagraph(ParagraphId),
}

/// Direction for paragraph reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// A partial paragraph update.
///
/// Unset fields leave the record untouched; `extra` and `translation`
/// distinguish "set to a value" from "clear" via dedicated builders.
#[derive(Debug, Clone, Default)]
pub struct ParagraphUpdate {
    text: Option<ParagraphText>,
    state: Option<ParagraphState>,
    extra: Option<Option<String>>,
    extra_loading: Option<bool>,
    translation: Option<Option<String>>,
    comments: Option<Vec<Comment>>,
    modified_at: Option<u64>,
}

impl ParagraphUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<ParagraphText>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_state(mut self, state: ParagraphState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(Some(extra.into()));
        self
    }

    pub fn with_extra_cleared(mut self) -> Self {
        self.extra = Some(None);
        self
    }

    pub fn with_extra_loading(mut self, loading: bool) -> Self {
        self.extra_loading = Some(loading);
        self
    }

    pub fn with_translation(mut self, translation: impl Into<String>) -> Self {
        self.translation = Some(Some(translation.into()));
        self
    }

    pub fn with_translation_cleared(mut self) -> Self {
        self.translation = Some(None);
        self
    }

    pub fn with_comments(mut self, comments: Vec<Comment>) -> Self {
        self.comments = Some(comments);
        self
    }

    pub fn with_modified_at(mut self, modified_at: u64) -> Self {
        self.modified_at = Some(modified_at);
        self
    }

    /// True when the update would not change anything.
    pub fn is_noop(&self) -> bool {
        self.text.is_none()
            && self.state.is_none()
            && self.extra.is_none()
            && self.extra_loading.is_none()
            && self.translation.is_none()
            && self.comments.is_none()
            && self.modified_at.is_none()
    }
}

/// A scene: title, summary, and the ordered paragraph list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: NodeId,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
    /// The paragraph holding the editing cursor, if any.
    #[serde(default)]
    pub selected_paragraph: Option<ParagraphId>,
    /// Cached total of per-paragraph word counts.
    #[serde(default)]
    pub words: u32,
    #[serde(default)]
    pub modified_at: u64,
}

impl Scene {
    /// Create an empty scene.
    pub fn new(id: NodeId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            summary: String::new(),
            paragraphs: Vec::new(),
            selected_paragraph: None,
            words: 0,
            modified_at: now_millis(),
        }
    }

    /// Look up a paragraph.
    pub fn paragraph(&self, id: ParagraphId) -> Option<&Paragraph> {
        self.paragraphs.iter().find(|p| p.id == id)
    }

    /// Position of a paragraph in the scene.
    pub fn index_of(&self, id: ParagraphId) -> Option<usize> {
        self.paragraphs.iter().position(|p| p.id == id)
    }

    /// IDs in scene order.
    pub fn paragraph_ids(&self) -> Vec<ParagraphId> {
        self.paragraphs.iter().map(|p| p.id).collect()
    }

    /// Total word count of the scene.
    pub fn word_count(&self) -> u32 {
        self.words
    }

    /// True when any paragraph is in the `ai` state.
    pub fn has_ai(&self) -> bool {
        self.paragraphs
            .iter()
            .any(|p| p.state == ParagraphState::Ai)
    }

    /// Append a paragraph at the end of the scene.
    pub fn push_paragraph(&mut self, paragraph: Paragraph) {
        self.insert_paragraph(paragraph, None);
    }

    /// Insert a paragraph after the anchor, or at the end when the anchor
    /// is absent or unknown.
    pub fn insert_paragraph(
        &mut self,
        paragraph: Paragraph,
        after: Option<ParagraphId>,
    ) -> ParagraphId {
        let index = after
            .and_then(|anchor| self.index_of(anchor).map(|i| i + 1))
            .unwrap_or(self.paragraphs.len());
        self.insert_paragraph_at(paragraph, index)
    }

    /// Insert a paragraph at a position (clamped to the scene length).
    ///
    /// The full character count of the incoming text is stamped into the
    /// bucket matching the paragraph's state, and the word count is
    /// recomputed.
    pub fn insert_paragraph_at(&mut self, mut paragraph: Paragraph, index: usize) -> ParagraphId {
        let characters = count_characters(&paragraph.text);
        match paragraph.state {
            ParagraphState::Ai => paragraph.ai_characters = characters,
            _ => paragraph.human_characters = characters,
        }
        paragraph.words = count_words(&paragraph.text.plain());

        let index = index.min(self.paragraphs.len());
        let id = paragraph.id;
        self.paragraphs.insert(index, paragraph);
        self.recount_words();
        self.touch();
        id
    }

    /// Create a fresh draft paragraph with the given text.
    pub fn create_paragraph(
        &mut self,
        text: impl Into<ParagraphText>,
        after: Option<ParagraphId>,
    ) -> ParagraphId {
        self.insert_paragraph(Paragraph::new(text), after)
    }

    /// Apply a partial update to one paragraph.
    ///
    /// Text changes recount words and feed the character accounting:
    /// added characters are always the author's; removed characters come
    /// out of the generated pool first. A paragraph whose human characters
    /// come to exceed its (non-zero) AI characters is demoted to draft.
    /// An explicit state change re-stamps both buckets from the character
    /// count of the text as it was before this update.
    pub fn update_paragraph(
        &mut self,
        id: ParagraphId,
        update: ParagraphUpdate,
    ) -> Result<(), SceneError> {
        let index = self.index_of(id).ok_or(SceneError::UnknownParagraph(id))?;
        let paragraph = &mut self.paragraphs[index];

        let previous_state = paragraph.state;
        let previous_characters = count_characters(&paragraph.text);
        let mut next_state = update.state;
        let text_changed = update.text.is_some();

        if let Some(new_text) = update.text {
            let new_characters = count_characters(&new_text);

            // Records that predate character tracking carry zero in both
            // buckets; seed from the current text before applying the delta.
            if paragraph.ai_characters == 0 && paragraph.human_characters == 0 {
                match previous_state {
                    ParagraphState::Ai => paragraph.ai_characters = previous_characters,
                    _ => paragraph.human_characters = previous_characters,
                }
            }

            if new_characters >= previous_characters {
                paragraph.human_characters += new_characters - previous_characters;
            } else {
                let removed = previous_characters - new_characters;
                let from_ai = removed.min(paragraph.ai_characters);
                paragraph.ai_characters -= from_ai;
                paragraph.human_characters =
                    paragraph.human_characters.saturating_sub(removed - from_ai);
            }

            if paragraph.ai_characters > 0
                && paragraph.human_characters > paragraph.ai_characters
            {
                next_state = Some(ParagraphState::Draft);
            }

            paragraph.words = count_words(&new_text.plain());
            paragraph.text = new_text;
        }

        if let Some(requested) = update.state {
            if requested != previous_state {
                match requested {
                    ParagraphState::Ai => {
                        paragraph.ai_characters = previous_characters;
                        paragraph.human_characters = 0;
                    }
                    _ => {
                        paragraph.human_characters = previous_characters;
                        paragraph.ai_characters = 0;
                    }
                }
            }
        }

        if let Some(state) = next_state {
            paragraph.state = state;
        }
        if let Some(extra) = update.extra {
            paragraph.extra = extra;
        }
        if let Some(loading) = update.extra_loading {
            paragraph.extra_loading = loading;
        }
        if let Some(translation) = update.translation {
            paragraph.translation = translation;
        }
        if let Some(comments) = update.comments {
            paragraph.comments = comments;
        }
        if let Some(modified_at) = update.modified_at {
            paragraph.modified_at = modified_at;
        }

        if text_changed {
            self.recount_words();
        }
        self.touch();
        Ok(())
    }

    /// Remove a paragraph. Returns false when the ID is unknown.
    pub fn remove_paragraph(&mut self, id: ParagraphId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.paragraphs.remove(index);
        if self.selected_paragraph == Some(id) {
            self.selected_paragraph = None;
        }
        self.recount_words();
        self.touch();
        true
    }

    /// Swap a paragraph with its neighbor. No-op at the edges and for
    /// unknown IDs.
    pub fn move_paragraph(&mut self, id: ParagraphId, direction: MoveDirection) {
        let Some(index) = self.index_of(id) else {
            return;
        };
        match direction {
            MoveDirection::Up if index > 0 => {
                self.paragraphs.swap(index, index - 1);
                self.touch();
            }
            MoveDirection::Down if index + 1 < self.paragraphs.len() => {
                self.paragraphs.swap(index, index + 1);
                self.touch();
            }
            _ => {}
        }
    }

    /// Record which paragraph holds the cursor.
    pub fn set_selected_paragraph(&mut self, id: Option<ParagraphId>) {
        self.selected_paragraph = id;
    }

    /// Append an inventory ledger entry to a paragraph.
    pub fn add_inventory_action(
        &mut self,
        id: ParagraphId,
        action: InventoryAction,
    ) -> Result<(), SceneError> {
        let index = self.index_of(id).ok_or(SceneError::UnknownParagraph(id))?;
        self.paragraphs[index].inventory_actions.push(action);
        self.touch();
        Ok(())
    }

    /// Drop every inventory entry for one item from a paragraph.
    pub fn remove_inventory_actions(
        &mut self,
        id: ParagraphId,
        item_name: &str,
    ) -> Result<(), SceneError> {
        let index = self.index_of(id).ok_or(SceneError::UnknownParagraph(id))?;
        self.paragraphs[index]
            .inventory_actions
            .retain(|a| a.item_name != item_name);
        self.touch();
        Ok(())
    }

    /// Append a plot-point lifecycle entry to a paragraph.
    pub fn add_plot_action(&mut self, id: ParagraphId, action: PlotAction) -> Result<(), SceneError> {
        let index = self.index_of(id).ok_or(SceneError::UnknownParagraph(id))?;
        self.paragraphs[index].plot_point_actions.push(action);
        self.touch();
        Ok(())
    }

    /// Drop every lifecycle entry for one plot point from a paragraph.
    pub fn remove_plot_actions(
        &mut self,
        id: ParagraphId,
        plot_point_id: PlotPointId,
    ) -> Result<(), SceneError> {
        let index = self.index_of(id).ok_or(SceneError::UnknownParagraph(id))?;
        self.paragraphs[index]
            .plot_point_actions
            .retain(|a| a.plot_point_id != plot_point_id);
        self.touch();
        Ok(())
    }

    /// Detach the tail of the scene starting at the given paragraph,
    /// inclusive.
    pub fn split_off(&mut self, at: ParagraphId) -> Result<Vec<Paragraph>, SceneError> {
        let index = self.index_of(at).ok_or(SceneError::UnknownParagraph(at))?;
        let tail = self.paragraphs.split_off(index);
        self.recount_words();
        self.touch();
        Ok(tail)
    }

    pub(crate) fn recount_words(&mut self) {
        self.words = self.paragraphs.iter().map(|p| p.words).sum();
    }

    fn touch(&mut self) {
        self.modified_at = now_millis();
    }
}

fn count_characters(text: &ParagraphText) -> u64 {
    text.plain().chars().count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> Scene {
        Scene::new(NodeId::new(), "Test Scene")
    }

    #[test]
    fn test_insert_stamps_human_characters_for_draft() {
        let mut scene = scene();
        let id = scene.create_paragraph("hello", None);
        let p = scene.paragraph(id).unwrap();
        assert_eq!(p.human_characters, 5);
        assert_eq!(p.ai_characters, 0);
        assert_eq!(p.words, 1);
    }

    #[test]
    fn test_insert_stamps_ai_characters_for_ai_state() {
        let mut scene = scene();
        let id = scene.insert_paragraph(
            Paragraph::new("generated").with_state(ParagraphState::Ai),
            None,
        );
        let p = scene.paragraph(id).unwrap();
        assert_eq!(p.ai_characters, 9);
        assert_eq!(p.human_characters, 0);
    }

    #[test]
    fn test_insert_after_anchor() {
        let mut scene = scene();
        let first = scene.create_paragraph("first", None);
        let last = scene.create_paragraph("last", None);
        let middle = scene.create_paragraph("middle", Some(first));
        assert_eq!(scene.paragraph_ids(), vec![first, middle, last]);
    }

    #[test]
    fn test_insert_with_unknown_anchor_appends() {
        let mut scene = scene();
        let first = scene.create_paragraph("first", None);
        let stray = scene.create_paragraph("stray", Some(ParagraphId::new()));
        assert_eq!(scene.paragraph_ids(), vec![first, stray]);
    }

    #[test]
    fn test_added_characters_count_as_human() {
        let mut scene = scene();
        let id = scene.insert_paragraph(
            Paragraph::new("generated text").with_state(ParagraphState::Ai),
            None,
        );

        scene
            .update_paragraph(id, ParagraphUpdate::new().with_text("generated text and more"))
            .unwrap();

        let p = scene.paragraph(id).unwrap();
        assert_eq!(p.ai_characters, 14);
        assert_eq!(p.human_characters, 9);
    }

    #[test]
    fn test_removed_characters_reduce_ai_first() {
        let mut scene = scene();
        let id = scene.insert_paragraph(
            Paragraph::new("0123456789").with_state(ParagraphState::Ai),
            None,
        );

        scene
            .update_paragraph(id, ParagraphUpdate::new().with_text("0123"))
            .unwrap();

        let p = scene.paragraph(id).unwrap();
        assert_eq!(p.ai_characters, 4);
        assert_eq!(p.human_characters, 0);
    }

    #[test]
    fn test_removal_overflow_reduces_human_after_ai() {
        let mut scene = scene();
        let id = scene.insert_paragraph(
            Paragraph::new("abcde").with_state(ParagraphState::Ai),
            None,
        );
        // Grow by three human characters first.
        scene
            .update_paragraph(id, ParagraphUpdate::new().with_text("abcdefgh"))
            .unwrap();
        assert_eq!(scene.paragraph(id).unwrap().human_characters, 3);

        // Cut six: five from AI, one from human.
        scene
            .update_paragraph(id, ParagraphUpdate::new().with_text("ab"))
            .unwrap();
        let p = scene.paragraph(id).unwrap();
        assert_eq!(p.ai_characters, 0);
        assert_eq!(p.human_characters, 2);
    }

    #[test]
    fn test_heavy_human_edit_demotes_ai_paragraph_to_draft() {
        let mut scene = scene();
        let id = scene.insert_paragraph(
            Paragraph::new("short").with_state(ParagraphState::Ai),
            None,
        );

        scene
            .update_paragraph(
                id,
                ParagraphUpdate::new().with_text("short but now much longer than it was"),
            )
            .unwrap();

        let p = scene.paragraph(id).unwrap();
        assert!(p.human_characters > p.ai_characters);
        assert_eq!(p.state, ParagraphState::Draft);
    }

    #[test]
    fn test_small_edit_keeps_ai_state() {
        let mut scene = scene();
        let id = scene.insert_paragraph(
            Paragraph::new("a long generated paragraph of text").with_state(ParagraphState::Ai),
            None,
        );

        scene
            .update_paragraph(
                id,
                ParagraphUpdate::new().with_text("a long generated paragraph of text!"),
            )
            .unwrap();

        assert_eq!(scene.paragraph(id).unwrap().state, ParagraphState::Ai);
    }

    #[test]
    fn test_seeds_counts_for_untracked_records() {
        let mut scene = scene();
        let paragraph = Paragraph::new("hello");
        let id = paragraph.id;
        // Raw push bypasses insert stamping, leaving both buckets at zero.
        scene.paragraphs.push(paragraph);

        scene
            .update_paragraph(id, ParagraphUpdate::new().with_text("hello world"))
            .unwrap();

        let p = scene.paragraph(id).unwrap();
        assert_eq!(p.human_characters, 11);
        assert_eq!(p.ai_characters, 0);
    }

    #[test]
    fn test_state_change_restamps_counts() {
        let mut scene = scene();
        let id = scene.create_paragraph("five5", None);

        scene
            .update_paragraph(id, ParagraphUpdate::new().with_state(ParagraphState::Ai))
            .unwrap();

        let p = scene.paragraph(id).unwrap();
        assert_eq!(p.state, ParagraphState::Ai);
        assert_eq!(p.ai_characters, 5);
        assert_eq!(p.human_characters, 0);
    }

    #[test]
    fn test_text_update_recounts_words() {
        let mut scene = scene();
        let id = scene.create_paragraph("one two", None);
        assert_eq!(scene.word_count(), 2);

        scene
            .update_paragraph(id, ParagraphUpdate::new().with_text("one two three four"))
            .unwrap();

        assert_eq!(scene.paragraph(id).unwrap().words, 4);
        assert_eq!(scene.word_count(), 4);
    }

    #[test]
    fn test_update_unknown_paragraph_is_error() {
        let mut scene = scene();
        let result = scene.update_paragraph(ParagraphId::new(), ParagraphUpdate::new());
        assert!(matches!(result, Err(SceneError::UnknownParagraph(_))));
    }

    #[test]
    fn test_extra_set_and_cleared() {
        let mut scene = scene();
        let id = scene.create_paragraph("text", None);

        scene
            .update_paragraph(id, ParagraphUpdate::new().with_extra("suggestion"))
            .unwrap();
        assert_eq!(
            scene.paragraph(id).unwrap().extra.as_deref(),
            Some("suggestion")
        );

        scene
            .update_paragraph(id, ParagraphUpdate::new().with_extra_cleared())
            .unwrap();
        assert!(scene.paragraph(id).unwrap().extra.is_none());
    }

    #[test]
    fn test_move_paragraph_swaps_neighbors() {
        let mut scene = scene();
        let a = scene.create_paragraph("a", None);
        let b = scene.create_paragraph("b", None);
        let c = scene.create_paragraph("c", None);

        scene.move_paragraph(c, MoveDirection::Up);
        assert_eq!(scene.paragraph_ids(), vec![a, c, b]);

        scene.move_paragraph(a, MoveDirection::Down);
        assert_eq!(scene.paragraph_ids(), vec![c, a, b]);
    }

    #[test]
    fn test_move_at_edges_is_noop() {
        let mut scene = scene();
        let a = scene.create_paragraph("a", None);
        let b = scene.create_paragraph("b", None);

        scene.move_paragraph(a, MoveDirection::Up);
        scene.move_paragraph(b, MoveDirection::Down);
        assert_eq!(scene.paragraph_ids(), vec![a, b]);
    }

    #[test]
    fn test_remove_paragraph() {
        let mut scene = scene();
        let a = scene.create_paragraph("one two", None);
        let b = scene.create_paragraph("three", None);
        scene.set_selected_paragraph(Some(a));

        assert!(scene.remove_paragraph(a));
        assert_eq!(scene.paragraph_ids(), vec![b]);
        assert_eq!(scene.word_count(), 1);
        assert!(scene.selected_paragraph.is_none());

        assert!(!scene.remove_paragraph(ParagraphId::new()));
    }

    #[test]
    fn test_inventory_action_roundtrip() {
        let mut scene = scene();
        let id = scene.create_paragraph("found a sword", None);

        scene
            .add_inventory_action(id, InventoryAction::add("sword", 1))
            .unwrap();
        assert_eq!(scene.paragraph(id).unwrap().inventory_actions.len(), 1);

        scene.remove_inventory_actions(id, "sword").unwrap();
        assert!(scene.paragraph(id).unwrap().inventory_actions.is_empty());
    }

    #[test]
    fn test_plot_action_roundtrip() {
        use crate::paragraph::PlotActionKind;

        let mut scene = scene();
        let id = scene.create_paragraph("the letter arrives", None);
        let plot_point = PlotPointId::new();

        scene
            .add_plot_action(
                id,
                PlotAction {
                    plot_point_id: plot_point,
                    action: PlotActionKind::Introduce,
                },
            )
            .unwrap();
        assert_eq!(scene.paragraph(id).unwrap().plot_point_actions.len(), 1);

        scene.remove_plot_actions(id, plot_point).unwrap();
        assert!(scene.paragraph(id).unwrap().plot_point_actions.is_empty());
    }

    #[test]
    fn test_split_off_detaches_inclusive_tail() {
        let mut scene = scene();
        let _a = scene.create_paragraph("one", None);
        let b = scene.create_paragraph("two", None);
        let c = scene.create_paragraph("three", None);

        let tail = scene.split_off(b).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].id, b);
        assert_eq!(tail[1].id, c);
        assert_eq!(scene.paragraphs.len(), 1);
        assert_eq!(scene.word_count(), 1);
    }

    #[test]
    fn test_has_ai() {
        let mut scene = scene();
        scene.create_paragraph("plain", None);
        assert!(!scene.has_ai());

        scene.insert_paragraph(
            Paragraph::new("generated").with_state(ParagraphState::Ai),
            None,
        );
        assert!(scene.has_ai());
    }
}
