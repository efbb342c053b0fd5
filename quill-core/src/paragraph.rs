//! Paragraph records, the persisted unit of scene content.
//!
//! A paragraph maps 1:1 to one rendered block in the editing surface. Its
//! ID is assigned once and never regenerated; every conversion round-trip
//! and store mutation preserves it until the paragraph is explicitly
//! removed.

use crate::story::PlotPointId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParagraphId(Uuid);

impl ParagraphId {
    /// Create a new unique paragraph ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ParagraphId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ParagraphId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authoring state of a paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParagraphState {
    /// Fresh or human-edited text.
    Draft,
    /// Flagged for another pass.
    Revise,
    /// Text currently dominated by generated content.
    Ai,
    /// Done, not expected to change.
    Final,
}

impl ParagraphState {
    /// Get the display name.
    pub fn name(&self) -> &'static str {
        match self {
            ParagraphState::Draft => "draft",
            ParagraphState::Revise => "revise",
            ParagraphState::Ai => "ai",
            ParagraphState::Final => "final",
        }
    }
}

/// Paragraph text: either a plain string or the editing surface's rich
/// node payload.
///
/// Rich payloads are kept as raw JSON and parsed only at conversion time,
/// so a corrupt payload surfaces as a conversion fallback rather than a
/// deserialization failure for the whole scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParagraphText {
    Plain(String),
    Rich(serde_json::Value),
}

impl ParagraphText {
    /// Flatten to plain text.
    ///
    /// For rich payloads this walks the first block's inline nodes and
    /// concatenates their text, mirroring what the converter renders.
    /// Unreadable payloads flatten to the empty string.
    pub fn plain(&self) -> String {
        match self {
            ParagraphText::Plain(text) => text.clone(),
            ParagraphText::Rich(value) => value
                .get("content")
                .and_then(|blocks| blocks.get(0))
                .and_then(|block| block.get("content"))
                .and_then(|inline| inline.as_array())
                .map(|nodes| {
                    nodes
                        .iter()
                        .filter_map(|node| node.get("text").and_then(|t| t.as_str()))
                        .collect::<String>()
                })
                .unwrap_or_default(),
        }
    }

    /// True when there is no renderable text.
    pub fn is_empty(&self) -> bool {
        self.plain().is_empty()
    }
}

impl Default for ParagraphText {
    fn default() -> Self {
        ParagraphText::Plain(String::new())
    }
}

impl From<&str> for ParagraphText {
    fn from(text: &str) -> Self {
        ParagraphText::Plain(text.to_string())
    }
}

impl From<String> for ParagraphText {
    fn from(text: String) -> Self {
        ParagraphText::Plain(text)
    }
}

/// A reader or co-author note attached to a paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    pub user: String,
    pub created_at: String,
}

/// Which way an inventory action moves a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryDirection {
    Add,
    Remove,
}

/// One entry of the append-only inventory ledger carried by a paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAction {
    #[serde(rename = "type")]
    pub direction: InventoryDirection,
    pub item_name: String,
    pub item_amount: i64,
}

impl InventoryAction {
    pub fn add(item_name: impl Into<String>, amount: i64) -> Self {
        Self {
            direction: InventoryDirection::Add,
            item_name: item_name.into(),
            item_amount: amount,
        }
    }

    pub fn remove(item_name: impl Into<String>, amount: i64) -> Self {
        Self {
            direction: InventoryDirection::Remove,
            item_name: item_name.into(),
            item_amount: amount,
        }
    }

    /// The signed quantity change this action applies.
    pub fn delta(&self) -> i64 {
        match self.direction {
            InventoryDirection::Add => self.item_amount,
            InventoryDirection::Remove => -self.item_amount,
        }
    }
}

/// A plot-point lifecycle action recorded on a paragraph.
///
/// The serialized action names are load-bearing: retrieval replays them
/// literally, including the space in "partially resolved".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlotActionKind {
    #[serde(rename = "introduce")]
    Introduce,
    #[serde(rename = "mentioned")]
    Mentioned,
    #[serde(rename = "partially resolved")]
    PartiallyResolved,
    #[serde(rename = "resolved")]
    Resolved,
}

impl PlotActionKind {
    /// Get the literal action name.
    pub fn name(&self) -> &'static str {
        match self {
            PlotActionKind::Introduce => "introduce",
            PlotActionKind::Mentioned => "mentioned",
            PlotActionKind::PartiallyResolved => "partially resolved",
            PlotActionKind::Resolved => "resolved",
        }
    }
}

/// One entry of the append-only plot-point log carried by a paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotAction {
    pub plot_point_id: PlotPointId,
    pub action: PlotActionKind,
}

/// The persisted unit of scene content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Stable identity, unique within a scene.
    pub id: ParagraphId,

    /// Plain or rich text content.
    pub text: ParagraphText,

    /// Authoring state.
    pub state: ParagraphState,

    /// Notes attached to this paragraph, carried through conversion untouched.
    #[serde(default)]
    pub comments: Vec<Comment>,

    /// Pending AI suggestion text, if any.
    #[serde(default)]
    pub extra: Option<String>,

    /// True while a suggestion request is in flight.
    #[serde(default)]
    pub extra_loading: bool,

    /// Optional translated rendition of the text.
    #[serde(default)]
    pub translation: Option<String>,

    /// Append-only inventory ledger entries.
    #[serde(default)]
    pub inventory_actions: Vec<InventoryAction>,

    /// Append-only plot-point lifecycle entries.
    #[serde(default)]
    pub plot_point_actions: Vec<PlotAction>,

    /// Unix milliseconds of the last text change.
    #[serde(default)]
    pub modified_at: u64,

    /// Cached word count, maintained by the store.
    #[serde(default)]
    pub words: u32,

    /// Characters attributed to generated text.
    #[serde(default)]
    pub ai_characters: u64,

    /// Characters attributed to the author.
    #[serde(default)]
    pub human_characters: u64,
}

impl Paragraph {
    /// Create a draft paragraph with the given text.
    pub fn new(text: impl Into<ParagraphText>) -> Self {
        let text = text.into();
        let words = count_words(&text.plain());
        Self {
            id: ParagraphId::new(),
            text,
            state: ParagraphState::Draft,
            comments: Vec::new(),
            extra: None,
            extra_loading: false,
            translation: None,
            inventory_actions: Vec::new(),
            plot_point_actions: Vec::new(),
            modified_at: now_millis(),
            words,
            ai_characters: 0,
            human_characters: 0,
        }
    }

    /// Create an empty draft paragraph.
    pub fn empty() -> Self {
        Self::new("")
    }

    pub fn with_state(mut self, state: ParagraphState) -> Self {
        self.state = state;
        self
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }

    pub fn with_inventory_action(mut self, action: InventoryAction) -> Self {
        self.inventory_actions.push(action);
        self
    }

    pub fn with_plot_action(mut self, plot_point_id: PlotPointId, action: PlotActionKind) -> Self {
        self.plot_point_actions.push(PlotAction {
            plot_point_id,
            action,
        });
        self
    }

    /// Plain-text rendition of the content.
    pub fn plain_text(&self) -> String {
        self.text.plain()
    }
}

/// Count whitespace-separated words.
pub fn count_words(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

/// Current time as unix milliseconds.
pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_paragraph_ids_are_unique() {
        let a = ParagraphId::new();
        let b = ParagraphId::new();
        assert_ne!(a, b);
        assert_ne!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_new_paragraph_defaults() {
        let p = Paragraph::new("The rain had not stopped for three days.");
        assert_eq!(p.state, ParagraphState::Draft);
        assert!(p.comments.is_empty());
        assert!(p.extra.is_none());
        assert!(!p.extra_loading);
        assert_eq!(p.words, 8);
        assert!(p.modified_at > 0);
    }

    #[test]
    fn test_plain_text_from_plain() {
        let text = ParagraphText::Plain("Hello there.".to_string());
        assert_eq!(text.plain(), "Hello there.");
        assert!(!text.is_empty());
    }

    #[test]
    fn test_plain_text_from_rich() {
        let text = ParagraphText::Rich(json!({
            "type": "doc",
            "content": [{
                "type": "paragraph",
                "content": [
                    {"type": "text", "text": "Hello "},
                    {"type": "text", "text": "there."}
                ]
            }]
        }));
        assert_eq!(text.plain(), "Hello there.");
    }

    #[test]
    fn test_plain_text_from_malformed_rich() {
        let text = ParagraphText::Rich(json!({"type": "doc", "content": "not an array"}));
        assert_eq!(text.plain(), "");
        assert!(text.is_empty());
    }

    #[test]
    fn test_rich_takes_only_first_block() {
        let text = ParagraphText::Rich(json!({
            "type": "doc",
            "content": [
                {"type": "paragraph", "content": [{"type": "text", "text": "first"}]},
                {"type": "paragraph", "content": [{"type": "text", "text": "second"}]}
            ]
        }));
        assert_eq!(text.plain(), "first");
    }

    #[test]
    fn test_state_serde_names() {
        assert_eq!(
            serde_json::to_string(&ParagraphState::Draft).unwrap(),
            "\"draft\""
        );
        assert_eq!(
            serde_json::to_string(&ParagraphState::Ai).unwrap(),
            "\"ai\""
        );
    }

    #[test]
    fn test_plot_action_serde_names() {
        assert_eq!(
            serde_json::to_string(&PlotActionKind::PartiallyResolved).unwrap(),
            "\"partially resolved\""
        );
        let parsed: PlotActionKind = serde_json::from_str("\"partially resolved\"").unwrap();
        assert_eq!(parsed, PlotActionKind::PartiallyResolved);
    }

    #[test]
    fn test_inventory_action_serde_shape() {
        let action = InventoryAction::add("sword", 2);
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "add");
        assert_eq!(json["item_name"], "sword");
        assert_eq!(json["item_amount"], 2);
    }

    #[test]
    fn test_inventory_delta_signs() {
        assert_eq!(InventoryAction::add("rope", 3).delta(), 3);
        assert_eq!(InventoryAction::remove("rope", 2).delta(), -2);
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   "), 0);
        assert_eq!(count_words("one two  three"), 3);
    }
}
