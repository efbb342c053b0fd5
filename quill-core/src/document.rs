//! The document model and the paragraph/document converter.
//!
//! The editing surface renders a scene as a flat document of blocks,
//! one block per paragraph record. `to_document` builds that view;
//! `from_document` maps an edited document back onto the paragraph
//! records, preserving identity and every field the surface does not
//! own. Block order in the document is authoritative for paragraph
//! order on the way back.

use crate::paragraph::{now_millis, Paragraph, ParagraphId, ParagraphState, ParagraphText};
use serde::{Deserialize, Serialize};
use serde_json::json;

// ============================================================================
// Document model
// ============================================================================

/// Inline formatting carried by a text node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Mark {
    Translation { attrs: TranslationAttrs },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationAttrs {
    pub title: String,
    pub from: String,
    pub to: String,
}

impl Mark {
    fn to_value(&self) -> serde_json::Value {
        match self {
            Mark::Translation { attrs } => json!({
                "type": "translation",
                "attrs": {"title": attrs.title, "from": attrs.from, "to": attrs.to},
            }),
        }
    }
}

/// One run of text inside a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineNode {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<Mark>,
}

impl InlineNode {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Vec::new(),
        }
    }

    pub fn with_mark(mut self, mark: Mark) -> Self {
        self.marks.push(mark);
        self
    }
}

/// One rendered block of the editing surface.
///
/// Blocks produced by the converter always carry the paragraph's ID;
/// blocks the surface creates on its own (splits, fresh lines) may not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: Option<ParagraphId>,
    #[serde(default)]
    pub extra: Option<String>,
    #[serde(default)]
    pub extra_loading: bool,
    #[serde(default)]
    pub content: Vec<InlineNode>,
}

impl Block {
    /// Block with a known paragraph identity and plain content.
    pub fn text(id: ParagraphId, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: Some(id),
            extra: None,
            extra_loading: false,
            content: if text.is_empty() {
                Vec::new()
            } else {
                vec![InlineNode::text(text)]
            },
        }
    }

    /// Block with no identity yet, as the surface creates them.
    pub fn fresh(text: impl Into<String>) -> Self {
        let mut block = Self::text(ParagraphId::new(), text);
        block.id = None;
        block
    }

    /// Concatenated text of every inline node.
    pub fn plain_text(&self) -> String {
        self.content.iter().map(|n| n.text.as_str()).collect()
    }

    /// True when any inline node carries a mark.
    pub fn has_marks(&self) -> bool {
        self.content.iter().any(|n| !n.marks.is_empty())
    }
}

/// The flat document the editing surface renders.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// The fallback document: one empty block with a fresh identity.
    pub fn single_empty() -> Self {
        Self {
            blocks: vec![Block {
                id: Some(ParagraphId::new()),
                extra: None,
                extra_loading: false,
                content: Vec::new(),
            }],
        }
    }

    /// Position of the block rendering a paragraph.
    pub fn block_index_of(&self, id: ParagraphId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == Some(id))
    }

    /// Paragraph identity of the block at a position.
    pub fn paragraph_id_at(&self, index: usize) -> Option<ParagraphId> {
        self.blocks.get(index).and_then(|b| b.id)
    }

    /// Block IDs in document order, skipping identity-less blocks.
    pub fn paragraph_ids(&self) -> Vec<ParagraphId> {
        self.blocks.iter().filter_map(|b| b.id).collect()
    }
}

// ============================================================================
// Paragraphs -> document
// ============================================================================

/// Render paragraph records as a document, one block per record in
/// order.
///
/// Plain text is trimmed for display. Rich payloads contribute the
/// inline content of their first block only; a payload that cannot be
/// parsed renders as an empty block under the same identity, logged and
/// never fatal. An empty record list renders as a single empty block
/// with a fresh identity so the surface always has somewhere to type.
pub fn to_document(paragraphs: &[Paragraph]) -> Document {
    if paragraphs.is_empty() {
        return Document::single_empty();
    }

    let blocks = paragraphs
        .iter()
        .map(|paragraph| Block {
            id: Some(paragraph.id),
            extra: paragraph
                .extra
                .clone()
                .filter(|extra| !extra.is_empty()),
            extra_loading: paragraph.extra_loading,
            content: block_content(paragraph),
        })
        .collect();

    Document::new(blocks)
}

fn block_content(paragraph: &Paragraph) -> Vec<InlineNode> {
    match &paragraph.text {
        ParagraphText::Plain(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![InlineNode::text(trimmed)]
            }
        }
        ParagraphText::Rich(value) => match parse_rich(value.clone()) {
            Ok(blocks) => blocks.into_iter().next().unwrap_or_default(),
            Err(err) => {
                tracing::warn!(paragraph = %paragraph.id, %err, "unreadable rich paragraph content, rendering empty block");
                Vec::new()
            }
        },
    }
}

#[derive(Deserialize)]
struct RichPayload {
    #[serde(default)]
    content: Vec<RichBlock>,
}

#[derive(Deserialize)]
struct RichBlock {
    #[serde(default)]
    content: Vec<InlineNode>,
}

fn parse_rich(value: serde_json::Value) -> Result<Vec<Vec<InlineNode>>, serde_json::Error> {
    let payload: RichPayload = serde_json::from_value(value)?;
    Ok(payload.content.into_iter().map(|b| b.content).collect())
}

// ============================================================================
// Document -> paragraphs
// ============================================================================

/// The result of mapping an edited document back onto paragraph records.
///
/// `paragraphs` is the full record list in document order; records the
/// document no longer contains are simply absent. `changed` lists the
/// IDs whose content or suggestion fields differ from the previous
/// records, in document order.
#[derive(Debug, Clone)]
pub struct DocumentUpdate {
    pub paragraphs: Vec<Paragraph>,
    pub changed: Vec<ParagraphId>,
}

/// Map a document back onto paragraph records.
///
/// Known blocks update their record in place: text and the suggestion
/// fields move over, everything else (state, comments, actions,
/// counters) is carried through untouched, and `modified_at` is bumped
/// only when the text actually changed. Blocks with an unknown or
/// missing identity become fresh draft records, always marked changed.
/// Marked-up content is stored as a rich payload, plain runs as a plain
/// string.
pub fn from_document(document: &Document, existing: &[Paragraph]) -> DocumentUpdate {
    let existing_by_id: std::collections::HashMap<ParagraphId, &Paragraph> =
        existing.iter().map(|p| (p.id, p)).collect();

    let mut paragraphs = Vec::with_capacity(document.blocks.len());
    let mut changed = Vec::new();

    for block in &document.blocks {
        let block_text = block.plain_text();
        let block_extra = block.extra.clone().filter(|e| !e.is_empty());
        let stored_text = if block.has_marks() {
            ParagraphText::Rich(rich_text_value(&block.content))
        } else {
            ParagraphText::Plain(block_text.clone())
        };

        let known = block.id.and_then(|id| existing_by_id.get(&id).copied());

        match known {
            Some(previous) => {
                let text_changed = previous.text.plain() != block_text;
                let attrs_changed = block_extra.as_deref()
                    != previous.extra.as_deref().filter(|e| !e.is_empty())
                    || block.extra_loading != previous.extra_loading;
                let marks_changed =
                    matches!(previous.text, ParagraphText::Rich(_)) != block.has_marks();

                if text_changed || attrs_changed || marks_changed {
                    changed.push(previous.id);
                }

                let mut record = previous.clone();
                record.text = stored_text;
                record.extra = block_extra.or_else(|| previous.extra.clone());
                record.extra_loading = block.extra_loading || previous.extra_loading;
                if text_changed {
                    record.modified_at = now_millis();
                }
                paragraphs.push(record);
            }
            None => {
                let mut record = Paragraph::new(stored_text);
                if let Some(id) = block.id {
                    record.id = id;
                }
                record.extra = block_extra;
                record.extra_loading = block.extra_loading;
                changed.push(record.id);
                paragraphs.push(record);
            }
        }
    }

    DocumentUpdate { paragraphs, changed }
}

fn rich_text_value(nodes: &[InlineNode]) -> serde_json::Value {
    let inline: Vec<serde_json::Value> = nodes
        .iter()
        .map(|node| {
            if node.marks.is_empty() {
                json!({"type": "text", "text": node.text})
            } else {
                let marks: Vec<serde_json::Value> =
                    node.marks.iter().map(Mark::to_value).collect();
                json!({"type": "text", "text": node.text, "marks": marks})
            }
        })
        .collect();

    json!({
        "type": "doc",
        "content": [{"type": "paragraph", "content": inline}],
    })
}
