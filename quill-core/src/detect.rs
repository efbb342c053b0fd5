//! Change detection between an edited document and the paragraph store.
//!
//! `detect_changes` turns the converter's output into an edit plan: field
//! updates for known paragraphs, anchored inserts for new blocks, and
//! removals for records the document no longer contains. The plan is pure
//! data; applying it to a scene is a separate step so the session layer
//! can wrap it in the reentrancy flag.

use crate::document::DocumentUpdate;
use crate::paragraph::{Paragraph, ParagraphId};
use crate::scene::{ParagraphUpdate, Scene, SceneError};
use std::collections::{HashMap, HashSet};

/// Where an insert lands in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    /// The new block is the first block of the document.
    Start,
    /// The new block follows this paragraph.
    After(ParagraphId),
}

/// One paragraph to insert, with its anchor.
#[derive(Debug, Clone)]
pub struct ParagraphInsert {
    pub paragraph: Paragraph,
    pub position: InsertPosition,
}

/// The reconciliation result for one document transaction.
#[derive(Debug, Default)]
pub struct EditPlan {
    pub updates: Vec<(ParagraphId, ParagraphUpdate)>,
    pub inserts: Vec<ParagraphInsert>,
    pub removals: Vec<ParagraphId>,
}

impl EditPlan {
    /// True when the transaction requires no store mutation.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.inserts.is_empty() && self.removals.is_empty()
    }

    /// Apply the plan to a scene.
    ///
    /// Removals run last so insert anchors stay resolvable.
    pub fn apply(self, scene: &mut Scene) -> Result<(), SceneError> {
        for (id, update) in self.updates {
            scene.update_paragraph(id, update)?;
        }
        for insert in self.inserts {
            match insert.position {
                InsertPosition::Start => {
                    scene.insert_paragraph_at(insert.paragraph, 0);
                }
                InsertPosition::After(anchor) => {
                    scene.insert_paragraph(insert.paragraph, Some(anchor));
                }
            }
        }
        for id in self.removals {
            scene.remove_paragraph(id);
        }
        Ok(())
    }
}

/// Reconcile a converted document against the store's paragraph list.
///
/// Changed known paragraphs become minimal field updates. Blocks with an
/// unknown identity become inserts anchored on their document
/// predecessor. Paragraphs absent from the document become removals.
///
/// One exception: when a new block's text substantially overlaps the
/// former text of a known paragraph directly above it that this same
/// transaction emptied, the pair is treated as a split artifact of the
/// editing surface rather than a genuine new paragraph. The emptied
/// record is removed and the new record takes its place, so fast edits
/// at a paragraph boundary never leave an empty duplicate behind.
pub fn detect_changes(update: &DocumentUpdate, previous: &[Paragraph]) -> EditPlan {
    let previous_by_id: HashMap<ParagraphId, &Paragraph> =
        previous.iter().map(|p| (p.id, p)).collect();
    let record_ids: HashSet<ParagraphId> = update.paragraphs.iter().map(|p| p.id).collect();
    let changed: HashSet<ParagraphId> = update.changed.iter().copied().collect();

    let mut plan = EditPlan::default();

    for (index, record) in update.paragraphs.iter().enumerate() {
        match previous_by_id.get(&record.id) {
            Some(before) => {
                if changed.contains(&record.id) {
                    let field_update = record_update(record, before);
                    if !field_update.is_noop() {
                        plan.updates.push((record.id, field_update));
                    }
                }
            }
            None => {
                let position = if index == 0 {
                    InsertPosition::Start
                } else {
                    InsertPosition::After(update.paragraphs[index - 1].id)
                };

                if let InsertPosition::After(anchor) = position {
                    let predecessor = &update.paragraphs[index - 1];
                    if let Some(predecessor_before) = previous_by_id.get(&anchor) {
                        if predecessor.text.is_empty()
                            && is_split_artifact(
                                &predecessor_before.plain_text(),
                                &record.plain_text(),
                            )
                        {
                            plan.updates.retain(|(id, _)| *id != anchor);
                            plan.removals.push(anchor);
                        }
                    }
                }

                plan.inserts.push(ParagraphInsert {
                    paragraph: record.clone(),
                    position,
                });
            }
        }
    }

    for before in previous {
        if !record_ids.contains(&before.id) {
            plan.removals.push(before.id);
        }
    }

    plan
}

fn record_update(record: &Paragraph, before: &Paragraph) -> ParagraphUpdate {
    let mut update = ParagraphUpdate::new();
    if record.text != before.text {
        update = update.with_text(record.text.clone());
    }
    if record.modified_at != before.modified_at {
        update = update.with_modified_at(record.modified_at);
    }
    if record.extra != before.extra {
        update = match &record.extra {
            Some(extra) => update.with_extra(extra.clone()),
            None => update.with_extra_cleared(),
        };
    }
    if record.extra_loading != before.extra_loading {
        update = update.with_extra_loading(record.extra_loading);
    }
    update
}

fn is_split_artifact(old_text: &str, new_text: &str) -> bool {
    let old_text = old_text.trim();
    let new_text = new_text.trim();
    !old_text.is_empty()
        && !new_text.is_empty()
        && (new_text.starts_with(old_text) || old_text.starts_with(new_text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{from_document, to_document, Block, Document};
    use crate::story::NodeId;

    fn scene_with(texts: &[&str]) -> Scene {
        let mut scene = Scene::new(NodeId::new(), "Scene");
        for text in texts {
            scene.create_paragraph(*text, None);
        }
        scene
    }

    #[test]
    fn test_unchanged_document_yields_empty_plan() {
        let scene = scene_with(&["one", "two"]);
        let document = to_document(&scene.paragraphs);
        let update = from_document(&document, &scene.paragraphs);

        let plan = detect_changes(&update, &scene.paragraphs);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_text_edit_becomes_single_update() {
        let mut scene = scene_with(&["one", "two"]);
        let second = scene.paragraphs[1].id;

        let mut document = to_document(&scene.paragraphs);
        document.blocks[1] = Block::text(second, "two, edited");
        let update = from_document(&document, &scene.paragraphs);

        let plan = detect_changes(&update, &scene.paragraphs);
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].0, second);
        assert!(plan.inserts.is_empty());
        assert!(plan.removals.is_empty());

        plan.apply(&mut scene).unwrap();
        assert_eq!(scene.paragraph(second).unwrap().plain_text(), "two, edited");
    }

    #[test]
    fn test_update_carries_modified_at_bump() {
        let mut scene = scene_with(&["one"]);
        let id = scene.paragraphs[0].id;
        scene.paragraphs[0].modified_at = 10;

        let document = Document::new(vec![Block::text(id, "one more")]);
        let update = from_document(&document, &scene.paragraphs);
        let plan = detect_changes(&update, &scene.paragraphs);

        plan.apply(&mut scene).unwrap();
        assert!(scene.paragraph(id).unwrap().modified_at > 10);
    }

    #[test]
    fn test_mid_paragraph_split_updates_and_inserts() {
        let mut scene = scene_with(&["Hello world"]);
        let original = scene.paragraphs[0].id;
        let tail = ParagraphId::new();

        let document = Document::new(vec![
            Block::text(original, "Hello"),
            Block::text(tail, " world"),
        ]);
        let update = from_document(&document, &scene.paragraphs);
        let plan = detect_changes(&update, &scene.paragraphs);

        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.inserts[0].position, InsertPosition::After(original));
        assert!(plan.removals.is_empty());

        plan.apply(&mut scene).unwrap();
        assert_eq!(scene.paragraph_ids(), vec![original, tail]);
        assert_eq!(scene.paragraph(original).unwrap().plain_text(), "Hello");
    }

    #[test]
    fn test_new_first_block_inserts_at_start() {
        let mut scene = scene_with(&["existing"]);
        let existing = scene.paragraphs[0].id;
        let fresh = ParagraphId::new();

        let document = Document::new(vec![
            Block::text(fresh, "a new opening"),
            Block::text(existing, "existing"),
        ]);
        let update = from_document(&document, &scene.paragraphs);
        let plan = detect_changes(&update, &scene.paragraphs);

        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.inserts[0].position, InsertPosition::Start);

        plan.apply(&mut scene).unwrap();
        assert_eq!(scene.paragraph_ids(), vec![fresh, existing]);
    }

    #[test]
    fn test_chained_new_blocks_anchor_on_each_other() {
        let mut scene = scene_with(&["base"]);
        let base = scene.paragraphs[0].id;
        let first = ParagraphId::new();
        let second = ParagraphId::new();

        let document = Document::new(vec![
            Block::text(base, "base"),
            Block::text(first, "uno"),
            Block::text(second, "dos"),
        ]);
        let update = from_document(&document, &scene.paragraphs);
        let plan = detect_changes(&update, &scene.paragraphs);

        assert_eq!(plan.inserts.len(), 2);
        assert_eq!(plan.inserts[0].position, InsertPosition::After(base));
        assert_eq!(plan.inserts[1].position, InsertPosition::After(first));

        plan.apply(&mut scene).unwrap();
        assert_eq!(scene.paragraph_ids(), vec![base, first, second]);
    }

    #[test]
    fn test_missing_block_becomes_removal() {
        let mut scene = scene_with(&["keep", "drop"]);
        let keep = scene.paragraphs[0].id;
        let drop = scene.paragraphs[1].id;

        let document = Document::new(vec![Block::text(keep, "keep")]);
        let update = from_document(&document, &scene.paragraphs);
        let plan = detect_changes(&update, &scene.paragraphs);

        assert_eq!(plan.removals, vec![drop]);
        plan.apply(&mut scene).unwrap();
        assert_eq!(scene.paragraph_ids(), vec![keep]);
    }

    #[test]
    fn test_split_artifact_replaces_emptied_predecessor() {
        let mut scene = scene_with(&["Hello world"]);
        let original = scene.paragraphs[0].id;
        let replacement = ParagraphId::new();

        // The surface emptied the original block and moved its text into
        // a fresh block below it.
        let document = Document::new(vec![
            Block::text(original, ""),
            Block::text(replacement, "Hello world"),
        ]);
        let update = from_document(&document, &scene.paragraphs);
        let plan = detect_changes(&update, &scene.paragraphs);

        assert!(plan.updates.is_empty());
        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.removals, vec![original]);

        plan.apply(&mut scene).unwrap();
        assert_eq!(scene.paragraph_ids(), vec![replacement]);
        assert_eq!(
            scene.paragraph(replacement).unwrap().plain_text(),
            "Hello world"
        );
    }

    #[test]
    fn test_artifact_guard_accepts_grown_text() {
        let mut scene = scene_with(&["Hello"]);
        let original = scene.paragraphs[0].id;
        let replacement = ParagraphId::new();

        let document = Document::new(vec![
            Block::text(original, ""),
            Block::text(replacement, "Hello again"),
        ]);
        let update = from_document(&document, &scene.paragraphs);
        let plan = detect_changes(&update, &scene.paragraphs);

        assert_eq!(plan.removals, vec![original]);
        plan.apply(&mut scene).unwrap();
        assert_eq!(scene.paragraph_ids(), vec![replacement]);
    }

    #[test]
    fn test_unrelated_text_is_a_genuine_new_paragraph() {
        let mut scene = scene_with(&["Hello world"]);
        let original = scene.paragraphs[0].id;
        let fresh = ParagraphId::new();

        let document = Document::new(vec![
            Block::text(original, ""),
            Block::text(fresh, "Something else entirely"),
        ]);
        let update = from_document(&document, &scene.paragraphs);
        let plan = detect_changes(&update, &scene.paragraphs);

        // The original keeps its (now empty) record.
        assert_eq!(plan.updates.len(), 1);
        assert!(plan.removals.is_empty());

        plan.apply(&mut scene).unwrap();
        assert_eq!(scene.paragraph_ids(), vec![original, fresh]);
    }

    #[test]
    fn test_already_empty_predecessor_is_not_an_artifact() {
        let mut scene = scene_with(&[""]);
        let original = scene.paragraphs[0].id;
        let fresh = ParagraphId::new();

        let document = Document::new(vec![
            Block::text(original, ""),
            Block::text(fresh, "typed below an empty line"),
        ]);
        let update = from_document(&document, &scene.paragraphs);
        let plan = detect_changes(&update, &scene.paragraphs);

        assert!(plan.removals.is_empty());
        plan.apply(&mut scene).unwrap();
        assert_eq!(scene.paragraph_ids(), vec![original, fresh]);
    }

    #[test]
    fn test_suggestion_attr_change_updates_without_timestamp_bump() {
        let mut scene = scene_with(&["text"]);
        let id = scene.paragraphs[0].id;
        let before = scene.paragraph(id).unwrap().modified_at;

        let mut block = Block::text(id, "text");
        block.extra = Some("a suggestion".to_string());
        let update = from_document(&Document::new(vec![block]), &scene.paragraphs);
        let plan = detect_changes(&update, &scene.paragraphs);

        assert_eq!(plan.updates.len(), 1);
        plan.apply(&mut scene).unwrap();

        let after = scene.paragraph(id).unwrap();
        assert_eq!(after.extra.as_deref(), Some("a suggestion"));
        assert_eq!(after.modified_at, before);
    }
}
