//! Inventory ledger replay.

use std::collections::HashMap;

use crate::paragraph::ParagraphId;
use crate::story::Story;

/// Replays every inventory action up to and including the target
/// paragraph and returns the running item totals.
///
/// Quantities are signed and never floored: removing more of an item
/// than was added leaves a negative total on the ledger. Returns `None`
/// when the paragraph is not in the story; an untouched ledger at a
/// known paragraph is `Some` with an empty map.
pub fn items_at_paragraph(story: &Story, target: ParagraphId) -> Option<HashMap<String, i64>> {
    let mut items: HashMap<String, i64> = HashMap::new();
    for entry in story.paragraphs_in_order() {
        for action in &entry.paragraph.inventory_actions {
            *items.entry(action.item_name.clone()).or_insert(0) += action.delta();
        }
        if entry.paragraph.id == target {
            return Some(items);
        }
    }
    None
}

// ============================================================================
// Tests
// ============================================================================
