//! QA tests for the editing session flow using the test harness.
//!
//! These tests verify the round trip between the editing surface and the
//! paragraph store:
//! - Typing, splitting, and deleting blocks
//! - Suggestion requests interleaved with edits
//! - Accept/reject outcomes and their accounting
//! - Deferred external refreshes settling after an internal update

use quill_core::document::Block;
use quill_core::suggestion::is_displayable;
use quill_core::testing::{
    assert_has_suggestion, assert_no_suggestion, assert_plain_text, assert_scene_reads,
    EditorHarness,
};
use quill_core::{diff, DiffTag};

// =============================================================================
// DOCUMENT ROUND TRIP
// =============================================================================

#[test]
fn test_typing_updates_only_the_edited_paragraph() {
    let mut harness = EditorHarness::with_paragraphs(&["First.", "Second.", "Third."]);
    let untouched = harness.paragraph_id(2);

    let changed = harness.type_text(1, "Second, revised.");

    assert_eq!(changed, vec![harness.paragraph_id(1)]);
    assert_scene_reads(&harness, &["First.", "Second, revised.", "Third."]);
    assert_eq!(harness.paragraph_id(2), untouched);
}

#[test]
fn test_pressing_enter_creates_an_anchored_paragraph() {
    let mut harness = EditorHarness::with_paragraphs(&["Opening.", "Closing."]);
    let first = harness.paragraph_id(0);

    let mut document = harness.session.document(&harness.scene);
    document.blocks.insert(1, Block::fresh("A new middle."));
    harness
        .session
        .apply_editor_update(&mut harness.scene, &document)
        .expect("editor update applies");

    assert_scene_reads(&harness, &["Opening.", "A new middle.", "Closing."]);
    assert_eq!(harness.paragraph_id(0), first);
}

#[test]
fn test_deleting_a_block_drops_the_record() {
    let mut harness = EditorHarness::with_paragraphs(&["Keep.", "Drop.", "Keep too."]);

    let mut document = harness.session.document(&harness.scene);
    document.blocks.remove(1);
    harness
        .session
        .apply_editor_update(&mut harness.scene, &document)
        .expect("editor update applies");

    assert_scene_reads(&harness, &["Keep.", "Keep too."]);
}

#[test]
fn test_empty_scene_still_renders_a_block_to_type_into() {
    let mut harness = EditorHarness::with_paragraphs(&[]);

    let document = harness.session.document(&harness.scene);

    assert_eq!(document.blocks.len(), 1);
    assert!(document.blocks[0].plain_text().is_empty());
}

// =============================================================================
// SUGGESTIONS INTERLEAVED WITH EDITS
// =============================================================================

#[test]
fn test_suggestion_lands_while_the_author_edits_elsewhere() {
    let mut harness = EditorHarness::with_paragraphs(&["The door stood open.", "Wind howled."]);
    harness.expect_completion("The door stood open, hinges creaking.");

    let target = harness.paragraph_id(0);
    let ticket = harness
        .assistant
        .begin(&mut harness.scene, target)
        .expect("paragraph exists");

    harness.type_text(1, "Wind howled through the gap.");

    assert!(harness.assistant.resolve(&mut harness.scene, ticket));
    assert_has_suggestion(&harness, 0);
    assert_plain_text(&harness, 1, "Wind howled through the gap.");
}

#[test]
fn test_new_request_supersedes_the_one_in_flight() {
    let mut harness = EditorHarness::with_paragraphs(&["Draft line."]);
    harness
        .expect_completion("Stale answer.")
        .expect_completion("Fresh answer.");

    let id = harness.paragraph_id(0);
    let stale = harness
        .assistant
        .begin(&mut harness.scene, id)
        .expect("paragraph exists");
    let fresh = harness
        .assistant
        .begin(&mut harness.scene, id)
        .expect("paragraph exists");

    // The scripted queue resolves in order, so the stale ticket consumes
    // the first completion and must be dropped.
    assert!(!harness.assistant.resolve(&mut harness.scene, stale));
    assert!(harness.assistant.resolve(&mut harness.scene, fresh));

    assert_eq!(
        harness.scene.paragraphs[0].extra.as_deref(),
        Some("Fresh answer.")
    );
}

#[test]
fn test_reject_then_ask_again() {
    let mut harness = EditorHarness::with_paragraphs(&["The lamp flickered."]);
    harness
        .expect_completion("The lamp flickered twice.")
        .expect_completion("The lamp guttered and died.");

    harness.suggest(0);
    harness.reject(0).expect("suggestion is pending");
    assert_no_suggestion(&harness, 0);
    assert_plain_text(&harness, 0, "The lamp flickered.");

    harness.suggest(0);
    assert_eq!(
        harness.scene.paragraphs[0].extra.as_deref(),
        Some("The lamp guttered and died.")
    );
}

#[test]
fn test_accept_attributes_characters_to_the_author() {
    let mut harness = EditorHarness::with_paragraphs(&["She ran."]);
    let accepted = "She ran until the lights of town faded behind her.";
    harness.expect_completion(accepted);

    harness.suggest(0);
    harness.accept(0).expect("suggestion is pending");

    let paragraph = &harness.scene.paragraphs[0];
    assert_eq!(paragraph.plain_text(), accepted);
    assert_eq!(paragraph.human_characters, accepted.chars().count() as u64);
    assert_eq!(paragraph.ai_characters, 0);
}

#[test]
fn test_suggestion_only_shows_on_the_focused_paragraph() {
    let mut harness = EditorHarness::with_paragraphs(&["One.", "Two."]);
    harness.expect_completion("One more.");
    harness.suggest(0);

    let target = harness.paragraph_id(0);
    let other = harness.paragraph_id(1);

    assert!(is_displayable(&harness.scene.paragraphs[0], Some(target)));
    assert!(!is_displayable(&harness.scene.paragraphs[0], Some(other)));
    assert!(!is_displayable(&harness.scene.paragraphs[0], None));
}

// =============================================================================
// REVIEW DIFF
// =============================================================================

#[test]
fn test_review_diff_reassembles_both_sides() {
    let mut harness = EditorHarness::with_paragraphs(&["The cat sat on the mat. It purred."]);
    harness.expect_completion("The cat sat on the rug. It purred.");
    harness.suggest(0);

    let original = harness.plain_text(0);
    let suggested = harness.scene.paragraphs[0]
        .extra
        .clone()
        .expect("suggestion is pending");

    let parts = diff(&original, &suggested);

    let kept: String = parts
        .iter()
        .filter(|p| p.tag != DiffTag::Insert)
        .map(|p| p.text.as_str())
        .collect();
    let proposed: String = parts
        .iter()
        .filter(|p| p.tag != DiffTag::Delete)
        .map(|p| p.text.as_str())
        .collect();

    assert_eq!(kept, original);
    assert_eq!(proposed, suggested);
    assert!(parts.iter().any(|p| p.tag == DiffTag::Equal));
}

// =============================================================================
// DEFERRED REFRESH
// =============================================================================

#[tokio::test]
async fn test_external_refresh_waits_for_the_session_to_settle() {
    use quill_core::scene::ParagraphUpdate;
    use quill_core::session::SessionConfig;
    use quill_core::SceneSession;

    let mut harness = EditorHarness::with_paragraphs(&["Typed here.", "Synced there."]);
    harness.session = SceneSession::with_config(
        &harness.scene,
        SessionConfig::new().with_grace_window(std::time::Duration::from_millis(5)),
    );

    harness.type_text(0, "Typed here, again.");
    assert!(harness.session.internal_update_in_progress());

    // A collaborator-side change arrives while the editor's own update
    // is still settling.
    let other = harness.paragraph_id(1);
    harness
        .scene
        .update_paragraph(other, ParagraphUpdate::new().with_text("Synced from afar."))
        .expect("paragraph exists");

    assert!(harness.session.external_document(&harness.scene).is_none());

    let refreshed = harness.session.settle(&harness.scene).await;
    let refreshed = refreshed.expect("store drifted during the update");
    assert_eq!(refreshed.blocks[1].plain_text(), "Synced from afar.");
    assert!(!harness.session.internal_update_in_progress());
}
