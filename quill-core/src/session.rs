//! Editing-session state for one scene.
//!
//! The session mediates between the editing surface's document and the
//! paragraph store. Edits flow surface-to-store through
//! `apply_editor_update`; store changes flow back through
//! `external_document`. A reentrancy flag keeps the two paths from
//! interleaving: while an internal update is in progress, external
//! refreshes are skipped, and `settle` performs the one deferred
//! re-check after the grace window.

use std::time::Duration;

use crate::detect::detect_changes;
use crate::document::{from_document, to_document, Document};
use crate::paragraph::{Paragraph, ParagraphId};
use crate::scene::{Scene, SceneError};
use crate::story::NodeId;

/// Tuning for the reentrancy protocol.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long external refreshes stay paused after an internal update.
    pub grace_window: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            grace_window: Duration::from_millis(50),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grace_window(mut self, grace_window: Duration) -> Self {
        self.grace_window = grace_window;
        self
    }
}

/// Synchronizes one scene's paragraph store with an editing surface.
///
/// Exactly one direction is active at a time: an editor transaction sets
/// the internal-update flag before the store mutation, and the flag is
/// only cleared by `settle` after the grace window has passed. Store
/// subscriptions firing during the mutation therefore always observe the
/// flag as set.
#[derive(Debug)]
pub struct SceneSession {
    scene_id: NodeId,
    config: SessionConfig,
    internal_update: bool,
    shown: Vec<(ParagraphId, String)>,
}

impl SceneSession {
    /// Open a session against the scene's current paragraphs.
    pub fn new(scene: &Scene) -> Self {
        Self::with_config(scene, SessionConfig::default())
    }

    pub fn with_config(scene: &Scene, config: SessionConfig) -> Self {
        Self {
            scene_id: scene.id,
            config,
            internal_update: false,
            shown: snapshot(&scene.paragraphs),
        }
    }

    /// Whether an internal update is currently holding refreshes off.
    pub fn internal_update_in_progress(&self) -> bool {
        self.internal_update
    }

    /// Build the full document for the surface and remember what it shows.
    pub fn document(&mut self, scene: &Scene) -> Document {
        self.shown = snapshot(&scene.paragraphs);
        to_document(&scene.paragraphs)
    }

    /// Interpret one editor transaction against the store.
    ///
    /// Sets the reentrancy flag before mutating, applies the resulting
    /// edit plan, and returns the IDs the document changed. The flag
    /// stays set until `settle` runs.
    pub fn apply_editor_update(
        &mut self,
        scene: &mut Scene,
        document: &Document,
    ) -> Result<Vec<ParagraphId>, SceneError> {
        let update = from_document(document, &scene.paragraphs);
        let changed = update.changed.clone();
        let plan = detect_changes(&update, &scene.paragraphs);
        if plan.is_empty() {
            return Ok(changed);
        }
        tracing::debug!(
            scene = %self.scene_id,
            updates = plan.updates.len(),
            inserts = plan.inserts.len(),
            removals = plan.removals.len(),
            "applying editor update"
        );
        self.internal_update = true;
        plan.apply(scene)?;
        self.shown = snapshot(&scene.paragraphs);
        Ok(changed)
    }

    /// Store-to-surface refresh.
    ///
    /// Returns a rebuilt document when the store no longer matches what
    /// the surface shows; `None` while an internal update is in progress
    /// or when nothing structural changed. Suggestion fields are not
    /// structural and never trigger a refresh on their own.
    pub fn external_document(&mut self, scene: &Scene) -> Option<Document> {
        if self.internal_update {
            tracing::debug!(scene = %self.scene_id, "refresh skipped during internal update");
            return None;
        }
        if snapshot(&scene.paragraphs) == self.shown {
            return None;
        }
        Some(self.document(scene))
    }

    /// Wait out the grace window, clear the reentrancy flag, and perform
    /// the one deferred refresh if the store moved on in the meantime.
    pub async fn settle(&mut self, scene: &Scene) -> Option<Document> {
        tokio::time::sleep(self.config.grace_window).await;
        self.internal_update = false;
        if snapshot(&scene.paragraphs) == self.shown {
            return None;
        }
        tracing::debug!(
            scene = %self.scene_id,
            "store changed during internal update, refreshing"
        );
        Some(self.document(scene))
    }
}

// The surface snapshot ignores suggestion fields: `extra` and the
// loading flag render as decorations, not structure.
fn snapshot(paragraphs: &[Paragraph]) -> Vec<(ParagraphId, String)> {
    paragraphs
        .iter()
        .map(|p| (p.id, p.text.plain()))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
