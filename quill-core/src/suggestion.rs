//! Suggestion lifecycle for paragraph records.
//!
//! Each paragraph has one suggestion slot: the `extra` text plus the
//! `extra_loading` flag on its record. A `SuggestionLedger` hands out a
//! ticket per request and only honors the newest ticket per paragraph,
//! so a superseded or canceled request can finish late without
//! clobbering the slot. Accepting promotes the slot into the paragraph
//! text; rejecting clears it and leaves the text alone.

use std::collections::HashMap;

use thiserror::Error;

use crate::paragraph::{Paragraph, ParagraphId, ParagraphText};
use crate::scene::{ParagraphUpdate, Scene, SceneError};

/// Errors from suggestion operations.
#[derive(Debug, Error)]
pub enum SuggestionError {
    #[error("paragraph {0} has no pending suggestion")]
    NoSuggestion(ParagraphId),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// What the suggestion slot of a paragraph currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionPhase {
    /// No pending suggestion and no request in flight.
    Idle,
    /// A request is in flight; any previous suggestion has been cleared.
    Loading,
    /// A suggestion is stored and waiting for an accept or reject.
    Available,
}

impl SuggestionPhase {
    pub fn of(paragraph: &Paragraph) -> Self {
        if paragraph.extra_loading {
            SuggestionPhase::Loading
        } else if has_suggestion(paragraph) {
            SuggestionPhase::Available
        } else {
            SuggestionPhase::Idle
        }
    }
}

/// True when the record holds suggestion text that is more than whitespace.
pub fn has_suggestion(paragraph: &Paragraph) -> bool {
    paragraph
        .extra
        .as_deref()
        .is_some_and(|extra| !extra.trim().is_empty())
}

/// Whether the suggestion widget for this paragraph should be shown.
///
/// A loading slot is always visible so the author sees the spinner even
/// after moving on. A stored suggestion is only shown while its own
/// paragraph holds the focus.
pub fn is_displayable(paragraph: &Paragraph, focused: Option<ParagraphId>) -> bool {
    let loading = paragraph.extra_loading;
    (has_suggestion(paragraph) || loading) && (loading || focused == Some(paragraph.id))
}

/// Handle for one in-flight suggestion request.
///
/// Completion only lands if the ticket is still the newest one issued
/// for its paragraph; a newer request, a cancel, or a resolved slot all
/// make it stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionTicket {
    paragraph_id: ParagraphId,
    token: u64,
}

impl SuggestionTicket {
    pub fn paragraph_id(&self) -> ParagraphId {
        self.paragraph_id
    }
}

/// Tracks the newest request token per paragraph.
///
/// The ledger never stores suggestion text itself; the text lives on the
/// paragraph record so it survives independently of the request that
/// produced it.
#[derive(Debug, Default)]
pub struct SuggestionLedger {
    tokens: HashMap<ParagraphId, u64>,
}

impl SuggestionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a request: clears any previous suggestion, marks the record
    /// loading, and returns the ticket the completion must present. Any
    /// earlier ticket for the same paragraph goes stale immediately.
    pub fn begin(
        &mut self,
        scene: &mut Scene,
        id: ParagraphId,
    ) -> Result<SuggestionTicket, SuggestionError> {
        scene.update_paragraph(
            id,
            ParagraphUpdate::new()
                .with_extra_cleared()
                .with_extra_loading(true),
        )?;
        let token = self.bump(id);
        Ok(SuggestionTicket {
            paragraph_id: id,
            token,
        })
    }

    /// Stores a completed suggestion on the record. Returns false when the
    /// ticket went stale or the paragraph no longer exists; the text is
    /// dropped without touching anything in that case.
    pub fn deliver(
        &mut self,
        scene: &mut Scene,
        ticket: SuggestionTicket,
        text: impl Into<String>,
    ) -> bool {
        if !self.is_current(ticket) {
            tracing::debug!(paragraph = %ticket.paragraph_id, "dropping superseded suggestion");
            return false;
        }
        scene
            .update_paragraph(
                ticket.paragraph_id,
                ParagraphUpdate::new()
                    .with_extra(text)
                    .with_extra_loading(false),
            )
            .is_ok()
    }

    /// Clears the loading flag after a failed request. Stale tickets are
    /// ignored so a late failure cannot wipe a newer request's spinner.
    pub fn fail(&mut self, scene: &mut Scene, ticket: SuggestionTicket) -> bool {
        if !self.is_current(ticket) {
            tracing::debug!(paragraph = %ticket.paragraph_id, "ignoring failure from a superseded request");
            return false;
        }
        scene
            .update_paragraph(
                ticket.paragraph_id,
                ParagraphUpdate::new().with_extra_loading(false),
            )
            .is_ok()
    }

    /// Invalidates whatever request is in flight for the paragraph and
    /// clears its loading flag. Cancellation is advisory: the request
    /// itself keeps running and its result is dropped on arrival.
    pub fn cancel(&mut self, scene: &mut Scene, id: ParagraphId) -> Result<(), SuggestionError> {
        self.bump(id);
        scene.update_paragraph(id, ParagraphUpdate::new().with_extra_loading(false))?;
        Ok(())
    }

    /// Promotes the stored suggestion into the paragraph text and clears
    /// the slot. Errors when the slot holds nothing but whitespace.
    pub fn accept(&mut self, scene: &mut Scene, id: ParagraphId) -> Result<(), SuggestionError> {
        let paragraph = scene
            .paragraph(id)
            .ok_or(SceneError::UnknownParagraph(id))?;
        let Some(text) = paragraph
            .extra
            .clone()
            .filter(|extra| !extra.trim().is_empty())
        else {
            return Err(SuggestionError::NoSuggestion(id));
        };
        self.bump(id);
        scene.update_paragraph(
            id,
            ParagraphUpdate::new()
                .with_text(ParagraphText::Plain(text))
                .with_extra_cleared()
                .with_extra_loading(false),
        )?;
        Ok(())
    }

    /// Discards the stored suggestion and leaves the paragraph text alone.
    pub fn reject(&mut self, scene: &mut Scene, id: ParagraphId) -> Result<(), SuggestionError> {
        self.bump(id);
        scene.update_paragraph(
            id,
            ParagraphUpdate::new()
                .with_extra_cleared()
                .with_extra_loading(false),
        )?;
        Ok(())
    }

    // Resolving a slot bumps the token too, so a request that was still in
    // flight when the author accepted or rejected cannot land afterwards.
    fn bump(&mut self, id: ParagraphId) -> u64 {
        let token = self.tokens.entry(id).or_insert(0);
        *token += 1;
        *token
    }

    fn is_current(&self, ticket: SuggestionTicket) -> bool {
        self.tokens.get(&ticket.paragraph_id) == Some(&ticket.token)
    }
}

// ============================================================================
// Tests
// ============================================================================
