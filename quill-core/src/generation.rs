//! AI generation orchestration.
//!
//! Maps each kind of help to its system prompt, assembles the prompt
//! context for a paragraph, and drives requests through the suggestion
//! lifecycle: begin, call the model, deliver or fail. The prompt's
//! stable prefix (scene setup, preceding paragraphs) is cache-marked so
//! repeated requests against the same scene reuse it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paragraph::ParagraphId;
use crate::scene::Scene;
use crate::suggestion::{SuggestionError, SuggestionLedger};

const DEFAULT_MAX_TOKENS: usize = 1024;

/// Errors from generation orchestration.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("paragraph {0} is not in the scene")]
    UnknownParagraph(ParagraphId),
    #[error("the model returned an empty completion")]
    EmptyCompletion,
    #[error(transparent)]
    Api(#[from] muse::Error),
    #[error(transparent)]
    Suggestion(#[from] SuggestionError),
}

/// Which kind of help the author asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    SuggestTitle,
    NextParagraph,
    Write,
    Critique,
    RewriteSimilar,
    Rewrite,
    Synopsis,
    CritiqueStoryline,
    Summarize,
    Free,
    Suggestions,
}

impl GenerationKind {
    /// The system prompt for this kind of help.
    pub fn instruction(&self) -> &'static str {
        match self {
            GenerationKind::SuggestTitle => {
                "You are a writing assistant. You will be prompted with a set of paragraphs, \
                 suggest a title for the chapter that the content represents. Output only the \
                 suggested title."
            }
            GenerationKind::NextParagraph => {
                "You are a writing assistant. When prompted with a set of paragraphs, you will \
                 output a suggestion for the next paragraph of the story. There is no need to \
                 leave the paragraph open ended or make it needlessly positive in an otherwise \
                 grim situation. This is for a novel, do not rush the story along. There is time \
                 to describe things and reflect for the characters."
            }
            GenerationKind::Write => {
                "You are a writing assistant. When prompted with a set of paragraphs, you will \
                 interpret the summary given between brackets (e.g. [ and ]) and write a few \
                 paragraphs based on them. There is no need to leave the paragraph open ended or \
                 make it needlessly positive in an otherwise grim situation. Do not rush the \
                 story along. There is time to describe things and reflect for the characters."
            }
            GenerationKind::Critique => {
                "You are a writing assistant, try to give constructive advice. When prompted \
                 with a set of paragraphs, you will output a concerns you might have about the \
                 writing. This could be anything from grammar to plot holes to character \
                 inconsistencies."
            }
            GenerationKind::RewriteSimilar => {
                "You are a writing assistant. When prompted with a set of paragraphs, you will \
                 output a rewritten version of the paragraphs in idiomatic English. Where \
                 possible, try to stick to the original meaning. Use a descriptive words, but \
                 don't use complex ones where simple will do. If there's curses in the text, \
                 feel free to be creative with them. Do not add new information and especially \
                 do not change the tone."
            }
            GenerationKind::Rewrite => {
                "You are a writing assistant. When prompted with a set of paragraphs, you will \
                 output a rewritten version of the paragraphs that varies the original contents \
                 a bit. Where possible sensations and thoughts can be expanded, changed or \
                 removed. Preserve the original meaning and intent of the paragraph. Do not \
                 change the tone."
            }
            GenerationKind::Synopsis => {
                "You are a writing assistant, try to give constructive advice. When prompted \
                 with a set of paragraphs, you will output a summary of the given paragraphs."
            }
            GenerationKind::CritiqueStoryline => {
                "You are a writing assistant, try to give constructive advice. When prompted \
                 you will output a list of possible concerns with the storyline based on the \
                 information you've received. If they exist, focus specifically on \
                 inconsistencies and or plot holes. Try to provide ways the issues could be \
                 resolved or mitigated. Consider the full scope of the information presented, \
                 not just the information at the end."
            }
            GenerationKind::Summarize => {
                "You are a writing assistant. When prompted with a set of paragraphs, you will \
                 output a summary of the given paragraphs."
            }
            GenerationKind::Free => {
                "You are a writing assistant. Help answer the stated question."
            }
            GenerationKind::Suggestions => {
                "You are a writing assistant. You will be prompted with a paragraph and the \
                 context, and are expected to give advice on how to improve the writing in \
                 question. Do not care about profanity. Consider especially the writing adage \
                 of \"show don't tell\". Only make suggestions if they are a significant \
                 improvement. Return answer to the format:\n\n[current]: [suggestion] \
                 ([reason])\n\nExample:\n\nI freeze like a deer in headlights: icy panic seizes \
                 me, my feet glued to the ground (The phrase \"freeze like a deer in \
                 headlights\" is a common cliché)\n\nKeep the suggestions to less than a \
                 sentence each. Order from most important to least, maximum of three."
            }
        }
    }
}

/// One section of prompt context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBlock {
    pub text: String,
    /// Stable sections end a cacheable prompt prefix.
    pub cache: bool,
}

impl ContextBlock {
    pub fn new(text: impl Into<String>, cache: bool) -> Self {
        Self {
            text: text.into(),
            cache,
        }
    }
}

/// Assembles the prompt context for one paragraph: the scene setup, up
/// to five preceding paragraphs (nearest first), and the paragraph
/// itself with its follower. Only the trailing block changes as the
/// author types. Returns an empty list when the paragraph is not in the
/// scene.
pub fn suggestion_context(scene: &Scene, paragraph_id: ParagraphId) -> Vec<ContextBlock> {
    let Some(index) = scene.index_of(paragraph_id) else {
        return Vec::new();
    };
    let mut blocks = Vec::new();

    let mut setup = format!("<scene title=\"{}\">", scene.title);
    if !scene.summary.is_empty() {
        setup.push_str("\n<summary>");
        setup.push_str(&scene.summary);
        setup.push_str("</summary>");
    }
    blocks.push(ContextBlock::new(setup, true));

    let mut previous = Vec::new();
    for back in 1..=5 {
        let Some(prev_index) = index.checked_sub(back) else {
            break;
        };
        let text = scene.paragraphs[prev_index].plain_text();
        previous.push(format!(
            "<previous_paragraph_{back}>{text}</previous_paragraph_{back}>"
        ));
    }
    if !previous.is_empty() {
        blocks.push(ContextBlock::new(previous.join("\n"), true));
    }

    let current = scene.paragraphs[index].plain_text();
    let next = scene
        .paragraphs
        .get(index + 1)
        .map(|p| p.plain_text())
        .unwrap_or_default();
    blocks.push(ContextBlock::new(
        format!("<current_paragraph>{current}</current_paragraph>\n<next_paragraph>{next}</next_paragraph>"),
        false,
    ));

    blocks
}

/// Drives suggestion generation against the model.
pub struct ProseAssistant {
    client: muse::Muse,
    max_tokens: usize,
}

impl ProseAssistant {
    pub fn new(client: muse::Muse) -> Self {
        Self {
            client,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// One-shot completion for a help request. Cache-marked blocks end a
    /// five-minute cacheable prefix; empty blocks are dropped.
    pub async fn generate(
        &self,
        kind: GenerationKind,
        blocks: Vec<ContextBlock>,
    ) -> Result<String, GenerationError> {
        let content: Vec<muse::ContentBlock> = blocks
            .into_iter()
            .filter(|block| !block.text.is_empty())
            .map(|block| {
                if block.cache {
                    muse::ContentBlock::cached(block.text, muse::CacheTtl::FiveMinutes)
                } else {
                    muse::ContentBlock::text(block.text)
                }
            })
            .collect();
        let request = muse::Request::new(vec![muse::Message::user_blocks(content)])
            .with_system(kind.instruction())
            .with_max_tokens(self.max_tokens);

        tracing::debug!(?kind, "requesting completion");
        let response = self.client.complete(request).await?;
        let text = response.text();
        if text.trim().is_empty() {
            return Err(GenerationError::EmptyCompletion);
        }
        Ok(text)
    }

    /// Full suggestion flow for one paragraph: mark it loading, call the
    /// model, deliver through the ledger. Returns whether the result
    /// landed; a request superseded or canceled while in flight resolves
    /// to `Ok(false)` and the completion is dropped. On failure the
    /// loading flag is cleared and the error surfaces to the caller.
    pub async fn suggest(
        &self,
        ledger: &mut SuggestionLedger,
        scene: &mut Scene,
        kind: GenerationKind,
        paragraph_id: ParagraphId,
    ) -> Result<bool, GenerationError> {
        let blocks = suggestion_context(scene, paragraph_id);
        if blocks.is_empty() {
            return Err(GenerationError::UnknownParagraph(paragraph_id));
        }
        let ticket = ledger.begin(scene, paragraph_id)?;
        match self.generate(kind, blocks).await {
            Ok(text) => Ok(ledger.deliver(scene, ticket, text)),
            Err(err) => {
                ledger.fail(scene, ticket);
                Err(err)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
