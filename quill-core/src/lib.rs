//! Fiction-writing engine with AI-assisted drafting.
//!
//! This crate provides:
//! - A paragraph store with identity-keyed editor synchronization
//! - An AI suggestion lifecycle with stale-result protection
//! - Sentence-level suggestion diffs for review display
//! - Derived story state (inventory, plot threads) recomputed by replay
//!
//! # Quick Start
//!
//! ```ignore
//! use quill_core::story::NodeId;
//! use quill_core::{GenerationKind, ProseAssistant, Scene, SuggestionLedger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut scene = Scene::new(NodeId::new(), "The Crossing");
//!     let first = scene.create_paragraph("The river ran high that night.", None);
//!
//!     let assistant = ProseAssistant::new(muse::Muse::from_env()?);
//!     let mut ledger = SuggestionLedger::new();
//!
//!     assistant
//!         .suggest(&mut ledger, &mut scene, GenerationKind::Rewrite, first)
//!         .await?;
//!     ledger.accept(&mut scene, first)?;
//!
//!     println!("{}", scene.paragraphs[0].plain_text());
//!     Ok(())
//! }
//! ```

pub mod detect;
pub mod diff;
pub mod document;
pub mod generation;
pub mod paragraph;
pub mod retrieval;
pub mod scene;
pub mod session;
pub mod story;
pub mod suggestion;
pub mod testing;

// Primary public API
pub use detect::{detect_changes, EditPlan};
pub use diff::{diff, DiffPart, DiffTag};
pub use document::{from_document, to_document, Block, Document, InlineNode};
pub use generation::{suggestion_context, GenerationError, GenerationKind, ProseAssistant};
pub use paragraph::{Paragraph, ParagraphId, ParagraphState, ParagraphText};
pub use retrieval::{items_at_paragraph, plot_points_at_paragraph, PlotPointStatus};
pub use scene::{ParagraphUpdate, Scene, SceneError};
pub use session::{SceneSession, SessionConfig};
pub use story::{NodeKind, Story};
pub use suggestion::{SuggestionLedger, SuggestionPhase, SuggestionTicket};
pub use testing::{EditorHarness, MockAssistant, MockCompletion, StoryBuilder};
