//! Derived story state, recomputed by replay.
//!
//! Both engines walk the canonical paragraph sequence from the start on
//! every query: scenes in depth-first tree order, paragraphs in stored
//! order. Nothing here caches; a query after any mutation sees the
//! current story.

mod inventory;
mod plot;

pub use inventory::items_at_paragraph;
pub use plot::{
    plot_points_at_paragraph, resolved_plot_points_at_paragraph, PlotPointStatus, PlotStanding,
    MENTION_THRESHOLD, PARTIAL_THRESHOLD,
};
