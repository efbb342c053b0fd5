//! Plot-point surfacing at a paragraph.
//!
//! Two passes over the canonical sequence. The first records which
//! points receive an `introduce` action anywhere in the story, before or
//! after the target. The second tracks each point's most recent action
//! up to the target, then filters to the points worth resurfacing: never
//! introduced at all, or left untouched for long enough that the author
//! likely lost track of them.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::paragraph::{ParagraphId, PlotActionKind};
use crate::story::{PlotPointId, Story};

/// Paragraphs of inactivity before an open plot point resurfaces.
pub const MENTION_THRESHOLD: u64 = 150;
/// Higher bar for partially resolved points.
pub const PARTIAL_THRESHOLD: u64 = 300;

/// Where a plot point stands at the queried paragraph.
///
/// The four action standings are literal action names recorded on
/// paragraphs. `Unintroduced` is synthetic: no `introduce` action exists
/// anywhere in the story, no matter what other actions reference the
/// point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlotStanding {
    #[serde(rename = "unintroduced")]
    Unintroduced,
    #[serde(rename = "introduce")]
    Introduce,
    #[serde(rename = "mentioned")]
    Mentioned,
    #[serde(rename = "partially resolved")]
    PartiallyResolved,
    #[serde(rename = "resolved")]
    Resolved,
}

impl From<PlotActionKind> for PlotStanding {
    fn from(kind: PlotActionKind) -> Self {
        match kind {
            PlotActionKind::Introduce => PlotStanding::Introduce,
            PlotActionKind::Mentioned => PlotStanding::Mentioned,
            PlotActionKind::PartiallyResolved => PlotStanding::PartiallyResolved,
            PlotActionKind::Resolved => PlotStanding::Resolved,
        }
    }
}

/// Snapshot of one plot point's most recent activity at a paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlotPointStatus {
    pub id: PlotPointId,
    pub title: String,
    pub standing: PlotStanding,
    pub last_mention_paragraph: Option<ParagraphId>,
    pub last_mention_scene: Option<String>,
    /// Distance from the target paragraph once it is reached; on the
    /// end-of-story fallback this is the absolute position of the mention.
    pub paragraphs_ago: Option<u64>,
    pub ever_introduced: bool,
}

/// Plot points worth bringing back to the author's attention at the
/// target paragraph, inclusive of that paragraph's own actions.
///
/// Points are reported in title order. A target that is not in the story
/// falls back to end-of-story standings.
pub fn plot_points_at_paragraph(story: &Story, target: ParagraphId) -> Vec<PlotPointStatus> {
    let mut order: Vec<PlotPointId> = Vec::new();
    let mut states: HashMap<PlotPointId, PlotPointStatus> = HashMap::new();
    let mut points: Vec<_> = story.plot_points().collect();
    points.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
    for point in points {
        order.push(point.id);
        states.insert(
            point.id,
            PlotPointStatus {
                id: point.id,
                title: point.title.clone(),
                standing: PlotStanding::Unintroduced,
                last_mention_paragraph: None,
                last_mention_scene: None,
                paragraphs_ago: None,
                ever_introduced: false,
            },
        );
    }

    // First pass: introduction anywhere in the story, not just before
    // the target.
    for entry in story.paragraphs_in_order() {
        for action in &entry.paragraph.plot_point_actions {
            if action.action == PlotActionKind::Introduce {
                if let Some(state) = states.get_mut(&action.plot_point_id) {
                    state.ever_introduced = true;
                }
            }
        }
    }

    // Second pass: most recent action per point, up to the target.
    let mut count: u64 = 0;
    for entry in story.paragraphs_in_order() {
        count += 1;
        for action in &entry.paragraph.plot_point_actions {
            let Some(state) = states.get_mut(&action.plot_point_id) else {
                continue;
            };
            // A mention before any introduction keeps the synthetic
            // unintroduced standing; the mention itself is still recorded.
            state.standing =
                if state.ever_introduced || action.action == PlotActionKind::Introduce {
                    PlotStanding::from(action.action)
                } else {
                    PlotStanding::Unintroduced
                };
            state.last_mention_paragraph = Some(entry.paragraph.id);
            state.last_mention_scene = Some(entry.scene_title.to_string());
            state.paragraphs_ago = Some(count);
        }
        if entry.paragraph.id == target {
            let mut results = into_ordered(&order, states);
            for state in &mut results {
                if let Some(ago) = state.paragraphs_ago {
                    state.paragraphs_ago = Some(count - ago);
                }
            }
            results.retain(should_surface);
            return results;
        }
    }

    let mut results = into_ordered(&order, states);
    results.retain(should_surface);
    results
}

/// IDs of every plot point that has received a `resolved` action up to
/// and including the target paragraph. An unknown target yields the
/// whole story's resolved set.
pub fn resolved_plot_points_at_paragraph(
    story: &Story,
    target: ParagraphId,
) -> HashSet<PlotPointId> {
    let mut resolved = HashSet::new();
    for entry in story.paragraphs_in_order() {
        for action in &entry.paragraph.plot_point_actions {
            if action.action == PlotActionKind::Resolved {
                resolved.insert(action.plot_point_id);
            }
        }
        if entry.paragraph.id == target {
            return resolved;
        }
    }
    resolved
}

fn into_ordered(
    order: &[PlotPointId],
    mut states: HashMap<PlotPointId, PlotPointStatus>,
) -> Vec<PlotPointStatus> {
    order.iter().filter_map(|id| states.remove(id)).collect()
}

fn should_surface(state: &PlotPointStatus) -> bool {
    // Truly unintroduced points always surface.
    if state.standing == PlotStanding::Unintroduced && !state.ever_introduced {
        return true;
    }
    if state.standing == PlotStanding::Resolved {
        return false;
    }
    let Some(ago) = state.paragraphs_ago else {
        return false;
    };
    if ago < MENTION_THRESHOLD {
        return false;
    }
    if state.standing == PlotStanding::PartiallyResolved && ago < PARTIAL_THRESHOLD {
        return false;
    }
    true
}

// ============================================================================
// Tests
// ============================================================================
