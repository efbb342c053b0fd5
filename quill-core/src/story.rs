//! The story tree and the `Story` aggregate.
//!
//! A story is an ordered forest of nodes (books, arcs, chapters, scenes,
//! plus marker nodes). Scenes are leaves and own paragraph lists. The
//! depth-first traversal order, children in stored order, defines the
//! canonical global paragraph sequence that the retrieval engines replay.

use crate::paragraph::{Paragraph, ParagraphId};
use crate::scene::{Scene, SceneError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Errors from story-tree operations.
#[derive(Debug, Error)]
pub enum StoryError {
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Unknown scene: {0}")]
    UnknownScene(NodeId),

    #[error("Anchor node {0} is not a child of the target parent")]
    InvalidAnchor(NodeId),

    #[error("Cannot move node {0} into its own subtree")]
    InvalidMove(NodeId),

    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Unique identifier for a story-tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Create a new unique node ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a plot point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlotPointId(Uuid);

impl PlotPointId {
    /// Create a new unique plot-point ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlotPointId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlotPointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A narrative thread the author wants tracked.
///
/// Lifecycle state is never stored here; it is derived per query by
/// replaying the plot-point actions recorded on paragraphs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotPoint {
    pub id: PlotPointId,
    pub title: String,
    #[serde(default)]
    pub summary: String,
}

impl PlotPoint {
    /// Create a plot point with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: PlotPointId::new(),
            title: title.into(),
            summary: String::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }
}

/// The kind of a story-tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Book,
    Arc,
    Chapter,
    Scene,
    /// Marker node carrying background material, never paragraphs.
    Context,
}

impl NodeKind {
    /// Get the display name.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Book => "book",
            NodeKind::Arc => "arc",
            NodeKind::Chapter => "chapter",
            NodeKind::Scene => "scene",
            NodeKind::Context => "context",
        }
    }
}

/// One node of the story tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub title: String,
    #[serde(default)]
    pub children: Vec<StoryNode>,
}

impl StoryNode {
    /// Create a node of the given kind.
    pub fn new(kind: NodeKind, title: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            title: title.into(),
            children: Vec::new(),
        }
    }

    fn contains(&self, id: NodeId) -> bool {
        self.id == id || self.children.iter().any(|c| c.contains(id))
    }
}

/// The ordered forest of story nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoryTree {
    pub roots: Vec<StoryNode>,
}

impl StoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a node by ID.
    pub fn find_node(&self, id: NodeId) -> Option<&StoryNode> {
        fn walk(nodes: &[StoryNode], id: NodeId) -> Option<&StoryNode> {
            for node in nodes {
                if node.id == id {
                    return Some(node);
                }
                if let Some(found) = walk(&node.children, id) {
                    return Some(found);
                }
            }
            None
        }
        walk(&self.roots, id)
    }

    fn find_node_mut(&mut self, id: NodeId) -> Option<&mut StoryNode> {
        fn walk(nodes: &mut [StoryNode], id: NodeId) -> Option<&mut StoryNode> {
            for node in nodes {
                if node.id == id {
                    return Some(node);
                }
                if let Some(found) = walk(&mut node.children, id) {
                    return Some(found);
                }
            }
            None
        }
        walk(&mut self.roots, id)
    }

    /// Path of node IDs from a root down to the given node, inclusive.
    pub fn find_path(&self, id: NodeId) -> Option<Vec<NodeId>> {
        fn walk(nodes: &[StoryNode], id: NodeId, path: &mut Vec<NodeId>) -> bool {
            for node in nodes {
                path.push(node.id);
                if node.id == id || walk(&node.children, id, path) {
                    return true;
                }
                path.pop();
            }
            false
        }

        let mut path = Vec::new();
        if walk(&self.roots, id, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    /// All nodes of one kind, in depth-first order.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<&StoryNode> {
        fn walk<'a>(nodes: &'a [StoryNode], kind: NodeKind, out: &mut Vec<&'a StoryNode>) {
            for node in nodes {
                if node.kind == kind {
                    out.push(node);
                }
                walk(&node.children, kind, out);
            }
        }

        let mut out = Vec::new();
        walk(&self.roots, kind, &mut out);
        out
    }

    /// Append a node under a parent (or as a root), optionally after a
    /// sibling anchor.
    pub fn append_node(
        &mut self,
        node: StoryNode,
        parent: Option<NodeId>,
        after: Option<NodeId>,
    ) -> Result<(), StoryError> {
        let siblings = match parent {
            Some(parent_id) => {
                let parent_node = self
                    .find_node_mut(parent_id)
                    .ok_or(StoryError::UnknownNode(parent_id))?;
                &mut parent_node.children
            }
            None => &mut self.roots,
        };

        match after {
            Some(anchor) => {
                let index = siblings
                    .iter()
                    .position(|n| n.id == anchor)
                    .ok_or(StoryError::InvalidAnchor(anchor))?;
                siblings.insert(index + 1, node);
            }
            None => siblings.push(node),
        }
        Ok(())
    }

    /// Detach a node (with its subtree) and return it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<StoryNode> {
        fn detach(nodes: &mut Vec<StoryNode>, id: NodeId) -> Option<StoryNode> {
            if let Some(index) = nodes.iter().position(|n| n.id == id) {
                return Some(nodes.remove(index));
            }
            for node in nodes {
                if let Some(found) = detach(&mut node.children, id) {
                    return Some(found);
                }
            }
            None
        }
        detach(&mut self.roots, id)
    }

    /// Move a node (with its subtree) under a new parent.
    pub fn move_node(
        &mut self,
        id: NodeId,
        new_parent: Option<NodeId>,
        after: Option<NodeId>,
    ) -> Result<(), StoryError> {
        let node = self.remove_node(id).ok_or(StoryError::UnknownNode(id))?;

        if let Some(parent_id) = new_parent {
            if node.contains(parent_id) {
                // Put it back where removal left the tree consistent.
                self.roots.push(node);
                return Err(StoryError::InvalidMove(id));
            }
        }

        match self.append_node(node, new_parent, after) {
            Ok(()) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Rename a node.
    pub fn rename_node(&mut self, id: NodeId, title: impl Into<String>) -> Result<(), StoryError> {
        let node = self.find_node_mut(id).ok_or(StoryError::UnknownNode(id))?;
        node.title = title.into();
        Ok(())
    }
}

/// A paragraph in canonical story order, with its owning scene.
#[derive(Debug, Clone, Copy)]
pub struct OrderedParagraph<'a> {
    pub scene_id: NodeId,
    pub scene_title: &'a str,
    pub paragraph: &'a Paragraph,
}

/// The whole story: tree structure, scene content, and plot points.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Story {
    pub tree: StoryTree,
    pub scenes: HashMap<NodeId, Scene>,
    pub plot_points: HashMap<PlotPointId, PlotPoint>,
}

impl Story {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node; scene nodes get a scene record as well.
    pub fn add_node(
        &mut self,
        kind: NodeKind,
        title: impl Into<String>,
        parent: Option<NodeId>,
    ) -> Result<NodeId, StoryError> {
        let title = title.into();
        let node = StoryNode::new(kind, title.clone());
        let id = node.id;
        self.tree.append_node(node, parent, None)?;
        if kind == NodeKind::Scene {
            self.scenes.insert(id, Scene::new(id, title));
        }
        Ok(id)
    }

    /// Remove a node and drop the scene records of its subtree.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), StoryError> {
        let node = self.tree.remove_node(id).ok_or(StoryError::UnknownNode(id))?;

        fn collect_scenes(node: &StoryNode, out: &mut Vec<NodeId>) {
            if node.kind == NodeKind::Scene {
                out.push(node.id);
            }
            for child in &node.children {
                collect_scenes(child, out);
            }
        }

        let mut removed = Vec::new();
        collect_scenes(&node, &mut removed);
        for scene_id in removed {
            self.scenes.remove(&scene_id);
        }
        Ok(())
    }

    /// Rename a node, keeping the scene record's title in step.
    pub fn rename_node(&mut self, id: NodeId, title: impl Into<String>) -> Result<(), StoryError> {
        let title = title.into();
        self.tree.rename_node(id, title.clone())?;
        if let Some(scene) = self.scenes.get_mut(&id) {
            scene.title = title;
        }
        Ok(())
    }

    /// Look up a scene.
    pub fn scene(&self, id: NodeId) -> Option<&Scene> {
        self.scenes.get(&id)
    }

    /// Look up a scene for mutation.
    pub fn scene_mut(&mut self, id: NodeId) -> Option<&mut Scene> {
        self.scenes.get_mut(&id)
    }

    /// Register a plot point.
    pub fn add_plot_point(&mut self, plot_point: PlotPoint) -> PlotPointId {
        let id = plot_point.id;
        self.plot_points.insert(id, plot_point);
        id
    }

    /// Look up a plot point.
    pub fn plot_point(&self, id: PlotPointId) -> Option<&PlotPoint> {
        self.plot_points.get(&id)
    }

    /// All registered plot points, in no particular order.
    pub fn plot_points(&self) -> impl Iterator<Item = &PlotPoint> + '_ {
        self.plot_points.values()
    }

    /// Scene IDs in canonical (depth-first) order.
    pub fn scene_ids_in_order(&self) -> Vec<NodeId> {
        self.tree
            .nodes_of_kind(NodeKind::Scene)
            .into_iter()
            .map(|n| n.id)
            .collect()
    }

    /// Every paragraph of the story in canonical order.
    ///
    /// Scenes present in the tree but missing a scene record are skipped;
    /// the traversal never fails.
    pub fn paragraphs_in_order(&self) -> Vec<OrderedParagraph<'_>> {
        let mut out = Vec::new();
        for node in self.tree.nodes_of_kind(NodeKind::Scene) {
            if let Some(scene) = self.scenes.get(&node.id) {
                for paragraph in &scene.paragraphs {
                    out.push(OrderedParagraph {
                        scene_id: node.id,
                        scene_title: scene.title.as_str(),
                        paragraph,
                    });
                }
            }
        }
        out
    }

    /// Total word count across all scenes, in canonical order.
    pub fn word_count(&self) -> u64 {
        self.scene_ids_in_order()
            .iter()
            .filter_map(|id| self.scenes.get(id))
            .map(|scene| scene.word_count() as u64)
            .sum()
    }

    /// Split a scene in two at a paragraph.
    ///
    /// The given paragraph starts the new scene; everything before it
    /// stays. The new scene is inserted as the next sibling, titled by
    /// bumping an existing "Part N" in the title or appending "(Part 2)".
    pub fn split_scene(&mut self, scene_id: NodeId, at: ParagraphId) -> Result<NodeId, StoryError> {
        let path = self
            .tree
            .find_path(scene_id)
            .ok_or(StoryError::UnknownNode(scene_id))?;
        let parent = if path.len() >= 2 {
            Some(path[path.len() - 2])
        } else {
            None
        };

        let scene = self
            .scenes
            .get_mut(&scene_id)
            .ok_or(StoryError::UnknownScene(scene_id))?;
        let tail = scene.split_off(at)?;
        let title = next_part_title(&scene.title);

        let node = StoryNode::new(NodeKind::Scene, title.clone());
        let new_id = node.id;
        self.tree.append_node(node, parent, Some(scene_id))?;

        let mut new_scene = Scene::new(new_id, title);
        new_scene.paragraphs = tail;
        new_scene.recount_words();
        self.scenes.insert(new_id, new_scene);
        Ok(new_id)
    }
}

/// Derive the title for the second half of a split scene.
fn next_part_title(title: &str) -> String {
    if let Some(start) = title.find("Part ") {
        let digits_start = start + "Part ".len();
        let digits: String = title[digits_start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(n) = digits.parse::<u32>() {
            let digits_end = digits_start + digits.len();
            return format!("{}Part {}{}", &title[..start], n + 1, &title[digits_end..]);
        }
    }
    format!("{title} (Part 2)")
}
