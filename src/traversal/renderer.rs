//! Tree drawing.
//!
//! The renderer never builds the drawing itself. It streams one
//! [`RenderFragment`] per node as a `Partial` event; a front end turns the
//! fragments into lines (or widgets) as they arrive:
//!
//! ```text
//! a  [one]
//! └── a1  [two]
//!     ├── a12a
//!     └── a12b
//! ```

use crate::error::Result;
use crate::traversal::{EventPayload, Position, ProgressSink, Visitor};
use crate::tree::TreeNode;
use crate::types::{NodeId, TreeCounts};
use std::collections::HashSet;
use std::fmt;

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const RAIL: &str = "│   ";
const GAP: &str = "    ";

/// Everything needed to draw one node of the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFragment {
    pub id: NodeId,
    pub depth: usize,
    /// Indentation and connector drawn before the label
    pub prefix: String,
    pub label: String,
    pub producing_function: Option<String>,
    /// Node is part of a highlighted path
    pub highlighted: bool,
    pub leaf: bool,
}

impl RenderFragment {
    /// Plain-text line for terminal output
    pub fn line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RenderFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.label)?;
        if let Some(function) = &self.producing_function {
            write!(f, "  [{}]", function)?;
        }
        if self.highlighted {
            write!(f, "  *")?;
        }
        Ok(())
    }
}

/// Visitor streaming render fragments and counting nodes
#[derive(Debug, Default)]
pub struct Renderer {
    highlighted: HashSet<NodeId>,
    counts: TreeCounts,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark these ids as lying on a highlighted path
    pub fn with_highlighted(mut self, ids: HashSet<NodeId>) -> Self {
        self.highlighted = ids;
        self
    }

    fn prefix(position: &Position<'_>) -> String {
        if position.depth == 0 {
            return String::new();
        }
        let mut prefix = String::with_capacity(position.depth * RAIL.len());
        for &more_below in position.rails {
            prefix.push_str(if more_below { RAIL } else { GAP });
        }
        prefix.push_str(if position.is_last { LAST_BRANCH } else { BRANCH });
        prefix
    }
}

impl Visitor for Renderer {
    type Output = TreeCounts;

    fn enter(
        &mut self,
        node: &TreeNode,
        position: &Position<'_>,
        sink: &mut ProgressSink,
    ) -> Result<()> {
        if node.is_leaf() {
            self.counts.leaves += 1;
        } else {
            self.counts.nodes += 1;
        }

        sink.partial(EventPayload::Fragment(RenderFragment {
            id: node.id(),
            depth: position.depth,
            prefix: Self::prefix(position),
            label: node.label().to_string(),
            producing_function: node.producing_function().map(str::to_string),
            highlighted: self.highlighted.contains(&node.id()),
            leaf: node.is_leaf(),
        }));
        Ok(())
    }

    fn progress_payload(&self) -> EventPayload {
        EventPayload::Counts(self.counts)
    }

    fn summary(&self) -> EventPayload {
        EventPayload::Counts(self.counts)
    }

    fn finish(self) -> TreeCounts {
        self.counts
    }
}
