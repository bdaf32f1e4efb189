//! Node and leaf counting.

use crate::error::Result;
use crate::traversal::{EventPayload, Position, ProgressSink, Visitor};
use crate::tree::TreeNode;
use crate::types::TreeCounts;

/// Accumulates `(nodes, leaves)` over a walk
#[derive(Debug, Default)]
pub struct Counter {
    counts: TreeCounts,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Visitor for Counter {
    type Output = TreeCounts;

    fn enter(&mut self, node: &TreeNode, _: &Position<'_>, _: &mut ProgressSink) -> Result<()> {
        if node.is_leaf() {
            self.counts.leaves += 1;
        } else {
            self.counts.nodes += 1;
        }
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
