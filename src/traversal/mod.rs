//! Depth-first traversal of lazy tree views.
//!
//! A [`Walker`] opens a fresh view from a [`TreeBuilder`], visits every node
//! once in preorder (node, then children left to right) and discards the view.
//! What happens at each node is decided by a [`Visitor`]:
//!
//! - [`Counter`] - interior node and leaf totals
//! - [`PathFinder`] - root-to-node label paths whose node matches a pattern
//! - [`Renderer`] - one drawable tree line per node
//!
//! # Cancellation
//!
//! The shared [`CancelToken`] is polled before every node, including before a
//! child is generated. Once it is set the walk unwinds immediately, sends a
//! single `Cancelled` event and returns [`Outcome::Cancelled`] with whatever
//! the visitor accumulated so far. Events already sent stay valid. A walk
//! blocked on a full progress channel is released too; see
//! [`events`] for what happens to its pending events.
//!
//! # State machine
//!
//! `Idle -> Running -> Completed | Cancelled`, or `Failed` when a transform
//! error aborts the walk. A walker runs once; there is no pause or resume, and
//! a second [`Walker::run`] is rejected.

pub mod counter;
pub mod events;
pub mod path_finder;
pub mod renderer;

pub use counter::Counter;
pub use events::{
    progress_channel, EventPayload, EventStatus, ProgressSink, TraversalEvent,
    DEFAULT_PROGRESS_CAPACITY, DEFAULT_SEND_POLL,
};
pub use path_finder::{LabelMatcher, PathFinder, SearchMode, SearchResult};
pub use renderer::{RenderFragment, Renderer};

use crate::error::{DeriveError, Result};
use crate::tree::{TreeBuilder, TreeNode};
use crate::types::{NodeId, TreeCounts};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared, cooperative cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it at its next poll.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// How an operation ended. Cancellation is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Completed(T),
    Cancelled(T),
}

impl<T> Outcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled(_))
    }

    /// The (possibly partial) result, regardless of how the operation ended
    pub fn into_inner(self) -> T {
        match self {
            Outcome::Completed(v) | Outcome::Cancelled(v) => v,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Completed(v) => Outcome::Completed(f(v)),
            Outcome::Cancelled(v) => Outcome::Cancelled(f(v)),
        }
    }
}

/// Lifecycle of a single walker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalState {
    Idle,
    Running,
    Completed,
    Cancelled,
    /// A transform error ended the walk
    Failed,
}

/// Where a node sits in the walk
#[derive(Debug)]
pub struct Position<'a> {
    /// Distance from the root (root is 0)
    pub depth: usize,
    /// Whether this is the last child of its parent (true for the root)
    pub is_last: bool,
    /// For each ancestor below the root, whether it still has siblings after it
    pub rails: &'a [bool],
}

/// Per-node behaviour plugged into a [`Walker`]
pub trait Visitor {
    type Output;

    /// Called before the node's children are generated
    fn enter(&mut self, node: &TreeNode, position: &Position<'_>, sink: &mut ProgressSink)
        -> Result<()>;

    /// Called after all of the node's children were walked
    fn leave(&mut self, _node: &TreeNode) {}

    /// Payload of the progress event sent after each node
    fn progress_payload(&self) -> EventPayload {
        EventPayload::None
    }

    /// Payload of the terminal event
    fn summary(&self) -> EventPayload {
        EventPayload::None
    }

    fn finish(self) -> Self::Output;
}

enum Flow {
    Continue,
    Cancelled,
}

/// Single-use depth-first walker
pub struct Walker<'a, V: Visitor> {
    visitor: Option<V>,
    cancel: &'a CancelToken,
    sink: &'a mut ProgressSink,
    rails: Vec<bool>,
    state: TraversalState,
}

impl<'a, V: Visitor> Walker<'a, V> {
    pub fn new(visitor: V, cancel: &'a CancelToken, sink: &'a mut ProgressSink) -> Self {
        Self {
            visitor: Some(visitor),
            cancel,
            sink,
            rails: Vec::new(),
            state: TraversalState::Idle,
        }
    }

    pub fn state(&self) -> TraversalState {
        self.state
    }

    /// Walk a fresh view of `builder` to the end or until cancelled.
    ///
    /// A transform failure aborts the walk and is returned as the error; no
    /// terminal event is sent in that case.
    pub fn run(&mut self, builder: &TreeBuilder) -> Result<Outcome<V::Output>> {
        let Some(mut visitor) = self.visitor.take() else {
            return Err(DeriveError::Traversal(format!(
                "walker already ran ({:?})",
                self.state
            )));
        };
        self.state = TraversalState::Running;
        self.sink.watch(self.cancel, DEFAULT_SEND_POLL);
        tracing::debug!(
            "Traversal started ({} transforms)",
            builder.transforms().len()
        );

        let flow = if self.cancel.is_cancelled() {
            Ok(Flow::Cancelled)
        } else {
            builder
                .open()
                .and_then(|root| self.walk(&mut visitor, root, 0, true))
        };

        match flow {
            Ok(Flow::Continue) => {
                self.state = TraversalState::Completed;
                self.sink.completed(visitor.summary());
                tracing::debug!("Traversal completed");
                Ok(Outcome::Completed(visitor.finish()))
            }
            Ok(Flow::Cancelled) => {
                self.state = TraversalState::Cancelled;
                self.sink.cancelled(visitor.summary());
                tracing::debug!("Traversal cancelled");
                Ok(Outcome::Cancelled(visitor.finish()))
            }
            Err(e) => {
                self.state = TraversalState::Failed;
                tracing::debug!("Traversal failed: {}", e);
                Err(e)
            }
        }
    }

    fn walk(
        &mut self,
        visitor: &mut V,
        mut node: TreeNode,
        depth: usize,
        is_last: bool,
    ) -> Result<Flow> {
        let position = Position {
            depth,
            is_last,
            rails: &self.rails,
        };
        visitor.enter(&node, &position, self.sink)?;
        self.sink.progress(visitor.progress_payload());

        let mut children = node.take_children();
        let count = children.len();
        if depth > 0 {
            self.rails.push(!is_last);
        }

        let mut flow = Flow::Continue;
        for index in 0..count {
            if self.cancel.is_cancelled() {
                flow = Flow::Cancelled;
                break;
            }
            let Some(child) = children.next() else {
                break;
            };
            if let Flow::Cancelled = self.walk(visitor, child?, depth + 1, index + 1 == count)? {
                flow = Flow::Cancelled;
                break;
            }
        }

        if depth > 0 {
            self.rails.pop();
        }
        if let Flow::Continue = flow {
            visitor.leave(&node);
        }
        Ok(flow)
    }
}

/// Count interior nodes and leaves
pub fn count(
    builder: &TreeBuilder,
    cancel: &CancelToken,
    sink: &mut ProgressSink,
) -> Result<Outcome<TreeCounts>> {
    Walker::new(Counter::new(), cancel, sink).run(builder)
}

/// Search node labels with `matcher` and collect the matching paths
pub fn find_paths<M: LabelMatcher>(
    builder: &TreeBuilder,
    finder: PathFinder<M>,
    cancel: &CancelToken,
    sink: &mut ProgressSink,
) -> Result<Outcome<SearchResult>> {
    Walker::new(finder, cancel, sink).run(builder)
}

/// Stream a drawing of the tree and return its totals
pub fn render(
    builder: &TreeBuilder,
    highlighted: Option<HashSet<NodeId>>,
    cancel: &CancelToken,
    sink: &mut ProgressSink,
) -> Result<Outcome<TreeCounts>> {
    let renderer = match highlighted {
        Some(ids) => Renderer::new().with_highlighted(ids),
        None => Renderer::new(),
    };
    Walker::new(renderer, cancel, sink).run(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{from_display_fn, TransformChain};
    use crate::types::Record;

    fn doubling_builder(steps: usize) -> TreeBuilder {
        let chain: TransformChain = (0..steps)
            .map(|i| {
                from_display_fn(format!("step{}", i), |d| {
                    vec![format!("{}0", d), format!("{}1", d)]
                })
            })
            .collect();
        TreeBuilder::new(chain, Record::new("r"))
    }

    #[test]
    fn test_count_completes() {
        let (mut sink, rx) = progress_channel(4096);
        let outcome = count(&doubling_builder(4), &CancelToken::new(), &mut sink).unwrap();

        assert_eq!(outcome, Outcome::Completed(TreeCounts::new(15, 16)));
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 31 + 1);
        assert_eq!(
            events.last().unwrap(),
            &TraversalEvent::new(
                EventStatus::Completed,
                EventPayload::Counts(TreeCounts::new(15, 16))
            )
        );
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let (mut sink, rx) = progress_channel(16);

        let outcome = count(&doubling_builder(3), &cancel, &mut sink).unwrap();
        assert_eq!(outcome, Outcome::Cancelled(TreeCounts::default()));

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, EventStatus::Cancelled);
    }

    #[test]
    fn test_walker_state_after_completion() {
        let cancel = CancelToken::new();
        let mut sink = ProgressSink::disabled();
        let mut walker = Walker::new(Counter::new(), &cancel, &mut sink);
        assert_eq!(walker.state(), TraversalState::Idle);

        let outcome = walker.run(&doubling_builder(2)).unwrap();
        assert!(outcome.is_completed());
        assert_eq!(walker.state(), TraversalState::Completed);
    }

    #[test]
    fn test_walker_state_after_cancel() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut sink = ProgressSink::disabled();
        let mut walker = Walker::new(Counter::new(), &cancel, &mut sink);

        walker.run(&doubling_builder(2)).unwrap();
        assert_eq!(walker.state(), TraversalState::Cancelled);
    }

    #[test]
    fn test_walker_state_after_transform_error() {
        let chain = TransformChain::new(vec![crate::transform::from_fn("broken", |_| {
            Err(DeriveError::MissingField("gloss".to_string()))
        })]);
        let builder = TreeBuilder::new(chain, Record::new("r"));
        let cancel = CancelToken::new();
        let mut sink = ProgressSink::disabled();
        let mut walker = Walker::new(Counter::new(), &cancel, &mut sink);

        assert!(walker.run(&builder).is_err());
        assert_eq!(walker.state(), TraversalState::Failed);
    }

    #[test]
    fn test_walker_runs_once() {
        let cancel = CancelToken::new();
        let (mut sink, rx) = progress_channel(64);
        let mut walker = Walker::new(Counter::new(), &cancel, &mut sink);
        walker.run(&doubling_builder(1)).unwrap();

        let err = walker.run(&doubling_builder(1)).unwrap_err();
        assert!(matches!(err, DeriveError::Traversal(_)));
        assert_eq!(walker.state(), TraversalState::Completed);
        drop(walker);

        let terminal = rx.try_iter().filter(|e| e.status.is_terminal()).count();
        assert_eq!(terminal, 1);
    }

    #[test]
    fn test_outcome_helpers() {
        let outcome: Outcome<u32> = Outcome::Cancelled(3);
        assert!(outcome.is_cancelled());
        assert_eq!(outcome.clone().map(|v| v * 2), Outcome::Cancelled(6));
        assert_eq!(outcome.into_inner(), 3);
    }
}
