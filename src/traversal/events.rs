//! Progress and partial-result events.
//!
//! Every long-running operation (tree traversals and the batch verifier)
//! reports through a [`ProgressSink`]. The consumer side is a crossbeam
//! [`Receiver`] that a front end drains at its own pace.
//!
//! # Back-pressure policy
//!
//! [`progress_channel`] creates a *bounded* channel. When it is full the
//! producing operation blocks until the consumer catches up; no event is
//! dropped while the operation is live. A consumer that cannot keep up with
//! one event per node should ask for a [`ProgressSink::throttled`] sink, which
//! only forwards every n-th progress event. Partial results and the terminal
//! event are never throttled.
//!
//! A blocked send still honours cancellation. Operations attach their
//! [`CancelToken`] with [`ProgressSink::watch`]; the sink then waits in slices
//! of the poll interval and re-checks the token between slices. Once the token
//! is set, a send gets at most one more slice before its event is dropped, so
//! a consumer that cancels and stops draining never deadlocks the producer.
//! The terminal `Cancelled` event is delivered on the same best-effort terms.
//!
//! Dropping the receiver is allowed: the sink notices the disconnect and
//! turns itself off, so the operation keeps running without a listener.

use crate::traversal::renderer::RenderFragment;
use crate::traversal::CancelToken;
use crate::types::{Record, TreeCounts};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use std::time::Duration;

/// Default capacity of a progress channel
pub const DEFAULT_PROGRESS_CAPACITY: usize = 1024;

/// How long a blocked send waits before re-checking cancellation
pub const DEFAULT_SEND_POLL: Duration = Duration::from_millis(50);

/// Status attached to every event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    /// One unit of work (node or pair) was processed
    Progress,
    /// A piece of output is ready (rendered line, matched path, mismatch)
    Partial,
    /// The operation finished normally; always the last event
    Completed,
    /// The operation observed cancellation; always the last event
    Cancelled,
}

impl EventStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, EventStatus::Completed | EventStatus::Cancelled)
    }
}

/// Payload attached to an event, depending on the operation
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    None,
    /// Running or final node/leaf totals
    Counts(TreeCounts),
    /// One rendered tree line
    Fragment(RenderFragment),
    /// Labels from the root to a matched node
    Path(Vec<String>),
    /// Batch progress
    Checked { processed: usize, total: usize },
    /// A source record whose outputs never reached its target
    Mismatch(Record),
}

/// A single event emitted by a running operation
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalEvent {
    pub status: EventStatus,
    pub payload: EventPayload,
}

impl TraversalEvent {
    pub fn new(status: EventStatus, payload: EventPayload) -> Self {
        Self { status, payload }
    }
}

/// Create a bounded progress channel: `(sink_for_operation, receiver_for_ui)`
pub fn progress_channel(capacity: usize) -> (ProgressSink, Receiver<TraversalEvent>) {
    let (tx, rx) = bounded(capacity.max(1));
    (ProgressSink::new(tx), rx)
}

/// Producer side of the event stream
#[derive(Debug)]
pub struct ProgressSink {
    tx: Option<Sender<TraversalEvent>>,
    cancel: Option<CancelToken>,
    poll: Duration,
    every: u64,
    seen: u64,
    finished: bool,
}

impl ProgressSink {
    pub fn new(tx: Sender<TraversalEvent>) -> Self {
        Self {
            tx: Some(tx),
            cancel: None,
            poll: DEFAULT_SEND_POLL,
            every: 1,
            seen: 0,
            finished: false,
        }
    }

    /// A sink that discards everything
    pub fn disabled() -> Self {
        Self {
            tx: None,
            cancel: None,
            poll: DEFAULT_SEND_POLL,
            every: 1,
            seen: 0,
            finished: false,
        }
    }

    /// Only forward every `every`-th progress event
    pub fn throttled(mut self, every: u64) -> Self {
        self.every = every.max(1);
        self
    }

    /// Stop blocking on a full channel once `cancel` is set, re-checking it
    /// every `poll`
    pub fn watch(&mut self, cancel: &CancelToken, poll: Duration) {
        self.cancel = Some(cancel.clone());
        self.poll = poll.max(Duration::from_millis(1));
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Report one processed unit of work
    pub fn progress(&mut self, payload: EventPayload) {
        self.seen += 1;
        if self.seen % self.every == 0 {
            self.send(EventStatus::Progress, payload);
        }
    }

    /// Report a piece of output
    pub fn partial(&mut self, payload: EventPayload) {
        self.send(EventStatus::Partial, payload);
    }

    /// Report normal completion. Nothing is sent afterwards.
    pub fn completed(&mut self, payload: EventPayload) {
        self.send(EventStatus::Completed, payload);
        self.finished = true;
    }

    /// Report cancellation. Nothing is sent afterwards.
    pub fn cancelled(&mut self, payload: EventPayload) {
        self.send(EventStatus::Cancelled, payload);
        self.finished = true;
    }

    fn send(&mut self, status: EventStatus, payload: EventPayload) {
        if self.finished {
            tracing::trace!("Dropping {:?} event after terminal event", status);
            return;
        }
        let Some(tx) = &self.tx else {
            return;
        };
        let mut event = TraversalEvent::new(status, payload);

        let Some(cancel) = &self.cancel else {
            if tx.send(event).is_err() {
                tracing::debug!("Progress receiver dropped, disabling sink");
                self.tx = None;
            }
            return;
        };

        loop {
            let cancelled = cancel.is_cancelled();
            match tx.send_timeout(event, self.poll) {
                Ok(()) => return,
                Err(SendTimeoutError::Timeout(_)) if cancelled => {
                    tracing::debug!(
                        "Channel full after cancellation, dropping {:?} event",
                        status
                    );
                    return;
                }
                Err(SendTimeoutError::Timeout(returned)) => event = returned,
                Err(SendTimeoutError::Disconnected(_)) => {
                    tracing::debug!("Progress receiver dropped, disabling sink");
                    self.tx = None;
                    return;
                }
            }
        }
    }
}
