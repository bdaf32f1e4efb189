//! Parallel batch verification.
//!
//! Given many `(source, target)` pairs, [`BatchVerifier::find_mismatches`]
//! returns the sources whose transform outputs never reach their target. Each
//! pair is independent, so pairs are spread over a pool of worker threads
//! (see [`worker`]) while the calling thread acts as coordinator:
//!
//! ```text
//! pairs ──► [job queue] ──► worker 0 ─┐
//!                      ├──► worker 1 ─┼──► [results] ──► coordinator ──► ProgressSink
//!                      └──► worker N ─┘
//! ```
//!
//! Only the coordinator talks to the [`ProgressSink`], so the event stream has
//! a single producer and nothing is emitted after the terminal event even if
//! a worker finishes a pair late. The sink is bound to the caller's
//! [`CancelToken`], so a full progress channel never keeps the coordinator
//! from noticing cancellation. The order of the returned mismatches is not
//! significant.

mod worker;

use crate::config::VerifierConfig;
use crate::error::{DeriveError, Result};
use crate::pipeline::LeafPipeline;
use crate::transform::TransformChain;
use crate::traversal::{CancelToken, EventPayload, Outcome, ProgressSink};
use crate::types::Record;
use crossbeam_channel::{bounded, unbounded, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use worker::{spawn_workers, VerifyJob, WorkerContext, WorkerMessage};

/// How often the coordinator re-checks cancellation while workers are busy
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result slots per worker in the coordinator's channel
const RESULTS_PER_WORKER: usize = 4;

/// Number of worker threads matching the available hardware parallelism
pub fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Compares many records against their expected outcomes in parallel
#[derive(Debug, Clone)]
pub struct BatchVerifier {
    pipeline: LeafPipeline,
    compare_fields: Arc<[String]>,
    workers: usize,
    poll_interval: Duration,
}

impl BatchVerifier {
    pub fn new(transforms: TransformChain, compare_fields: Vec<String>) -> Self {
        Self {
            pipeline: LeafPipeline::new(transforms),
            compare_fields: compare_fields.into(),
            workers: default_worker_count(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn from_config(transforms: TransformChain, config: &VerifierConfig) -> Self {
        let verifier = Self::new(transforms, config.compare_fields.clone())
            .with_poll_interval(Duration::from_millis(config.poll_interval_ms));
        match config.workers {
            Some(workers) => verifier.with_workers(workers),
            None => verifier,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn compare_fields(&self) -> &[String] {
        &self.compare_fields
    }

    /// Check every pair and return the sources that failed.
    ///
    /// One `Progress` event is sent per processed pair and one `Partial`
    /// event per mismatch. On cancellation no new pair is started and the
    /// mismatches found so far are returned as [`Outcome::Cancelled`]. The first
    /// transform error aborts the batch and is returned.
    pub fn find_mismatches(
        &self,
        pairs: Vec<(Record, Record)>,
        cancel: &CancelToken,
        sink: &mut ProgressSink,
    ) -> Result<Outcome<Vec<Record>>> {
        let total = pairs.len();
        let mut mismatches = Vec::new();
        sink.watch(cancel, self.poll_interval);

        if cancel.is_cancelled() {
            sink.cancelled(EventPayload::Checked {
                processed: 0,
                total,
            });
            return Ok(Outcome::Cancelled(mismatches));
        }
        if total == 0 {
            sink.completed(EventPayload::Checked {
                processed: 0,
                total,
            });
            return Ok(Outcome::Completed(mismatches));
        }

        let workers = self.workers.min(total);
        tracing::debug!("Verifying {} pairs on {} workers", total, workers);

        let (job_tx, job_rx) = unbounded();
        for (source, target) in pairs {
            job_tx
                .send(VerifyJob { source, target })
                .map_err(|_| DeriveError::Worker("Job queue closed".to_string()))?;
        }
        drop(job_tx);

        let (result_tx, result_rx) = bounded(workers * RESULTS_PER_WORKER);
        let stop = CancelToken::new();
        let ctx = WorkerContext {
            pipeline: self.pipeline.clone(),
            compare_fields: self.compare_fields.clone(),
            jobs: job_rx,
            results: result_tx,
            cancel: cancel.clone(),
            stop: stop.clone(),
        };
        if let Err(e) = spawn_workers(workers, &ctx) {
            stop.cancel();
            return Err(e);
        }
        // Only the workers may hold senders, so a disconnect means they all exited
        drop(ctx);

        let mut processed = 0;
        while processed < total {
            if cancel.is_cancelled() {
                stop.cancel();
                tracing::debug!("Verification cancelled after {}/{} pairs", processed, total);
                sink.cancelled(EventPayload::Checked { processed, total });
                return Ok(Outcome::Cancelled(mismatches));
            }

            match result_rx.recv_timeout(self.poll_interval) {
                Ok(WorkerMessage::Checked { mismatch }) => {
                    processed += 1;
                    sink.progress(EventPayload::Checked { processed, total });
                    if let Some(source) = mismatch {
                        sink.partial(EventPayload::Mismatch(source.clone()));
                        mismatches.push(source);
                    }
                }
                Ok(WorkerMessage::Failed(e)) => {
                    stop.cancel();
                    return Err(e.with_context("Batch verification aborted"));
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    if cancel.is_cancelled() {
                        continue;
                    }
                    return Err(DeriveError::Worker(format!(
                        "Workers exited after {}/{} pairs",
                        processed, total
                    )));
                }
            }
        }

        tracing::debug!("Verification finished: {} mismatches", mismatches.len());
        sink.completed(EventPayload::Checked { processed, total });
        Ok(Outcome::Completed(mismatches))
    }
}
