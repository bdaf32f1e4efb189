//! Verification worker threads.
//!
//! Each worker pulls `(source, target)` jobs from a shared queue, runs
//! [`LeafPipeline::matches_target`] and reports back to the coordinator over a
//! bounded channel. Workers are plain detached `std::thread`s: nobody joins
//! them, and a process exiting while they idle is not delayed by them.
//!
//! A worker stops taking jobs when the queue is drained, when the user's
//! [`CancelToken`] is set, when the coordinator raised its own stop flag, or
//! when the coordinator hung up.

use crate::error::{DeriveError, Result};
use crate::pipeline::LeafPipeline;
use crate::traversal::CancelToken;
use crate::types::Record;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::thread;

/// One source/target pair waiting to be checked
#[derive(Debug)]
pub(crate) struct VerifyJob {
    pub source: Record,
    pub target: Record,
}

/// Messages sent from a worker to the coordinator
#[derive(Debug)]
pub(crate) enum WorkerMessage {
    /// A pair was checked; `mismatch` holds the source if it failed
    Checked { mismatch: Option<Record> },
    /// A transform failed; the whole batch is aborted
    Failed(DeriveError),
}

/// Everything a worker needs, cloned once per thread
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub pipeline: LeafPipeline,
    pub compare_fields: Arc<[String]>,
    pub jobs: Receiver<VerifyJob>,
    pub results: Sender<WorkerMessage>,
    pub cancel: CancelToken,
    pub stop: CancelToken,
}

/// Spawn `count` detached workers
pub(crate) fn spawn_workers(count: usize, ctx: &WorkerContext) -> Result<()> {
    for index in 0..count {
        let ctx = ctx.clone();
        thread::Builder::new()
            .name(format!("derivtree-verify-{}", index))
            .spawn(move || run_worker(index, ctx))
            .map_err(|e| DeriveError::Worker(format!("Failed to spawn worker {}: {}", index, e)))?;
    }
    Ok(())
}

fn run_worker(index: usize, ctx: WorkerContext) {
    tracing::trace!("Verify worker {} started", index);

    for job in ctx.jobs.iter() {
        if ctx.cancel.is_cancelled() || ctx.stop.is_cancelled() {
            break;
        }

        let message = match ctx
            .pipeline
            .matches_target(&job.source, &job.target, &ctx.compare_fields[..])
        {
            Ok(true) => WorkerMessage::Checked { mismatch: None },
            Ok(false) => WorkerMessage::Checked {
                mismatch: Some(job.source),
            },
            Err(e) => {
                tracing::warn!("Verify worker {} failed on '{}': {}", index, job.source, e);
                WorkerMessage::Failed(e)
            }
        };

        let failed = matches!(message, WorkerMessage::Failed(_));
        if ctx.results.send(message).is_err() || failed {
            break;
        }
    }

    tracing::trace!("Verify worker {} stopped", index);
}
