//! Instrumented transforms for observing and steering traversals

use derivtree_rs::error::Result;
use derivtree_rs::transform::Transform;
use derivtree_rs::{CancelToken, Record};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Wraps a transform and counts how often it was applied
pub struct CountingTransform<T> {
    inner: T,
    calls: Arc<AtomicUsize>,
}

impl<T: Transform> CountingTransform<T> {
    pub fn new(inner: T) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl<T: Transform> Transform for CountingTransform<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn apply(&self, record: &Record) -> Result<Vec<Record>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.apply(record)
    }
}

/// Identity-with-suffix transform that cancels a token after `limit` calls
pub struct CancellingTransform {
    token: CancelToken,
    limit: usize,
    calls: AtomicUsize,
}

impl CancellingTransform {
    pub fn new(token: CancelToken, limit: usize) -> Self {
        Self {
            token,
            limit,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Transform for CancellingTransform {
    fn name(&self) -> &str {
        "cancelling"
    }

    fn apply(&self, record: &Record) -> Result<Vec<Record>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 >= self.limit {
            self.token.cancel();
        }
        let display = record.display()?;
        Ok(vec![
            record.with_display(format!("{}x", display)),
            record.with_display(format!("{}y", display)),
        ])
    }
}
