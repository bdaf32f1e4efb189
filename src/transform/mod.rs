//! Transform boundary
//!
//! A transform maps one [`Record`] to zero, one or several records. The engine
//! never looks inside a transform: it only calls [`Transform::apply`] and uses
//! [`Transform::name`] to label the tree level the transform produced.
//!
//! Transforms are expected to be pure and deterministic. Violating that only
//! affects reproducibility of node ids and tree shapes, never memory safety.
//! Errors returned by `apply` are not caught anywhere in the engine; they abort
//! the operation that triggered them.

use crate::error::{Result, ResultExt};
use crate::types::Record;
use std::fmt;
use std::sync::Arc;

/// A user-supplied mapping from one record to any number of records
pub trait Transform: Send + Sync {
    /// Name shown as the producing function of a tree level
    fn name(&self) -> &str;

    /// Apply the transform to one record
    fn apply(&self, record: &Record) -> Result<Vec<Record>>;

    /// [`apply`](Transform::apply), with the transform's name attached to any
    /// error. The original error stays reachable as the source.
    fn apply_named(&self, record: &Record) -> Result<Vec<Record>> {
        self.apply(record)
            .with_context(|| format!("Transform '{}'", self.name()))
    }
}

/// Shared handle to a transform
pub type TransformRef = Arc<dyn Transform>;

/// Immutable, ordered list of transforms.
///
/// Cloning is cheap (one `Arc` bump), so the same chain can be handed to every
/// traversal and every batch worker.
#[derive(Clone)]
pub struct TransformChain {
    steps: Arc<[TransformRef]>,
}

impl TransformChain {
    pub fn new(steps: Vec<TransformRef>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    /// A chain with no steps; every record is its own single leaf
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    #[inline]
    pub fn get(&self, step: usize) -> Option<&TransformRef> {
        self.steps.get(step)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransformRef> {
        self.steps.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|t| t.name()).collect()
    }
}

impl Default for TransformChain {
    fn default() -> Self {
        Self::empty()
    }
}

impl FromIterator<TransformRef> for TransformChain {
    fn from_iter<I: IntoIterator<Item = TransformRef>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformChain")
            .field("steps", &self.names())
            .finish()
    }
}

/// Transform backed by a Rust closure
pub struct FnTransform<F> {
    name: String,
    f: F,
}

impl<F> FnTransform<F>
where
    F: Fn(&Record) -> Result<Vec<Record>> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Transform for FnTransform<F>
where
    F: Fn(&Record) -> Result<Vec<Record>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, record: &Record) -> Result<Vec<Record>> {
        (self.f)(record)
    }
}

/// Wrap a closure as a shared transform
pub fn from_fn<F>(name: impl Into<String>, f: F) -> TransformRef
where
    F: Fn(&Record) -> Result<Vec<Record>> + Send + Sync + 'static,
{
    Arc::new(FnTransform::new(name, f))
}

/// Wrap a label-rewriting closure as a shared transform.
///
/// Each output string becomes a copy of the input record with only its
/// `display` replaced; every other field is carried over unchanged.
pub fn from_display_fn<F>(name: impl Into<String>, f: F) -> TransformRef
where
    F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
{
    from_fn(name, move |record: &Record| {
        let display = record.display()?;
        Ok(f(display)
            .into_iter()
            .map(|d| record.with_display(d))
            .collect())
    })
}
