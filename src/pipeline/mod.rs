//! Leaf-only pipeline.
//!
//! When only the final outputs of a transform chain matter, the tree's ids,
//! labels and child bookkeeping are wasted work. [`LeafPipeline`] flattens the
//! chain instead:
//!
//! ```text
//! working = seed
//! for f in chain: working = flatten(map(f, working))
//! ```
//!
//! Inert steps are not special here. A transform returning `[x]` for `x`
//! simply passes `x` on to the next round.
//!
//! [`LeafPipeline::matches_target`] answers "can this source reach that
//! target?" depth-first and stops at the first final record that matches, so
//! the rest of the chain is only run for candidates that still matter.

use crate::error::Result;
use crate::transform::TransformChain;
use crate::types::Record;
use std::collections::HashSet;

/// Flattened view of a transform chain
#[derive(Debug, Clone, Default)]
pub struct LeafPipeline {
    transforms: TransformChain,
}

impl LeafPipeline {
    pub fn new(transforms: TransformChain) -> Self {
        Self { transforms }
    }

    pub fn transforms(&self) -> &TransformChain {
        &self.transforms
    }

    /// Every record the seed can reach after the whole chain
    pub fn final_values<I>(&self, seed: I) -> Result<HashSet<Record>>
    where
        I: IntoIterator<Item = Record>,
    {
        let mut working: HashSet<Record> = seed.into_iter().collect();
        for transform in self.transforms.iter() {
            let mut next = HashSet::with_capacity(working.len());
            for record in &working {
                next.extend(transform.apply_named(record)?);
            }
            tracing::trace!("{}: {} -> {} records", transform.name(), working.len(), next.len());
            working = next;
        }
        Ok(working)
    }

    /// True as soon as one final output of `source` equals `target` on
    /// `compare_fields`.
    ///
    /// Candidates are produced depth-first and tested one by one; the full
    /// final set is never computed. Field comparison follows
    /// [`Record::matches_on`], including its vacuous case.
    pub fn matches_target<S: AsRef<str>>(
        &self,
        source: &Record,
        target: &Record,
        compare_fields: &[S],
    ) -> Result<bool> {
        self.reaches(source, 0, target, compare_fields)
    }

    fn reaches<S: AsRef<str>>(
        &self,
        value: &Record,
        step: usize,
        target: &Record,
        compare_fields: &[S],
    ) -> Result<bool> {
        let Some(transform) = self.transforms.get(step) else {
            return Ok(value.matches_on(target, compare_fields));
        };
        for output in transform.apply_named(value)? {
            if self.reaches(&output, step + 1, target, compare_fields)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
