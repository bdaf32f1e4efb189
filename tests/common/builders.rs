//! Test data builders for transform chains and record pairs

use derivtree_rs::transform::{from_display_fn, TransformChain, TransformRef};
use derivtree_rs::Record;

/// Transform appending each suffix in turn, one output per suffix
pub fn suffixes(name: &str, suffixes: &[&str]) -> TransformRef {
    let suffixes: Vec<String> = suffixes.iter().map(|s| s.to_string()).collect();
    from_display_fn(name, move |d| {
        suffixes.iter().map(|s| format!("{}{}", d, s)).collect()
    })
}

/// Builder for chains of suffix transforms
#[derive(Default)]
pub struct ChainBuilder {
    steps: Vec<TransformRef>,
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step emitting one output per suffix
    pub fn branch(mut self, suffixes: &[&str]) -> Self {
        let name = format!("append{}", self.steps.len() + 1);
        self.steps.push(self::suffixes(&name, suffixes));
        self
    }

    /// Append a step returning its input unchanged
    pub fn inert(mut self) -> Self {
        let name = format!("inert{}", self.steps.len() + 1);
        self.steps
            .push(from_display_fn(name, |d| vec![d.to_string()]));
        self
    }

    /// Append an arbitrary transform
    pub fn step(mut self, transform: TransformRef) -> Self {
        self.steps.push(transform);
        self
    }

    pub fn build(self) -> TransformChain {
        TransformChain::new(self.steps)
    }
}

/// The `1` / `2a 2b` / `3a 3b 3c` chain: 4 interior nodes and 6 leaves from `a`
pub fn example_chain() -> TransformChain {
    ChainBuilder::new()
        .branch(&["1"])
        .branch(&["2a", "2b"])
        .branch(&["3a", "3b", "3c"])
        .build()
}

/// `(source, target)` pairs from `(display, display)` tuples
pub fn pairs(items: &[(&str, &str)]) -> Vec<(Record, Record)> {
    items
        .iter()
        .map(|(source, target)| (Record::new(*source), Record::new(*target)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_builder() {
        let chain = ChainBuilder::new().branch(&["x"]).inert().build();
        assert_eq!(chain.names(), vec!["append1", "inert2"]);
    }
}
