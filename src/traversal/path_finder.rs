//! Pattern search over node labels.
//!
//! The finder keeps the labels from the root to the current node. When the
//! current node's label matches, that path is streamed as a `Partial` event
//! and recorded, and the node id is added to the matched set so a later render
//! can highlight it.
//!
//! With [`SearchMode::AllNodes`] interior labels are tested too. If a marker is
//! set, an interior match is listed as its path plus the marker, standing in
//! for everything below it: deeper matches on that branch are still added to
//! the matched set but not listed again. The walk itself never stops early.

use crate::config::SearchConfig;
use crate::error::Result;
use crate::traversal::{EventPayload, Position, ProgressSink, Visitor};
use crate::tree::TreeNode;
use crate::types::NodeId;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Opaque label matcher
pub trait LabelMatcher {
    fn is_match(&self, label: &str) -> bool;
}

impl LabelMatcher for Regex {
    fn is_match(&self, label: &str) -> bool {
        Regex::is_match(self, label)
    }
}

/// Which nodes are tested against the pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Only final results
    #[default]
    Leaves,
    /// Interior nodes and leaves
    AllNodes,
}

/// Paths and node ids found by a search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    /// Root-to-node label paths, in walk order
    pub paths: Vec<Vec<String>>,
    /// Every node whose label matched
    pub matched: HashSet<NodeId>,
}

impl SearchResult {
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths joined into single strings, e.g. `"a > a1 > a12a"`
    pub fn joined(&self, separator: &str) -> Vec<String> {
        self.paths.iter().map(|p| p.join(separator)).collect()
    }
}

/// Visitor collecting root-to-node paths of matching labels
pub struct PathFinder<M> {
    matcher: M,
    mode: SearchMode,
    marker: Option<String>,
    path: Vec<String>,
    /// Depth of the interior match currently standing in for its subtree
    listed_at: Option<usize>,
    result: SearchResult,
}

impl<M: LabelMatcher> PathFinder<M> {
    pub fn new(matcher: M) -> Self {
        Self {
            matcher,
            mode: SearchMode::default(),
            marker: None,
            path: Vec::new(),
            listed_at: None,
            result: SearchResult::default(),
        }
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Marker appended to interior matches (only used with `AllNodes`)
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }
}

impl PathFinder<Regex> {
    /// Finder for an unanchored regular expression
    pub fn from_pattern(pattern: &str) -> Result<Self> {
        Ok(Self::new(Regex::new(pattern)?))
    }

    /// Finder for `pattern` using the configured mode and marker
    pub fn from_config(pattern: &str, config: &SearchConfig) -> Result<Self> {
        let finder = Self::from_pattern(pattern)?.with_mode(config.mode);
        Ok(match &config.interior_marker {
            Some(marker) => finder.with_marker(marker.clone()),
            None => finder,
        })
    }
}

impl<M: LabelMatcher> Visitor for PathFinder<M> {
    type Output = SearchResult;

    fn enter(
        &mut self,
        node: &TreeNode,
        position: &Position<'_>,
        sink: &mut ProgressSink,
    ) -> Result<()> {
        let depth = position.depth;
        self.path.truncate(depth);
        self.path.push(node.label().to_string());

        if self.listed_at.is_some_and(|d| depth <= d) {
            self.listed_at = None;
        }

        let testable = node.is_leaf() || self.mode == SearchMode::AllNodes;
        if !testable || !self.matcher.is_match(node.label()) {
            return Ok(());
        }

        self.result.matched.insert(node.id());
        if self.listed_at.is_some() {
            return Ok(());
        }

        let mut listed = self.path.clone();
        if !node.is_leaf() {
            if let Some(marker) = &self.marker {
                listed.push(marker.clone());
                self.listed_at = Some(depth);
            }
        }
        tracing::trace!("Path match at {}: {}", node.id(), listed.join(" > "));
        sink.partial(EventPayload::Path(listed.clone()));
        self.result.paths.push(listed);
        Ok(())
    }

    fn finish(self) -> SearchResult {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{from_display_fn, TransformChain};
    use crate::traversal::{find_paths, progress_channel, CancelToken, EventStatus};
    use crate::tree::TreeBuilder;
    use crate::types::Record;

    fn builder() -> TreeBuilder {
        let chain = TransformChain::new(vec![
            from_display_fn("one", |d| vec![format!("{}1", d)]),
            from_display_fn("two", |d| vec![format!("{}2a", d), format!("{}2b", d)]),
        ]);
        TreeBuilder::new(chain, Record::new("a"))
    }

    fn search(finder: PathFinder<Regex>) -> SearchResult {
        let mut sink = crate::traversal::ProgressSink::disabled();
        find_paths(&builder(), finder, &CancelToken::new(), &mut sink)
            .unwrap()
            .into_inner()
    }

    #[test]
    fn test_leaf_paths() {
        let result = search(PathFinder::from_pattern("2b$").unwrap());
        assert_eq!(result.joined(" > "), vec!["a > a1 > a12b"]);
        assert_eq!(result.matched, HashSet::from([NodeId(3)]));
    }

    #[test]
    fn test_leaves_mode_ignores_interior() {
        let result = search(PathFinder::from_pattern("^a1$").unwrap());
        assert!(result.is_empty());
    }

    #[test]
    fn test_all_nodes_without_marker_lists_every_match() {
        let finder = PathFinder::from_pattern("^a1")
            .unwrap()
            .with_mode(SearchMode::AllNodes);
        let result = search(finder);
        assert_eq!(result.len(), 3);
        assert_eq!(result.matched.len(), 3);
    }

    #[test]
    fn test_marker_stands_in_for_subtree() {
        let finder = PathFinder::from_pattern("^a1")
            .unwrap()
            .with_mode(SearchMode::AllNodes)
            .with_marker("...");
        let result = search(finder);

        assert_eq!(result.joined(" > "), vec!["a > a1 > ..."]);
        assert_eq!(
            result.matched,
            HashSet::from([NodeId(1), NodeId(2), NodeId(3)])
        );
    }

    #[test]
    fn test_paths_are_streamed() {
        let (mut sink, rx) = progress_channel(64);
        let finder = PathFinder::from_pattern("a12").unwrap();
        find_paths(&builder(), finder, &CancelToken::new(), &mut sink).unwrap();

        let streamed: Vec<_> = rx
            .try_iter()
            .filter(|e| e.status == EventStatus::Partial)
            .map(|e| e.payload)
            .collect();
        assert_eq!(
            streamed,
            vec![
                EventPayload::Path(vec!["a".into(), "a1".into(), "a12a".into()]),
                EventPayload::Path(vec!["a".into(), "a1".into(), "a12b".into()]),
            ]
        );
    }

    #[test]
    fn test_from_config() {
        let config = SearchConfig {
            mode: SearchMode::AllNodes,
            interior_marker: Some("…".to_string()),
        };
        let result = search(PathFinder::from_config("^a1$", &config).unwrap());
        assert_eq!(result.joined(" > "), vec!["a > a1 > …"]);
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(PathFinder::from_pattern("(").is_err());
    }
}
