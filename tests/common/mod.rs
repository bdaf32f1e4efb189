//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use derivtree_rs::traversal::TraversalEvent;
use derivtree_rs::Record;
use std::collections::HashSet;
use std::time::Duration;

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_millis(2000)
}

/// Route engine logs to the test output; ignores an already installed subscriber
pub fn init_test_logging() {
    let _ = derivtree_rs::logging::init_tracing("warn,derivtree_rs=debug");
}

/// Displays of a set of records, for readable assertions
pub fn display_set<'a>(records: impl IntoIterator<Item = &'a Record>) -> HashSet<String> {
    records
        .into_iter()
        .map(|r| r.display().unwrap().to_string())
        .collect()
}

/// Assert no event follows the first terminal one
pub fn assert_single_terminal(events: &[TraversalEvent]) {
    let terminal = events
        .iter()
        .position(|e| e.status.is_terminal())
        .expect("No terminal event");
    assert_eq!(
        terminal,
        events.len() - 1,
        "Events were sent after the terminal event: {:?}",
        &events[terminal..]
    );
}
