//! Integration tests for tree generation and traversal
//!
//! These tests validate the tree engine end to end:
//! - Branching product law and no-op collapsing
//! - Pattern search over leaves
//! - Rendering with highlighted matches
//! - Cancellation from another thread with back-pressure

mod common;

use common::builders::{example_chain, suffixes, ChainBuilder};
use common::mock_helpers::{CancellingTransform, CountingTransform};
use common::{assert_single_terminal, init_test_logging, test_timeout};
use derivtree_rs::transform::{
    from_display_fn, from_fn, FnTransform, TransformChain, TransformRef,
};
use derivtree_rs::traversal::{
    count, find_paths, progress_channel, render, EventPayload, EventStatus, PathFinder,
    ProgressSink,
};
use derivtree_rs::{CancelToken, Outcome, Record, TreeBuilder, TreeCounts};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

fn example_builder() -> TreeBuilder {
    TreeBuilder::new(example_chain(), Record::new("a"))
}

fn counts_of(builder: &TreeBuilder) -> TreeCounts {
    count(builder, &CancelToken::new(), &mut ProgressSink::disabled())
        .unwrap()
        .into_inner()
}

fn paths_for(pattern: &str) -> Vec<String> {
    find_paths(
        &example_builder(),
        PathFinder::from_pattern(pattern).unwrap(),
        &CancelToken::new(),
        &mut ProgressSink::disabled(),
    )
    .unwrap()
    .into_inner()
    .joined(" > ")
}

#[test]
fn test_branching_example_counts() {
    init_test_logging();
    assert_eq!(counts_of(&example_builder()), TreeCounts::new(4, 6));
}

#[test]
fn test_inert_steps_do_not_change_the_tree() {
    let collapsed = TreeBuilder::new(
        ChainBuilder::new()
            .inert()
            .branch(&["1"])
            .inert()
            .branch(&["2a", "2b"])
            .branch(&["3a", "3b", "3c"])
            .inert()
            .build(),
        Record::new("a"),
    );
    assert_eq!(counts_of(&collapsed), TreeCounts::new(4, 6));

    let (mut sink, rx) = progress_channel(64);
    render(&collapsed, None, &CancelToken::new(), &mut sink).unwrap();
    let functions: HashSet<String> = rx
        .try_iter()
        .filter_map(|e| match e.payload {
            EventPayload::Fragment(f) => f.producing_function,
            _ => None,
        })
        .collect();
    assert!(functions.iter().all(|f| f.starts_with("append")));
}

#[test]
fn test_reopening_gives_identical_trees() {
    let builder = example_builder();
    let lines = || {
        let (mut sink, rx) = progress_channel(64);
        render(&builder, None, &CancelToken::new(), &mut sink).unwrap();
        rx.try_iter()
            .filter_map(|e| match e.payload {
                EventPayload::Fragment(f) => Some((f.id, f.line())),
                _ => None,
            })
            .collect::<Vec<_>>()
    };
    let first = lines();
    assert_eq!(first.len(), 10);
    assert_eq!(first, lines());
}

#[test]
fn test_unanchored_pattern_matches_every_leaf() {
    assert_eq!(paths_for("a12").len(), 6);
}

#[test]
fn test_anchored_patterns() {
    assert!(paths_for("^a12$").is_empty());
    assert_eq!(paths_for("^a12a3a$"), vec!["a > a1 > a12a > a12a3a"]);
    assert_eq!(
        paths_for("3a$"),
        vec!["a > a1 > a12a > a12a3a", "a > a1 > a12b > a12b3a"]
    );
}

#[test]
fn test_search_then_render_highlights_matches() {
    let builder = example_builder();
    let matched = find_paths(
        &builder,
        PathFinder::from_pattern("3c$").unwrap(),
        &CancelToken::new(),
        &mut ProgressSink::disabled(),
    )
    .unwrap()
    .into_inner()
    .matched;

    let (mut sink, rx) = progress_channel(64);
    let counts = render(&builder, Some(matched), &CancelToken::new(), &mut sink)
        .unwrap()
        .into_inner();
    assert_eq!(counts, TreeCounts::new(4, 6));

    let highlighted: Vec<String> = rx
        .try_iter()
        .filter_map(|e| match e.payload {
            EventPayload::Fragment(f) if f.highlighted => Some(f.label),
            _ => None,
        })
        .collect();
    assert_eq!(highlighted, vec!["a12a3c", "a12b3c"]);
}

#[test]
fn test_vowel_length_explosion() {
    let chain = TransformChain::new(vec![from_display_fn("vowel_length", |d| {
        derivtree_rs::scripting::alternations(d, "ae", "āē")
    })]);
    let builder = TreeBuilder::new(chain, Record::new("babeba"));

    let result = find_paths(
        &builder,
        PathFinder::from_pattern("").unwrap(),
        &CancelToken::new(),
        &mut ProgressSink::disabled(),
    )
    .unwrap()
    .into_inner();

    let leaves: HashSet<String> = result.paths.iter().map(|p| p[1].clone()).collect();
    let expected: HashSet<String> = [
        "babeba", "babebā", "babēba", "babēbā", "bābeba", "bābebā", "bābēba", "bābēbā",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    assert_eq!(result.len(), 8);
    assert_eq!(leaves, expected);
}

#[test]
fn test_children_are_generated_lazily() {
    let (tail, calls) = CountingTransform::new(FnTransform::new("tail", |r: &Record| {
        Ok(vec![r.with_display(format!("{}!", r.display()?))])
    }));
    let chain = TransformChain::new(vec![
        suffixes("split", &["x", "y"]),
        Arc::new(tail) as TransformRef,
    ]);
    let builder = TreeBuilder::new(chain, Record::new("a"));

    let mut root = builder.open().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let mut children = root.take_children();
    children.next().unwrap().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cancel_from_inside_traversal() {
    let cancel = CancelToken::new();
    let chain: TransformChain = (0..10)
        .map(|_| Arc::new(CancellingTransform::new(cancel.clone(), 5)) as TransformRef)
        .collect();
    let builder = TreeBuilder::new(chain, Record::new("r"));

    let (mut sink, rx) = progress_channel(4096);
    let outcome = count(&builder, &cancel, &mut sink).unwrap();
    drop(sink);

    assert!(outcome.is_cancelled());
    assert!(outcome.into_inner().total() < 2047);

    let events: Vec<_> = rx.iter().collect();
    assert_single_terminal(&events);
    assert_eq!(events.last().unwrap().status, EventStatus::Cancelled);
}

#[test]
fn test_cancel_from_consumer_thread() {
    init_test_logging();
    let chain: TransformChain = (0..14)
        .map(|i| suffixes(&format!("bit{}", i), &["0", "1"]))
        .collect();
    let builder = TreeBuilder::new(chain, Record::new("r"));
    let cancel = CancelToken::new();

    // Small capacity so the walker blocks on the consumer
    let (mut sink, rx) = progress_channel(4);
    let walker_cancel = cancel.clone();
    let handle = thread::spawn(move || count(&builder, &walker_cancel, &mut sink));

    let mut events = Vec::new();
    while let Ok(event) = rx.recv_timeout(test_timeout()) {
        events.push(event);
        if events.len() == 10 {
            cancel.cancel();
        }
    }

    let outcome = handle.join().unwrap().unwrap();
    assert!(outcome.is_cancelled());
    assert_single_terminal(&events);
    assert_eq!(events.last().unwrap().status, EventStatus::Cancelled);
    // Only the few events buffered or in flight at cancel time may follow it
    assert!(events.len() < 10 + 4 + 3);
}

#[test]
fn test_cancel_while_consumer_stops_draining() {
    let chain: TransformChain = (0..12)
        .map(|i| suffixes(&format!("bit{}", i), &["0", "1"]))
        .collect();
    let builder = TreeBuilder::new(chain, Record::new("r"));
    let cancel = CancelToken::new();

    let (mut sink, rx) = progress_channel(2);
    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    let walker_cancel = cancel.clone();
    thread::spawn(move || {
        let outcome = count(&builder, &walker_cancel, &mut sink);
        let _ = done_tx.send(outcome.map(|o| (o.is_cancelled(), o.into_inner())));
    });

    rx.recv_timeout(test_timeout()).unwrap();
    cancel.cancel();

    // The receiver stays alive but is never read again
    let (cancelled, counts) = done_rx
        .recv_timeout(test_timeout())
        .expect("walker stayed blocked on a full channel after cancel")
        .unwrap();
    assert!(cancelled);
    assert!(counts.total() < 8191);
    assert!(rx.len() <= 2);
}

#[test]
fn test_transform_error_names_the_function() {
    let chain = ChainBuilder::new()
        .branch(&["1"])
        .step(from_fn("rule7", |_| {
            Err(derivtree_rs::DeriveError::Script("unknown segment".into()))
        }))
        .build();
    let builder = TreeBuilder::new(chain, Record::new("a"));

    let err = count(&builder, &CancelToken::new(), &mut ProgressSink::disabled()).unwrap_err();
    assert!(err.to_string().contains("rule7"));
}

#[test]
fn test_pre_cancelled_search_returns_empty() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let outcome = find_paths(
        &example_builder(),
        PathFinder::from_pattern("a").unwrap(),
        &cancel,
        &mut ProgressSink::disabled(),
    )
    .unwrap();
    assert!(matches!(outcome, Outcome::Cancelled(ref r) if r.is_empty()));
}

proptest! {
    #[test]
    fn test_branching_product_law(factors in prop::collection::vec(1usize..4, 0..5)) {
        let chain: TransformChain = factors
            .iter()
            .enumerate()
            .map(|(step, &b)| {
                let outs: Vec<String> = (0..b).map(|k| format!("{}", k)).collect();
                let outs: Vec<&str> = outs.iter().map(String::as_str).collect();
                suffixes(&format!("f{}", step), &outs)
            })
            .collect();
        let counts = counts_of(&TreeBuilder::new(chain, Record::new("r")));

        let leaves: u64 = factors.iter().map(|&b| b as u64).product();
        let mut interior = 0u64;
        let mut level = 1u64;
        for &b in &factors {
            interior += level;
            level *= b as u64;
        }

        prop_assert_eq!(counts, TreeCounts::new(interior, leaves));
    }
}
