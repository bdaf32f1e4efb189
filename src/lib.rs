//! # derivtree-rs: Derivation Tree Engine
//!
//! Applies an ordered chain of transforms to a seed record and explores every
//! branch the chain can take. Each transform maps one record to zero or more
//! records, so the results form a tree: the root is the seed, each level is one
//! transform, and the leaves are the final outputs.
//!
//! ## Architecture
//!
//! - **Tree**: A lazy, restartable view over the chain ([`TreeBuilder`])
//! - **Traversal**: Cancellable depth-first walks that count, search or render
//!   the tree while streaming [`TraversalEvent`]s
//! - **Pipeline**: Leaf-only evaluation without tree bookkeeping
//! - **Batch**: Parallel verification of many source/target pairs
//! - **Scripting**: Rhai-based transforms loaded from script source
//! - **Communication**: Bounded crossbeam channels with back-pressure
//!
//! ## Example
//!
//! ```
//! use derivtree_rs::transform::{from_display_fn, TransformChain};
//! use derivtree_rs::traversal::{count, CancelToken, ProgressSink};
//! use derivtree_rs::{Record, TreeBuilder, TreeCounts};
//!
//! let chain = TransformChain::new(vec![
//!     from_display_fn("one", |d| vec![format!("{}1", d)]),
//!     from_display_fn("two", |d| vec![format!("{}2a", d), format!("{}2b", d)]),
//! ]);
//! let builder = TreeBuilder::new(chain, Record::new("a"));
//!
//! let counts = count(&builder, &CancelToken::new(), &mut ProgressSink::disabled())
//!     .unwrap()
//!     .into_inner();
//! assert_eq!(counts, TreeCounts::new(2, 2));
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod scripting;
pub mod transform;
pub mod traversal;
pub mod tree;
pub mod types;

// Re-export commonly used types
pub use batch::BatchVerifier;
pub use config::EngineConfig;
pub use error::{DeriveError, Result};
pub use pipeline::LeafPipeline;
pub use scripting::{ScriptEngine, ScriptTransform};
pub use transform::{Transform, TransformChain};
pub use traversal::{CancelToken, Outcome, ProgressSink, TraversalEvent};
pub use tree::{TreeBuilder, TreeNode};
pub use types::{FieldValue, NodeId, Record, TreeCounts};
