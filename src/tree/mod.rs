//! Lazy branching-tree generation.
//!
//! Applying a [`TransformChain`] to a root record produces a tree whose size is
//! the product of every step's branching factor. That tree is never built in
//! memory. Instead a [`TreeBuilder`] hands out a fresh *view* each time
//! [`TreeBuilder::open`] is called, and each node of that view generates its
//! children only when they are pulled from [`TreeNode::take_children`].
//!
//! ```text
//! root "a"   --append1-->   "a1"  --append2-->  "a12a" --append3--> "a12a3a"
//!                                                              +--> "a12a3b"
//!                                                              +--> "a12a3c"
//!                                          +-->  "a12b" --append3--> ...
//! ```
//!
//! ## Generation rule
//!
//! At a value `x` with remaining steps `[f, ..rest]`:
//!
//! 1. `outputs = f(x)`
//! 2. if `outputs == [x]` the step is inert: continue with `rest` on `x`
//!    without creating a node or consuming an id
//! 3. otherwise a node is allocated with `f` as its producing function and one
//!    lazy child per output against `rest`
//! 4. with no steps left, `x` is a leaf
//!
//! ## Memory
//!
//! A node only holds the outputs of its own step. A depth-first walk therefore
//! keeps `depth × branching` records alive, independent of the leaf count.
//! Nothing outside the walk's own stack refers to the root.

use crate::error::Result;
use crate::transform::TransformChain;
use crate::types::{NodeId, Record};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::vec;

/// Factory for lazy tree views over `(transforms, root)`
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    transforms: TransformChain,
    root: Record,
}

impl TreeBuilder {
    /// Create a builder. Computes nothing until a view is opened.
    pub fn new(transforms: TransformChain, root: Record) -> Self {
        Self { transforms, root }
    }

    pub fn transforms(&self) -> &TransformChain {
        &self.transforms
    }

    pub fn root(&self) -> &Record {
        &self.root
    }

    /// Open a fresh view of the tree and return its root node.
    ///
    /// Every call restarts id allocation at [`NodeId::ROOT`] and recomputes the
    /// tree from scratch; nothing is cached between views.
    pub fn open(&self) -> Result<TreeNode> {
        let generator = Generator {
            transforms: self.transforms.clone(),
            next_id: Rc::new(Cell::new(0)),
        };
        generator.generate(self.root.clone(), 0)
    }
}

/// Per-view generation state: the transform chain and the id counter.
///
/// The counter is shared between all nodes of one view only, so unrelated
/// views never interfere.
#[derive(Clone)]
struct Generator {
    transforms: TransformChain,
    next_id: Rc<Cell<u64>>,
}

impl Generator {
    fn allocate(&self) -> NodeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        NodeId(id)
    }

    fn generate(&self, value: Record, mut step: usize) -> Result<TreeNode> {
        loop {
            let Some(transform) = self.transforms.get(step) else {
                let label = value.display()?.to_string();
                return Ok(TreeNode {
                    id: self.allocate(),
                    label,
                    value,
                    producing_function: None,
                    children: Children::empty(),
                });
            };

            let outputs = transform.apply_named(&value)?;

            if outputs.len() == 1 && outputs[0] == value {
                step += 1;
                continue;
            }

            let label = value.display()?.to_string();
            return Ok(TreeNode {
                id: self.allocate(),
                label,
                value,
                producing_function: Some(transform.name().to_string()),
                children: Children {
                    generator: Some(self.clone()),
                    outputs: outputs.into_iter(),
                    step: step + 1,
                },
            });
        }
    }
}

/// One node of a lazy tree view
pub struct TreeNode {
    id: NodeId,
    label: String,
    value: Record,
    producing_function: Option<String>,
    children: Children,
}

impl TreeNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The `display` field of the node's record
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn value(&self) -> &Record {
        &self.value
    }

    /// Name of the transform that produced this node's children; `None` at leaves
    pub fn producing_function(&self) -> Option<&str> {
        self.producing_function.as_deref()
    }

    /// True once every transform has been applied on this branch
    pub fn is_leaf(&self) -> bool {
        self.producing_function.is_none()
    }

    /// Number of children not yet taken
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Take the lazy children iterator, leaving this node without children.
    ///
    /// Each child is generated when pulled, so a caller walking depth-first
    /// only ever holds one branch at a time.
    pub fn take_children(&mut self) -> Children {
        std::mem::replace(&mut self.children, Children::empty())
    }
}

impl fmt::Debug for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeNode")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("producing_function", &self.producing_function)
            .field("pending_children", &self.children.len())
            .finish()
    }
}

/// Lazily generated children of a [`TreeNode`]
pub struct Children {
    generator: Option<Generator>,
    outputs: vec::IntoIter<Record>,
    step: usize,
}

impl Children {
    fn empty() -> Self {
        Self {
            generator: None,
            outputs: Vec::new().into_iter(),
            step: 0,
        }
    }
}

impl Iterator for Children {
    type Item = Result<TreeNode>;

    fn next(&mut self) -> Option<Self::Item> {
        let generator = self.generator.as_ref()?;
        let output = self.outputs.next()?;
        Some(generator.generate(output, self.step))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.outputs.size_hint()
    }
}

impl ExactSizeIterator for Children {}
