//! Core data types for derivtree-rs
//!
//! This module contains the fundamental data structures that flow through the
//! tree engine, the leaf pipeline and the batch verifier.
//!
//! # Main Types
//!
//! - [`Record`] - Immutable field map carrying at least a `display` label
//! - [`FieldValue`] - Value stored in a record field (bool, integer or text)
//! - [`NodeId`] - Sequence number of a node within one traversal
//! - [`TreeCounts`] - Interior node and leaf totals of a traversal
//!
//! # Records
//!
//! Records are value types: equality, ordering and hashing all look at the
//! full field map, so two records built independently with the same fields
//! are interchangeable. This is what lets the tree builder detect no-op steps
//! and lets the leaf pipeline return a set.

use crate::error::{DeriveError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Field holding the human-readable label of a record
pub const DISPLAY_FIELD: &str = "display";

/// Optional field correlating records across two datasets
pub const LINK_FIELD: &str = "link";

/// A single value stored in a record field
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Boolean flag
    Bool(bool),
    /// Integer value (also used for numeric links)
    Int(i64),
    /// Text value (labels, symbolic link names)
    Text(String),
}

impl FieldValue {
    /// Returns the text if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is an integer value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// The unit of data flowing through the engine
///
/// Serializes as a plain map, e.g. `{"display": "babeba", "link": 3}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Create a record with only a `display` field
    pub fn new(display: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(DISPLAY_FIELD.to_string(), FieldValue::Text(display.into()));
        Self { fields }
    }

    /// Build a record from raw fields without checking for `display`
    pub fn from_fields(fields: BTreeMap<String, FieldValue>) -> Self {
        Self { fields }
    }

    /// Parse a record from a JSON object
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Return a copy with `name` set to `value`
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Return a copy with a different `display` label
    pub fn with_display(&self, display: impl Into<String>) -> Self {
        self.clone().with_field(DISPLAY_FIELD, display.into())
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The record's label.
    ///
    /// Records are assumed validated upstream; a missing or non-text `display`
    /// surfaces as an error instead of a default label.
    pub fn display(&self) -> Result<&str> {
        match self.fields.get(DISPLAY_FIELD) {
            Some(FieldValue::Text(s)) => Ok(s),
            Some(_) => Err(DeriveError::FieldType {
                field: DISPLAY_FIELD.to_string(),
                expected: "text",
            }),
            None => Err(DeriveError::MissingField(DISPLAY_FIELD.to_string())),
        }
    }

    /// The optional correlation key used when pairing datasets
    pub fn link(&self) -> Option<&FieldValue> {
        self.fields.get(LINK_FIELD)
    }

    /// Compare two records on a subset of fields.
    ///
    /// A field missing from both records counts as equal. When neither record
    /// has any of `fields`, the comparison is vacuously true.
    // FIXME: the vacuous case lets two unrelated records "match"; kept for
    // compatibility with existing datasets.
    pub fn matches_on<S: AsRef<str>>(&self, other: &Record, fields: &[S]) -> bool {
        fields.iter().all(|field| {
            let field = field.as_ref();
            self.fields.get(field) == other.fields.get(field)
        })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fields.get(DISPLAY_FIELD) {
            Some(value) => write!(f, "{}", value),
            None => write!(f, "<no display>"),
        }
    }
}

/// Sequence number of a node within one traversal of one tree.
///
/// Ids are assigned in generation (preorder) order starting at the root. They
/// are only stable across traversals when the transforms are deterministic.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub u64);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Interior node and leaf totals of a traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TreeCounts {
    /// Non-leaf nodes (nodes with a producing function)
    pub nodes: u64,
    /// Leaves (all transforms exhausted)
    pub leaves: u64,
}

impl TreeCounts {
    pub fn new(nodes: u64, leaves: u64) -> Self {
        Self { nodes, leaves }
    }

    /// Every visited node, interior and leaf
    pub fn total(&self) -> u64 {
        self.nodes + self.leaves
    }
}

impl fmt::Display for TreeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} nodes, {} leaves", self.nodes, self.leaves)
    }
}
