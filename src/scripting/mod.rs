//! Rhai Scripting Engine for record transforms
//!
//! This module lets users define transforms as Rhai scripts instead of Rust
//! closures. A compiled script becomes a [`ScriptTransform`], which plugs into
//! a [`crate::transform::TransformChain`] like any other transform.
//!
//! ## Script Interface
//!
//! The script receives:
//! - `record` - The input record as a map (`record.display`, `record.link`, ...)
//! - `display` - Shortcut for `record.display`
//!
//! If the script defines `fn transform(record)`, that function is called.
//! Otherwise the whole script is evaluated as an expression.
//!
//! The result is interpreted as:
//! - a string - one output, the input record with a new `display`
//! - a map - one output record
//! - an array of strings and/or maps - one output per element
//! - `()` - no output
//!
//! ## Helper Functions
//!
//! - `alternations(text, from, to)` - Every variant of `text` where each
//!   character of `from` may be replaced by the character at the same index in
//!   `to`. The unchanged text comes first.
//! - `with_display(record, text)` - Copy of `record` with a new `display`
//!
//! ## Example Scripts
//!
//! Appending a suffix:
//! ```rhai
//! display + "1"
//! ```
//!
//! Branching on vowel length:
//! ```rhai
//! alternations(display, "ae", "āē")
//! ```
//!
//! Keeping extra fields while rewriting the label:
//! ```rhai
//! fn transform(record) {
//!     let d = record.display;
//!     d.replace("k", "tʃ");
//!     let out = with_display(record, d);
//!     out.changed = true;
//!     out
//! }
//! ```

mod engine;

pub use engine::{ScriptEngine, ScriptTransform};

use crate::error::{DeriveError, Result};
use rhai::{Engine, AST};
use std::collections::HashMap;

/// Name of the optional entry-point function in a transform script
pub const TRANSFORM_FN: &str = "transform";

/// A compiled transform script
#[derive(Clone)]
pub struct CompiledTransform {
    /// The compiled AST
    ast: AST,
    /// The original source code
    source: String,
    /// Name shown as the producing function in trees
    name: String,
    /// Whether the script defines `fn transform(record)`
    has_entry_point: bool,
}

impl CompiledTransform {
    fn new(name: &str, source: &str, ast: AST) -> Self {
        let has_entry_point = ast
            .iter_functions()
            .any(|f| f.name == TRANSFORM_FN && f.params.len() == 1);
        Self {
            ast,
            source: source.to_string(),
            name: name.to_string(),
            has_entry_point,
        }
    }

    /// Get the source code of this transform
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Get the name of this transform
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_entry_point(&self) -> bool {
        self.has_entry_point
    }

    pub(crate) fn ast(&self) -> &AST {
        &self.ast
    }
}

impl std::fmt::Debug for CompiledTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledTransform")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("has_entry_point", &self.has_entry_point)
            .finish()
    }
}

/// Cache for compiled scripts to avoid recompilation
#[derive(Default)]
pub struct ScriptCache {
    /// Map from script source to compiled AST
    cache: HashMap<String, AST>,
}

impl ScriptCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Get a cached script or compile and cache it
    pub fn get_or_compile(
        &mut self,
        engine: &Engine,
        name: &str,
        source: &str,
    ) -> Result<CompiledTransform> {
        if let Some(ast) = self.cache.get(source) {
            return Ok(CompiledTransform::new(name, source, ast.clone()));
        }

        let ast = engine.compile(source).map_err(|e| {
            DeriveError::from_rhai_error(e.into())
                .with_context(format!("Compilation error in '{}'", name))
        })?;

        self.cache.insert(source.to_string(), ast.clone());
        Ok(CompiledTransform::new(name, source, ast))
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Clear the cache
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Remove a specific script from the cache
    pub fn invalidate(&mut self, source: &str) {
        self.cache.remove(source);
    }
}

/// Every variant of `text` where characters of `from` may be swapped for the
/// same-index character of `to`.
///
/// Variants are ordered with the unchanged text first and the leftmost
/// position varying slowest, so `k` swappable characters give `2^k` results.
pub fn alternations(text: &str, from: &str, to: &str) -> Vec<String> {
    let swaps: Vec<(char, char)> = from.chars().zip(to.chars()).collect();
    let mut variants = vec![String::with_capacity(text.len())];

    for c in text.chars() {
        match swaps.iter().find(|(original, _)| *original == c) {
            Some(&(_, replacement)) => {
                variants = variants
                    .into_iter()
                    .flat_map(|prefix| {
                        let mut swapped = prefix.clone();
                        swapped.push(replacement);
                        let mut kept = prefix;
                        kept.push(c);
                        [kept, swapped]
                    })
                    .collect();
            }
            None => variants.iter_mut().for_each(|v| v.push(c)),
        }
    }
    variants
}

/// Built-in transform scripts for common sound-change steps
pub mod builtins {
    /// Identity transform - every record passes through unchanged
    pub const IDENTITY: &str = r#"
display
"#;

    /// Short/long vowel ambiguity for a and e
    pub const VOWEL_LENGTH: &str = r#"
// Each a/e may have been long or short
alternations(display, "ae", "āē")
"#;

    /// Final vowel loss, keeping the unreduced form as an alternative
    pub const FINAL_VOWEL_LOSS: &str = r#"
fn transform(record) {
    let d = record.display;
    let last = d.len() - 1;
    if last > 0 && "aeiouāē".contains(d[last]) {
        [d, d.sub_string(0, last)]
    } else {
        d
    }
}
"#;

    /// Palatalization of k before front vowels
    pub const PALATALIZE: &str = r#"
let out = display;
out.replace("ke", "tʃe");
out.replace("ki", "tʃi");
out
"#;

    /// Drops records flagged as loans
    pub const DROP_LOANS: &str = r#"
fn transform(record) {
    if "loan" in record && record.loan { () } else { record }
}
"#;

    /// List of all built-in transforms with names
    pub fn all() -> Vec<(&'static str, &'static str)> {
        vec![
            ("identity", IDENTITY),
            ("vowel_length", VOWEL_LENGTH),
            ("final_vowel_loss", FINAL_VOWEL_LOSS),
            ("palatalize", PALATALIZE),
            ("drop_loans", DROP_LOANS),
        ]
    }
}
