//! Configuration module for derivtree-rs
//!
//! This module holds the tunables of the engine. None of them change what a
//! traversal or a batch computes; they only shape how results are delivered
//! and how many resources are used.
//!
//! # Sections
//!
//! - `traversal` - progress channel capacity and throttling
//! - `search` - default search mode and interior-match marker
//! - `verifier` - worker count, compared fields, cancellation poll interval
//! - `scripting` - limits applied to the Rhai engine
//!
//! # Example
//!
//! ```toml
//! [traversal]
//! progress_capacity = 256
//! progress_every = 100
//!
//! [search]
//! mode = "all_nodes"
//! interior_marker = "..."
//!
//! [verifier]
//! workers = 4
//! compare_fields = ["display", "gloss"]
//! ```

use crate::error::{DeriveError, Result};
use crate::traversal::{progress_channel, ProgressSink, SearchMode, TraversalEvent};
use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of buffered progress events
pub const DEFAULT_PROGRESS_CAPACITY: usize = crate::traversal::DEFAULT_PROGRESS_CAPACITY;

/// Default cancellation poll interval of the batch coordinator
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub traversal: TraversalConfig,
    pub search: SearchConfig,
    pub verifier: VerifierConfig,
    pub scripting: ScriptLimits,
}

impl EngineConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| DeriveError::Config(format!("Invalid config: {}", e)))
    }

    /// Serialize the configuration to TOML text
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DeriveError::Serialization(format!("Failed to serialize config: {}", e)))
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DeriveError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Load a configuration file, falling back to defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Using default engine config: {}", e);
            Self::default()
        })
    }

    /// Save the configuration as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}

/// Progress delivery settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    /// Capacity of the bounded progress channel; producers block when full
    pub progress_capacity: usize,
    /// Forward only every n-th progress event
    pub progress_every: u64,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            progress_capacity: DEFAULT_PROGRESS_CAPACITY,
            progress_every: 1,
        }
    }
}

impl TraversalConfig {
    /// Create a progress channel with these settings
    pub fn channel(&self) -> (ProgressSink, Receiver<TraversalEvent>) {
        let (sink, rx) = progress_channel(self.progress_capacity);
        (sink.throttled(self.progress_every), rx)
    }
}

/// Path search defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub mode: SearchMode,
    /// Appended to interior matches in place of their subtree
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interior_marker: Option<String>,
}

/// Batch verifier settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Worker threads; `None` uses the available hardware parallelism
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Fields compared between a produced record and its target
    pub compare_fields: Vec<String>,
    pub poll_interval_ms: u64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            workers: None,
            compare_fields: vec![crate::types::DISPLAY_FIELD.to_string()],
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// Limits applied to every Rhai engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptLimits {
    pub max_expr_depth: usize,
    pub max_call_levels: usize,
    pub max_operations: u64,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_expr_depth: 64,
            max_call_levels: 32,
            max_operations: 100_000,
            max_string_size: 10_000,
            max_array_size: 10_000,
            max_map_size: 1_000,
        }
    }
}
