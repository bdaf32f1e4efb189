//! Rhai Script Engine Implementation
//!
//! This module provides the scripting engine behind script-defined transforms.
//!
//! Records cross the boundary as Rhai object maps. Field values map onto Rhai
//! types directly: text becomes a string, integers stay `i64` and booleans stay
//! `bool`. Any other value coming back from a script (floats, nested maps,
//! arrays inside fields) is rejected with a script error.

use crate::config::ScriptLimits;
use crate::error::{DeriveError, Result, ResultExt};
use crate::scripting::{alternations, CompiledTransform, ScriptCache};
use crate::transform::{Transform, TransformRef};
use crate::types::{FieldValue, Record, DISPLAY_FIELD};
use rhai::{Array, Dynamic, Engine, ImmutableString, Map, Scope};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// The main script engine for executing record transforms
pub struct ScriptEngine {
    /// The Rhai engine instance
    engine: Engine,
    /// Cache of compiled scripts, keyed by source
    cache: RwLock<ScriptCache>,
}

impl ScriptEngine {
    /// Create a new script engine with default limits
    pub fn new() -> Self {
        Self::with_limits(&ScriptLimits::default())
    }

    /// Create a new script engine with the given limits
    pub fn with_limits(limits: &ScriptLimits) -> Self {
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine, limits);

        Self {
            engine,
            cache: RwLock::new(ScriptCache::new()),
        }
    }

    /// Configure the Rhai engine with helper functions and safety limits
    fn configure_engine(engine: &mut Engine, limits: &ScriptLimits) {
        engine.set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth);
        engine.set_max_call_levels(limits.max_call_levels);
        engine.set_max_operations(limits.max_operations);
        engine.set_max_string_size(limits.max_string_size);
        engine.set_max_array_size(limits.max_array_size);
        engine.set_max_map_size(limits.max_map_size);

        // Usage: alternations(display, "ae", "āē")
        engine.register_fn(
            "alternations",
            |text: ImmutableString, from: ImmutableString, to: ImmutableString| -> Array {
                alternations(&text, &from, &to)
                    .into_iter()
                    .map(Dynamic::from)
                    .collect()
            },
        );

        // Usage: with_display(record, "new label")
        engine.register_fn("with_display", |mut record: Map, text: ImmutableString| -> Map {
            record.insert(DISPLAY_FIELD.into(), text.into());
            record
        });
    }

    /// Compile a script and cache it
    pub fn compile(&self, name: &str, source: &str) -> Result<CompiledTransform> {
        let mut cache = self
            .cache
            .write()
            .map_err(|e| DeriveError::Script(format!("Failed to acquire cache lock: {}", e)))?;

        cache.get_or_compile(&self.engine, name, source)
    }

    /// Compile a script into a transform that shares this engine
    pub fn transform(self: &Arc<Self>, name: &str, source: &str) -> Result<TransformRef> {
        let compiled = self.compile(name, source)?;
        Ok(Arc::new(ScriptTransform::new(self.clone(), compiled)))
    }

    /// Run a compiled transform on one record
    pub fn execute(&self, script: &CompiledTransform, record: &Record) -> Result<Vec<Record>> {
        let input = record_to_map(record);

        let mut scope = Scope::new();
        scope.push("record", input.clone());
        scope.push("display", record.display()?.to_string());

        let result = if script.has_entry_point() {
            self.engine
                .call_fn::<Dynamic>(&mut scope, script.ast(), super::TRANSFORM_FN, (input,))
        } else {
            self.engine
                .eval_ast_with_scope::<Dynamic>(&mut scope, script.ast())
        };
        let result = result.context("Execution error")?;

        outputs_from_dynamic(record, result)
    }

    /// Validate a script without executing it
    pub fn validate(&self, source: &str) -> Result<()> {
        self.engine
            .compile(source)
            .map(|_| ())
            .map_err(|e| DeriveError::from_rhai_error(e.into()).with_context("Validation error"))
    }

    /// Clear the script cache
    pub fn clear_cache(&self) -> Result<()> {
        let mut cache = self
            .cache
            .write()
            .map_err(|e| DeriveError::Script(format!("Failed to acquire cache lock: {}", e)))?;
        cache.clear();
        Ok(())
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("cache_size", &self.cache.read().map(|c| c.len()).ok())
            .finish()
    }
}

/// A transform backed by a compiled Rhai script
#[derive(Debug, Clone)]
pub struct ScriptTransform {
    engine: Arc<ScriptEngine>,
    script: CompiledTransform,
}

impl ScriptTransform {
    pub fn new(engine: Arc<ScriptEngine>, script: CompiledTransform) -> Self {
        Self { engine, script }
    }

    pub fn script(&self) -> &CompiledTransform {
        &self.script
    }
}

impl Transform for ScriptTransform {
    fn name(&self) -> &str {
        self.script.name()
    }

    fn apply(&self, record: &Record) -> Result<Vec<Record>> {
        self.engine
            .execute(&self.script, record)
            .with_context(|| format!("Script '{}'", self.script.name()))
    }
}

fn record_to_map(record: &Record) -> Map {
    record
        .fields()
        .map(|(name, value)| {
            let value = match value {
                FieldValue::Bool(b) => Dynamic::from(*b),
                FieldValue::Int(i) => Dynamic::from(*i),
                FieldValue::Text(s) => Dynamic::from(s.clone()),
            };
            (name.into(), value)
        })
        .collect()
}

fn map_to_record(map: Map) -> Result<Record> {
    let mut fields = BTreeMap::new();
    for (name, value) in map {
        let name = name.to_string();
        let value = field_from_dynamic(&name, value)?;
        fields.insert(name, value);
    }
    Ok(Record::from_fields(fields))
}

fn field_from_dynamic(name: &str, value: Dynamic) -> Result<FieldValue> {
    if let Ok(b) = value.as_bool() {
        return Ok(FieldValue::Bool(b));
    }
    if let Ok(i) = value.as_int() {
        return Ok(FieldValue::Int(i));
    }
    if let Ok(c) = value.as_char() {
        return Ok(FieldValue::Text(c.to_string()));
    }
    let type_name = value.type_name();
    value.into_string().map(FieldValue::Text).map_err(|_| {
        DeriveError::Script(format!(
            "Field '{}' has unsupported type '{}'",
            name, type_name
        ))
    })
}

/// Interpret a script result as zero or more output records
fn outputs_from_dynamic(input: &Record, result: Dynamic) -> Result<Vec<Record>> {
    if result.is_unit() {
        return Ok(Vec::new());
    }
    if result.is_array() {
        let items = result
            .try_cast::<Array>()
            .ok_or_else(|| DeriveError::Script("Expected an array result".to_string()))?;
        return items
            .into_iter()
            .map(|item| output_from_dynamic(input, item))
            .collect();
    }
    Ok(vec![output_from_dynamic(input, result)?])
}

fn output_from_dynamic(input: &Record, item: Dynamic) -> Result<Record> {
    if item.is_map() {
        let map = item
            .try_cast::<Map>()
            .ok_or_else(|| DeriveError::Script("Expected a map result".to_string()))?;
        return map_to_record(map);
    }
    let type_name = item.type_name();
    item.into_string()
        .map(|display| input.with_display(display))
        .map_err(|_| {
            DeriveError::Script(format!(
                "Script must return a string, a map, an array or (), got '{}'",
                type_name
            ))
        })
}
