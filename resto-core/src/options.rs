//! Layered solver configuration.
//!
//! Options are captured once into an immutable [`OptionsSnapshot`]. A
//! restoration attempt never mutates that snapshot; instead it stacks
//! [`OverrideLayer`]s on top and resolves lookups first-match: the newest
//! layer wins, the base snapshot is consulted last.
//!
//! Lookups take an option-name prefix (the nested restoration run uses
//! `"resto."`): `prefix + name` is consulted before the bare `name`, so a
//! restoration-specific setting shadows the general one without colliding
//! with the outer run's options.

use std::collections::BTreeMap;

use thiserror::Error;

/// Typed option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptValue {
    Number(f64),
    Integer(i64),
    Boolean(bool),
    Text(String),
}

/// Errors from typed option access.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionsError {
    #[error("option {name} has the wrong type (expected {expected})")]
    WrongType { name: String, expected: &'static str },

    #[error("option {name} = {value} is out of range: {constraint}")]
    OutOfRange { name: String, value: f64, constraint: &'static str },
}

/// Immutable mapping from option name to typed value, captured once at
/// initialization.
#[derive(Debug, Clone, Default)]
pub struct OptionsSnapshot {
    values: BTreeMap<String, OptValue>,
}

impl OptionsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_number(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_owned(), OptValue::Number(value));
    }

    pub fn set_integer(&mut self, name: &str, value: i64) {
        self.values.insert(name.to_owned(), OptValue::Integer(value));
    }

    pub fn set_boolean(&mut self, name: &str, value: bool) {
        self.values.insert(name.to_owned(), OptValue::Boolean(value));
    }

    pub fn set_text(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_owned(), OptValue::Text(value.to_owned()));
    }

    /// True if the caller set this exact name.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&OptValue> {
        self.values.get(name)
    }

    /// Prefix-aware lookup: `prefix + name` first, then bare `name`.
    pub fn lookup(&self, prefix: &str, name: &str) -> Option<&OptValue> {
        if !prefix.is_empty() {
            if let Some(v) = self.values.get(&format!("{prefix}{name}")) {
                return Some(v);
            }
        }
        self.values.get(name)
    }

    pub fn number(&self, prefix: &str, name: &str) -> Result<Option<f64>, OptionsError> {
        match self.lookup(prefix, name) {
            None => Ok(None),
            Some(OptValue::Number(v)) => Ok(Some(*v)),
            Some(OptValue::Integer(v)) => Ok(Some(*v as f64)),
            Some(_) => Err(OptionsError::WrongType { name: name.to_owned(), expected: "number" }),
        }
    }

    pub fn number_or(&self, prefix: &str, name: &str, default: f64) -> Result<f64, OptionsError> {
        Ok(self.number(prefix, name)?.unwrap_or(default))
    }

    pub fn boolean_or(&self, prefix: &str, name: &str, default: bool) -> Result<bool, OptionsError> {
        match self.lookup(prefix, name) {
            None => Ok(default),
            Some(OptValue::Boolean(v)) => Ok(*v),
            Some(_) => Err(OptionsError::WrongType { name: name.to_owned(), expected: "boolean" }),
        }
    }

    pub fn integer_or(&self, prefix: &str, name: &str, default: i64) -> Result<i64, OptionsError> {
        match self.lookup(prefix, name) {
            None => Ok(default),
            Some(OptValue::Integer(v)) => Ok(*v),
            Some(_) => Err(OptionsError::WrongType { name: name.to_owned(), expected: "integer" }),
        }
    }
}

/// One named batch of overrides derived for a restoration attempt.
#[derive(Debug, Clone)]
pub struct OverrideLayer {
    label: &'static str,
    values: BTreeMap<String, OptValue>,
}

impl OverrideLayer {
    pub fn new(label: &'static str) -> Self {
        Self { label, values: BTreeMap::new() }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn set_number(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_owned(), OptValue::Number(value));
    }

    pub fn set_boolean(&mut self, name: &str, value: bool) {
        self.values.insert(name.to_owned(), OptValue::Boolean(value));
    }

    pub fn set_text(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_owned(), OptValue::Text(value.to_owned()));
    }

    fn get(&self, name: &str) -> Option<&OptValue> {
        self.values.get(name)
    }
}

/// A base snapshot with an ordered stack of override layers.
#[derive(Debug, Clone)]
pub struct LayeredOptions {
    base: OptionsSnapshot,
    layers: Vec<OverrideLayer>,
}

impl LayeredOptions {
    pub fn new(base: OptionsSnapshot) -> Self {
        Self { base, layers: Vec::new() }
    }

    pub fn push(&mut self, layer: OverrideLayer) {
        self.layers.push(layer);
    }

    pub fn base(&self) -> &OptionsSnapshot {
        &self.base
    }

    pub fn layers(&self) -> &[OverrideLayer] {
        &self.layers
    }

    /// True if any layer or the base holds this exact name.
    pub fn is_set(&self, name: &str) -> bool {
        self.layers.iter().any(|l| l.get(name).is_some()) || self.base.contains(name)
    }

    fn get(&self, name: &str) -> Option<&OptValue> {
        for layer in self.layers.iter().rev() {
            if let Some(v) = layer.get(name) {
                return Some(v);
            }
        }
        self.base.get(name)
    }

    /// Prefix-aware lookup across all layers and the base.
    pub fn lookup(&self, prefix: &str, name: &str) -> Option<&OptValue> {
        if !prefix.is_empty() {
            if let Some(v) = self.get(&format!("{prefix}{name}")) {
                return Some(v);
            }
        }
        self.get(name)
    }

    pub fn number(&self, prefix: &str, name: &str) -> Result<Option<f64>, OptionsError> {
        match self.lookup(prefix, name) {
            None => Ok(None),
            Some(OptValue::Number(v)) => Ok(Some(*v)),
            Some(OptValue::Integer(v)) => Ok(Some(*v as f64)),
            Some(_) => Err(OptionsError::WrongType { name: name.to_owned(), expected: "number" }),
        }
    }

    pub fn number_or(&self, prefix: &str, name: &str, default: f64) -> Result<f64, OptionsError> {
        Ok(self.number(prefix, name)?.unwrap_or(default))
    }

    pub fn boolean_or(&self, prefix: &str, name: &str, default: bool) -> Result<bool, OptionsError> {
        match self.lookup(prefix, name) {
            None => Ok(default),
            Some(OptValue::Boolean(v)) => Ok(*v),
            Some(_) => Err(OptionsError::WrongType { name: name.to_owned(), expected: "boolean" }),
        }
    }
}
