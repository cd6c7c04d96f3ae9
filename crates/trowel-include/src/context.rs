//! Named values substituted into pages.

use serde_json::{Map, Value};

/// Values visible to `@@name` references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: Map<String, Value>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Look up a name, walking nested objects for dotted paths.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut parts = name.split('.');
        let mut current = self.values.get(parts.next()?)?;

        for part in parts {
            current = current.as_object()?.get(part)?;
        }

        Some(current)
    }

    /// A copy of this context with `overrides` layered on top.
    pub fn merged(&self, overrides: &Map<String, Value>) -> Self {
        let mut values = self.values.clone();
        for (key, value) in overrides {
            values.insert(key.clone(), value.clone());
        }
        Self { values }
    }

    /// Text inserted for a value.
    pub fn render_value(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl From<Map<String, Value>> for Context {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}
