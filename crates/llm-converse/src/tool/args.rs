//! Positional tool arguments.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::ToolError;

static NULL: Value = Value::Null;

/// Arguments for one tool invocation, in declared parameter order.
///
/// Parameters the model left out are [`Value::Null`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs {
    values: Vec<Value>,
}

impl ToolArgs {
    /// Wraps already-ordered values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Maps an argument object onto `params`, ignoring the object's own
    /// key order. Keys not named in `params` are dropped.
    pub fn from_object(params: &[&str], mut object: Map<String, Value>) -> Self {
        let values = params
            .iter()
            .map(|name| object.remove(*name).unwrap_or(Value::Null))
            .collect();
        Self { values }
    }

    /// The value at `index`, or `Null` when out of range.
    pub fn get(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&NULL)
    }

    /// The string at `index`, if it is one.
    pub fn str(&self, index: usize) -> Option<&str> {
        self.get(index).as_str()
    }

    /// Deserializes the value at `index`.
    pub fn value<T: DeserializeOwned>(&self, index: usize) -> Result<T, ToolError> {
        serde_json::from_value(self.get(index).clone())
            .map_err(|e| ToolError::new(format!("argument {index}: {e}")))
    }

    /// Iterates the values in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }

    /// Number of positional values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when there are no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes the arguments.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl<'a> IntoIterator for &'a ToolArgs {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
