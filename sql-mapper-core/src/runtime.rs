//! Types shared between generated accessors and execution contexts.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;
use std::future::Future;

use serde::{Deserialize, Serialize};

/// An untyped database value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(int) => Some(*int),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(bool) => write!(f, "{bool}"),
            Value::Int(int) => write!(f, "{int}"),
            Value::Float(float) => write!(f, "{float}"),
            Value::Text(text) => write!(f, "{text}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Value::Int(value.into())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A result row, indexed by position in the driver's column order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Splits the row into exactly `N` values.
    pub fn into_array<const N: usize>(self) -> Result<[Value; N], RowShapeError> {
        <[Value; N]>::try_from(self.values).map_err(|values| RowShapeError {
            expected: N,
            found: values.len(),
        })
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl std::ops::Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}

/// Raised when a result row does not have as many columns as the query declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowShapeError {
    pub expected: usize,
    pub found: usize,
}

impl Display for RowShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Expected {} columns in result row, found {}",
            self.expected, self.found
        )
    }
}

impl Error for RowShapeError {}

/// Named statement parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params {
    values: BTreeMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// Something that can run a statement with `:name` placeholders.
///
/// Errors are passed through generated accessors untouched.
pub trait ExecutionContext {
    type Error: From<RowShapeError>;

    fn execute(
        &self,
        query: &str,
        params: &Params,
    ) -> impl Future<Output = Result<Vec<Row>, Self::Error>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_shape_is_checked() {
        let row = Row::new(vec![Value::from("sam"), Value::from(30)]);
        let [name, age] = row.clone().into_array::<2>().unwrap();
        assert_eq!(name.as_str(), Some("sam"));
        assert_eq!(age.as_i64(), Some(30));
        assert_eq!(
            row.into_array::<3>().unwrap_err(),
            RowShapeError {
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn params_bind_by_name() {
        let params = Params::new()
            .bind("user_id", "sam")
            .bind("age", None::<i32>);
        assert_eq!(params.get("user_id"), Some(&Value::Text("sam".into())));
        assert_eq!(params.get("age"), Some(&Value::Null));
        assert_eq!(params.get("missing"), None);
    }
}
