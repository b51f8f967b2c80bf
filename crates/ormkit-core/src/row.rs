//! Result rows and shared column metadata.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result, TypeError};
use crate::value::Value;

/// Column metadata shared across the rows of one result set.
///
/// Every [`Row`] of a result holds an `Arc<ColumnSet>` instead of its own
/// name list, so by-name lookup is one hash probe and the names are stored
/// once per query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSet {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl ColumnSet {
    /// Build column metadata from an ordered name list.
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { names, index }
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when the result has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name of the column at `index`.
    #[must_use]
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Position of the named column.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// All column names in result order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// One result row: positional values plus shared column metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<ColumnSet>,
}

impl Row {
    /// Create a row over shared column metadata.
    #[must_use]
    pub fn new(values: Vec<Value>, columns: Arc<ColumnSet>) -> Self {
        Self { values, columns }
    }

    /// The shared column metadata.
    #[must_use]
    pub fn columns(&self) -> &Arc<ColumnSet> {
        &self.columns
    }

    /// Number of values in this row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the row carries no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at a position.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of the named column.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Typed value of the named column.
    ///
    /// Missing columns and conversion failures both surface as mapping
    /// errors with the column name attached.
    #[allow(clippy::result_large_err)]
    pub fn get_named<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.get_by_name(name).ok_or_else(|| {
            Error::Type(TypeError {
                expected: "present column",
                actual: "missing".to_string(),
                column: Some(name.to_string()),
            })
        })?;
        T::from_value(value).map_err(|err| match err {
            Error::Type(mut type_err) => {
                if type_err.column.is_none() {
                    type_err.column = Some(name.to_string());
                }
                Error::Type(type_err)
            }
            other => other,
        })
    }

    /// Consume the row, yielding its values.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Conversion from a dynamic [`Value`] into a concrete field type.
pub trait FromValue: Sized {
    /// Convert, failing with a type error when the value does not fit.
    #[allow(clippy::result_large_err)]
    fn from_value(value: &Value) -> Result<Self>;
}

fn type_error(expected: &'static str, value: &Value) -> Error {
    Error::Type(TypeError {
        expected,
        actual: value.type_name().to_string(),
        column: None,
    })
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| type_error("BOOLEAN", value))
    }
}

impl FromValue for i16 {
    fn from_value(value: &Value) -> Result<Self> {
        let wide = value
            .as_i64()
            .ok_or_else(|| type_error("SMALLINT", value))?;
        i16::try_from(wide).map_err(|_| type_error("SMALLINT", value))
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        let wide = value.as_i64().ok_or_else(|| type_error("INTEGER", value))?;
        i32::try_from(wide).map_err(|_| type_error("INTEGER", value))
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_i64().ok_or_else(|| type_error("BIGINT", value))
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(*v),
            #[allow(clippy::cast_possible_truncation)]
            Value::Double(v) => Ok(*v as f32),
            _ => value
                .as_f64()
                .map(|v| v as f32)
                .ok_or_else(|| type_error("REAL", value)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| type_error("DOUBLE", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            _ => Err(type_error("TEXT", value)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            _ => Err(type_error("BLOB", value)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}
