use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::TableError;

/// Column types supported by extension metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    Binary,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::String => "string",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Bool => "bool",
            DataType::Binary => "binary",
        };
        f.write_str(name)
    }
}

/// A single metadata cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
}

impl Value {
    /// `Null` matches every type; `Int` must fit in 32 bits for `int32`.
    pub fn matches(&self, dtype: DataType) -> bool {
        match (self, dtype) {
            (Value::Null, _) => true,
            (Value::Bool(_), DataType::Bool) => true,
            (Value::Int(v), DataType::Int32) => i32::try_from(*v).is_ok(),
            (Value::Int(_), DataType::Int64) => true,
            (Value::Float(_), DataType::Float32 | DataType::Float64) => true,
            (Value::String(_), DataType::String) => true,
            (Value::Binary(_), DataType::Binary) => true,
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Binary(bytes) => serde_json::Value::from(bytes.clone()),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub dtype: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, dtype: DataType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }
}

/// Ordered list of fields. Order is significant when schemas are compared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema(Vec<Field>);

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &[Field] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.0.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|f| f.name.as_str())
    }

    pub fn push(&mut self, field: Field) {
        self.0.push(field);
    }

    /// Human-readable difference against `other`, or `None` when equal.
    pub fn diff(&self, other: &Schema) -> Option<String> {
        if self == other {
            return None;
        }
        let missing: Vec<&str> = self
            .names()
            .filter(|name| other.get(name).is_none())
            .collect();
        let extra: Vec<&str> = other
            .names()
            .filter(|name| self.get(name).is_none())
            .collect();
        let retyped: Vec<String> = self
            .0
            .iter()
            .filter_map(|f| {
                other
                    .get(&f.name)
                    .filter(|o| o.dtype != f.dtype)
                    .map(|o| format!("{} ({} vs {})", f.name, f.dtype, o.dtype))
            })
            .collect();

        let mut parts = Vec::new();
        if !missing.is_empty() {
            parts.push(format!("missing fields [{}]", missing.join(", ")));
        }
        if !extra.is_empty() {
            parts.push(format!("unexpected fields [{}]", extra.join(", ")));
        }
        if !retyped.is_empty() {
            parts.push(format!("type changes [{}]", retyped.join(", ")));
        }
        if parts.is_empty() {
            parts.push("field order differs".to_string());
        }
        Some(parts.join("; "))
    }
}

impl FromIterator<Field> for Schema {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Row-oriented typed table, the result of every extension computation.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    schema: Schema,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn try_new(schema: Schema, rows: Vec<Vec<Value>>) -> Result<Self, TableError> {
        let mut seen = HashSet::new();
        for field in schema.fields() {
            if !seen.insert(field.name.as_str()) {
                return Err(TableError::DuplicateField(field.name.clone()));
            }
        }
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != schema.len() {
                return Err(TableError::RowWidth {
                    row: row_idx,
                    expected: schema.len(),
                    found: row.len(),
                });
            }
            for (field, value) in schema.fields().iter().zip(row) {
                if !value.matches(field.dtype) {
                    return Err(TableError::TypeMismatch {
                        field: field.name.clone(),
                        row: row_idx,
                        expected: field.dtype,
                    });
                }
            }
        }
        Ok(Self { schema, rows })
    }

    pub fn single_row(schema: Schema, values: Vec<Value>) -> Result<Self, TableError> {
        Self::try_new(schema, vec![values])
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.schema.fields().iter().position(|f| f.name == name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// One JSON object per row, keyed by field name.
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.schema
                    .fields()
                    .iter()
                    .zip(row)
                    .map(|(field, value)| (field.name.clone(), value.to_json()))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int32_rejects_out_of_range_values() {
        assert!(Value::Int(12).matches(DataType::Int32));
        assert!(!Value::Int(i64::MAX).matches(DataType::Int32));
        assert!(Value::Int(i64::MAX).matches(DataType::Int64));
        assert!(Value::Null.matches(DataType::Binary));
    }

    #[test]
    fn table_rejects_wrong_width_and_type() {
        let schema = Schema::new(vec![
            Field::new("a:x", DataType::String),
            Field::new("a:y", DataType::Float32),
        ]);
        let err = Table::single_row(schema.clone(), vec![Value::from("x")]).unwrap_err();
        assert!(matches!(err, TableError::RowWidth { expected: 2, found: 1, .. }));

        let err = Table::single_row(schema, vec![Value::from("x"), Value::from("nope")])
            .unwrap_err();
        assert!(matches!(err, TableError::TypeMismatch { ref field, .. } if field == "a:y"));
    }

    #[test]
    fn schema_diff_names_missing_and_extra_fields() {
        let left = Schema::new(vec![Field::new("a:x", DataType::String)]);
        let right = Schema::new(vec![Field::new("a:z", DataType::String)]);
        let diff = left.diff(&right).expect("schemas differ");
        assert!(diff.contains("missing fields [a:x]"));
        assert!(diff.contains("unexpected fields [a:z]"));
        assert_eq!(left.diff(&left.clone()), None);
    }
}
