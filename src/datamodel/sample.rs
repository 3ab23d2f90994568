use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use tracing::debug;

use super::extension::{evaluate, Cell, Extension};
use super::table::{Field, Schema, Value};
use super::tortilla::Tortilla;
use crate::errors::{ExtensionError, SchemaError};

/// Id prefix reserved for padding samples.
pub const PADDING_PREFIX: &str = "__TACOPAD__";

/// What a sample carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Reference to a file on disk.
    File(PathBuf),
    /// Raw in-memory blob.
    Bytes(Vec<u8>),
    /// Nested container built by the next level.
    Folder(Box<Tortilla>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    File,
    Folder,
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleKind::File => f.write_str("FILE"),
            SampleKind::Folder => f.write_str("FOLDER"),
        }
    }
}

/// One unit of data: an id, a payload and its metadata columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    id: String,
    payload: Payload,
    metadata: IndexMap<String, Cell>,
    descriptions: BTreeMap<String, String>,
}

impl Sample {
    pub fn new(id: impl Into<String>, payload: Payload) -> Result<Self, SchemaError> {
        let id = id.into();
        if id.is_empty() {
            return Err(SchemaError::EmptyId);
        }
        if id.starts_with(PADDING_PREFIX) {
            return Err(SchemaError::ReservedId(id));
        }
        Ok(Self {
            id,
            payload,
            metadata: IndexMap::new(),
            descriptions: BTreeMap::new(),
        })
    }

    pub fn file(id: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self, SchemaError> {
        Self::new(id, Payload::File(path.into()))
    }

    pub fn bytes(id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Result<Self, SchemaError> {
        Self::new(id, Payload::Bytes(bytes.into()))
    }

    pub fn folder(id: impl Into<String>, child: Tortilla) -> Result<Self, SchemaError> {
        Self::new(id, Payload::Folder(Box::new(child)))
    }

    /// Placeholder used to pad a tortilla; every field of `schema` is null.
    pub(crate) fn padding(index: usize, schema: &Schema) -> Self {
        let metadata = schema
            .fields()
            .iter()
            .map(|f| {
                (
                    f.name.clone(),
                    Cell {
                        dtype: f.dtype,
                        value: Value::Null,
                    },
                )
            })
            .collect();
        Self {
            id: format!("{PADDING_PREFIX}{index}"),
            payload: Payload::Bytes(Vec::new()),
            metadata,
            descriptions: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn kind(&self) -> SampleKind {
        match self.payload {
            Payload::Folder(_) => SampleKind::Folder,
            _ => SampleKind::File,
        }
    }

    pub fn is_padding(&self) -> bool {
        self.id.starts_with(PADDING_PREFIX)
    }

    pub fn child(&self) -> Option<&Tortilla> {
        match &self.payload {
            Payload::Folder(t) => Some(t),
            _ => None,
        }
    }

    /// Metadata schema in attachment order.
    pub fn schema(&self) -> Schema {
        self.metadata
            .iter()
            .map(|(name, cell)| Field::new(name.clone(), cell.dtype))
            .collect()
    }

    pub fn value(&self, field: &str) -> Option<&Value> {
        self.metadata.get(field).map(|c| &c.value)
    }

    pub fn metadata(&self) -> &IndexMap<String, Cell> {
        &self.metadata
    }

    pub fn field_descriptions(&self) -> &BTreeMap<String, String> {
        &self.descriptions
    }

    /// Compute `ext` for this sample and attach its columns, replacing any
    /// columns of the same name.
    pub fn extend_with(&mut self, ext: &dyn Extension<Sample>) -> Result<(), ExtensionError> {
        let (table, descriptions) = evaluate(ext, self, 1)?;
        let row = &table.rows()[0];
        for (field, value) in table.schema().fields().iter().zip(row) {
            self.metadata.insert(
                field.name.clone(),
                Cell {
                    dtype: field.dtype,
                    value: value.clone(),
                },
            );
        }
        self.descriptions.extend(descriptions);
        debug!(sample_id = %self.id, extension = ext.name(), "Attached sample extension");
        Ok(())
    }

    /// Chaining form of [`Sample::extend_with`] for builder closures.
    pub fn with_extension(mut self, ext: &dyn Extension<Sample>) -> Result<Self, ExtensionError> {
        self.extend_with(ext)?;
        Ok(self)
    }

    /// Reorders metadata to `schema`, inserting nulls for absent fields.
    pub(crate) fn conform_to(&mut self, schema: &Schema) {
        let mut conformed = IndexMap::with_capacity(schema.len());
        for field in schema.fields() {
            let cell = self.metadata.shift_remove(&field.name).unwrap_or(Cell {
                dtype: field.dtype,
                value: Value::Null,
            });
            conformed.insert(field.name.clone(), cell);
        }
        self.metadata = conformed;
    }

    /// Path string exported in metadata tables.
    pub fn path_display(&self) -> Option<String> {
        match &self.payload {
            Payload::File(path) => Some(path.display().to_string()),
            _ => None,
        }
    }
}
