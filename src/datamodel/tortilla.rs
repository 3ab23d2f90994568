use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::extension::{evaluate, Extension};
use super::sample::Sample;
use super::table::{DataType, Field, Schema, Table, Value};
use crate::errors::{ExtensionError, SchemaError, TableError};

/// Construction settings declared per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TortillaOptions {
    /// Pad the sample count up to a multiple of this value.
    #[serde(default)]
    pub pad_to: Option<usize>,
    /// Require every sample to expose an identical metadata schema.
    #[serde(default = "default_strict")]
    pub strict_schema: bool,
}

fn default_strict() -> bool {
    true
}

impl Default for TortillaOptions {
    fn default() -> Self {
        Self {
            pad_to: None,
            strict_schema: true,
        }
    }
}

impl TortillaOptions {
    pub fn relaxed() -> Self {
        Self {
            strict_schema: false,
            ..Self::default()
        }
    }

    pub fn with_pad_to(mut self, pad_to: usize) -> Self {
        self.pad_to = Some(pad_to);
        self
    }
}

/// Column attached to a whole tortilla, one value per sample.
#[derive(Debug, Clone, PartialEq)]
struct TortillaColumn {
    dtype: DataType,
    values: Vec<Value>,
}

/// Ordered container of samples with a unified metadata schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Tortilla {
    samples: Vec<Sample>,
    schema: Schema,
    options: TortillaOptions,
    padding: usize,
    columns: IndexMap<String, TortillaColumn>,
    descriptions: BTreeMap<String, String>,
}

impl Tortilla {
    /// Build a tortilla from `samples` in the given order.
    ///
    /// Under strict schema every sample must expose the same ordered fields
    /// as the first one. Under relaxed schema the union of fields is taken in
    /// first-seen order and missing values become null; a field declared with
    /// two different types is still rejected.
    pub fn new(mut samples: Vec<Sample>, options: TortillaOptions) -> Result<Self, SchemaError> {
        if options.pad_to == Some(0) {
            return Err(SchemaError::InvalidPad);
        }

        let mut seen = HashSet::with_capacity(samples.len());
        for sample in &samples {
            if !seen.insert(sample.id()) {
                return Err(SchemaError::DuplicateId(sample.id().to_string()));
            }
        }

        let schema = if options.strict_schema {
            strict_schema(&samples)?
        } else {
            relaxed_schema(&samples)?
        };

        let mut descriptions = BTreeMap::new();
        for sample in samples.iter_mut() {
            sample.conform_to(&schema);
            descriptions.extend(sample.field_descriptions().clone());
        }

        let mut padding = 0;
        if let Some(pad_to) = options.pad_to {
            let remainder = samples.len() % pad_to;
            if remainder != 0 {
                padding = pad_to - remainder;
                for index in 0..padding {
                    samples.push(Sample::padding(index, &schema));
                }
            }
        }

        debug!(
            samples = samples.len(),
            padding,
            fields = schema.len(),
            strict = options.strict_schema,
            "Constructed tortilla"
        );

        Ok(Self {
            samples,
            schema,
            options,
            padding,
            columns: IndexMap::new(),
            descriptions,
        })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of placeholder samples appended by `pad_to`.
    pub fn padding(&self) -> usize {
        self.padding
    }

    pub fn options(&self) -> TortillaOptions {
        self.options
    }

    /// Unified sample metadata schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Field descriptions gathered from samples and tortilla extensions.
    pub fn field_descriptions(&self) -> &BTreeMap<String, String> {
        &self.descriptions
    }

    /// Longest chain of nested folders below this tortilla.
    pub fn depth(&self) -> usize {
        self.samples
            .iter()
            .filter_map(Sample::child)
            .map(|child| 1 + child.depth())
            .max()
            .unwrap_or(0)
    }

    /// Compute `ext` over the whole tortilla and append one value per sample.
    pub fn extend_with(&mut self, ext: &dyn Extension<Tortilla>) -> Result<(), ExtensionError> {
        let (table, descriptions) = evaluate(ext, self, self.samples.len())?;
        if let Some(clash) = table.schema().names().find(|name| self.schema.get(name).is_some()) {
            return Err(ExtensionError::ReservedField {
                extension: ext.name().to_string(),
                field: clash.to_string(),
            });
        }
        for (idx, field) in table.schema().fields().iter().enumerate() {
            let values = table.rows().iter().map(|row| row[idx].clone()).collect();
            self.columns.insert(
                field.name.clone(),
                TortillaColumn {
                    dtype: field.dtype,
                    values,
                },
            );
        }
        self.descriptions.extend(descriptions);
        info!(
            extension = ext.name(),
            samples = self.samples.len(),
            "[TORTILLA] Applied tortilla extension"
        );
        Ok(())
    }

    /// Flat metadata table: `id`, `type`, `path`, sample fields, then
    /// tortilla extension columns.
    pub fn export_metadata(&self) -> Result<Table, TableError> {
        let mut fields = vec![
            Field::new("id", DataType::String),
            Field::new("type", DataType::String),
            Field::new("path", DataType::String),
        ];
        fields.extend(self.schema.fields().iter().cloned());
        fields.extend(
            self.columns
                .iter()
                .map(|(name, col)| Field::new(name.clone(), col.dtype)),
        );

        let rows = self
            .samples
            .iter()
            .enumerate()
            .map(|(idx, sample)| {
                let mut row = vec![
                    Value::from(sample.id()),
                    Value::from(sample.kind().to_string()),
                    Value::from(sample.path_display()),
                ];
                row.extend(sample.metadata().values().map(|c| c.value.clone()));
                row.extend(self.columns.values().map(|col| col.values[idx].clone()));
                row
            })
            .collect();

        Table::try_new(Schema::new(fields), rows)
    }
}

fn strict_schema(samples: &[Sample]) -> Result<Schema, SchemaError> {
    let Some(reference) = samples.first() else {
        return Ok(Schema::default());
    };
    let reference_schema = reference.schema();
    for sample in &samples[1..] {
        if let Some(detail) = reference_schema.diff(&sample.schema()) {
            return Err(SchemaError::StrictMismatch {
                sample_id: sample.id().to_string(),
                reference_id: reference.id().to_string(),
                detail,
            });
        }
    }
    Ok(reference_schema)
}

fn relaxed_schema(samples: &[Sample]) -> Result<Schema, SchemaError> {
    let mut union = Schema::default();
    for sample in samples {
        for field in sample.schema().fields() {
            match union.get(&field.name) {
                Some(existing) if existing.dtype != field.dtype => {
                    return Err(SchemaError::TypeConflict {
                        field: field.name.clone(),
                        left: existing.dtype,
                        right: field.dtype,
                    });
                }
                Some(_) => {}
                None => union.push(field.clone()),
            }
        }
    }
    Ok(union)
}
