use std::io;

use thiserror::Error;

use crate::datamodel::DataType;

/// Errors raised while shaping values into a typed [`Table`](crate::datamodel::Table).
#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("row {row} has {found} values, schema declares {expected} fields")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("value for '{field}' in row {row} is not a valid {expected}")]
    TypeMismatch {
        field: String,
        row: usize,
        expected: DataType,
    },
    #[error("field '{0}' is declared twice")]
    DuplicateField(String),
}

/// Errors raised when an extension is evaluated against its owner.
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("extension '{extension}' failed: {reason}")]
    Compute { extension: String, reason: String },
    #[error("extension '{extension}' returned {found} rows, expected {expected}")]
    RowCount {
        extension: String,
        expected: usize,
        found: usize,
    },
    #[error("extension '{extension}' returned a table that does not match its declared schema")]
    SchemaMismatch { extension: String },
    #[error("extension '{extension}' declares reserved field '{field}'")]
    ReservedField { extension: String, field: String },
    #[error("extension '{extension}' produced an invalid table: {source}")]
    Table {
        extension: String,
        #[source]
        source: TableError,
    },
}

/// Errors raised by [`Tortilla`](crate::datamodel::Tortilla) and [`Sample`](crate::datamodel::Sample) construction.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("sample id must not be empty")]
    EmptyId,
    #[error("sample id '{0}' uses the reserved padding prefix")]
    ReservedId(String),
    #[error("duplicate sample id '{0}' in tortilla")]
    DuplicateId(String),
    #[error("pad_to must be greater than zero")]
    InvalidPad,
    #[error("sample '{sample_id}' does not match the schema of '{reference_id}' under strict schema: {detail}")]
    StrictMismatch {
        sample_id: String,
        reference_id: String,
        detail: String,
    },
    #[error("field '{field}' has conflicting types {left} and {right}")]
    TypeConflict {
        field: String,
        left: DataType,
        right: DataType,
    },
}

/// Errors raised while building samples and tortillas from contexts.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("context is missing required key '{0}'")]
    MissingKey(String),
    #[error("context key '{key}' must be {expected}")]
    UnsupportedValue { key: String, expected: &'static str },
    #[error("builder '{builder}' failed: {reason}")]
    Builder { builder: String, reason: String },
    #[error("invalid hierarchy: {0}")]
    Hierarchy(String),
    #[error("level {depth} does not exist (hierarchy has {levels} levels)")]
    NoSuchLevel { depth: usize, levels: usize },
    #[error(
        "sample id at depth {depth}, position {position} varies across contexts: expected '{expected}', found '{found}' (context '{context_id}')"
    )]
    VaryingSampleId {
        depth: usize,
        position: usize,
        expected: String,
        found: String,
        context_id: String,
    },
    #[error("worker crashed while building context '{context_id}': {reason}")]
    WorkerCrashed { context_id: String, reason: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Extension(#[from] ExtensionError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl BuildError {
    /// Shorthand for builder-specific failures raised from user closures.
    pub fn builder(builder: impl Into<String>, reason: impl Into<String>) -> Self {
        BuildError::Builder {
            builder: builder.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by context providers and limit handling.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("failed to parse contexts from {path}: {reason}")]
    Parse { path: String, reason: String },
    #[error("context at position {0} has no string 'id'")]
    MissingId(usize),
    #[error("duplicate context id '{0}'")]
    DuplicateId(String),
    #[error("fractional limit must be in (0, 1], got {0}")]
    InvalidLimit(f64),
    #[error("context source unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised when assembling the final [`Taco`](crate::datamodel::Taco).
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("collection field '{0}' must not be empty")]
    EmptyField(&'static str),
    #[error("collection id '{0}' must be lowercase letters, digits and dashes")]
    InvalidId(String),
    #[error("dataset_version '{0}' is not a semantic version")]
    InvalidVersion(String),
    #[error("root tortilla has no samples")]
    EmptyTortilla,
    #[error(transparent)]
    Extension(#[from] ExtensionError),
}

/// Top-level failure of the dataset pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Extension(#[from] ExtensionError),
    #[error("packaging failed: {0}")]
    Package(String),
}
