//! Metadata extensions.
//!
//! An extension is a typed record computed from an owner (a [`Sample`], a
//! [`Tortilla`] or a [`Taco`]) and attached to it as extra columns. Every
//! extension declares its schema and field descriptions up front so that the
//! columns can be documented before any value is computed.
//!
//! [`Sample`]: crate::datamodel::Sample
//! [`Tortilla`]: crate::datamodel::Tortilla
//! [`Taco`]: crate::datamodel::Taco

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use super::table::{DataType, Table, Value};
use crate::errors::ExtensionError;

/// Column names owned by the datamodel itself.
pub const RESERVED_FIELDS: [&str; 3] = ["id", "type", "path"];

/// A metadata attachment computed from an owner of type `T`.
pub trait Extension<T: ?Sized>: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
            .rsplit("::")
            .next()
            .unwrap_or("extension")
    }

    /// Ordered fields this extension produces.
    fn schema(&self) -> super::Schema;

    /// Human-readable description of each field, keyed by field name.
    fn field_descriptions(&self) -> BTreeMap<String, String>;

    /// Compute the values for `owner`.
    fn compute(&self, owner: &T) -> Result<Table, ExtensionError>;
}

/// A computed column ready to be stored on its owner.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub dtype: DataType,
    pub value: Value,
}

fn namespaced_field() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z][a-z0-9_]*:[a-z0-9_]+$").expect("static field pattern is valid")
    })
}

/// Runs `ext` against `owner` and checks the result against the declared schema.
pub(crate) fn evaluate<T: ?Sized>(
    ext: &dyn Extension<T>,
    owner: &T,
    expected_rows: usize,
) -> Result<(Table, BTreeMap<String, String>), ExtensionError> {
    let name = ext.name().to_string();
    let declared = ext.schema();

    for field in declared.fields() {
        if RESERVED_FIELDS.contains(&field.name.as_str()) {
            return Err(ExtensionError::ReservedField {
                extension: name,
                field: field.name.clone(),
            });
        }
        if !namespaced_field().is_match(&field.name) {
            warn!(extension = %name, field = %field.name, "Extension field does not follow the namespace:field convention");
        }
    }

    let table = ext.compute(owner)?;
    if table.schema() != &declared {
        return Err(ExtensionError::SchemaMismatch { extension: name });
    }
    if table.num_rows() != expected_rows {
        return Err(ExtensionError::RowCount {
            extension: name,
            expected: expected_rows,
            found: table.num_rows(),
        });
    }

    let descriptions = ext.field_descriptions();
    for field in declared.names() {
        if !descriptions.contains_key(field) {
            warn!(extension = %name, field, "Extension field has no description");
        }
    }

    Ok((table, descriptions))
}
