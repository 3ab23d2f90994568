use std::collections::BTreeMap;
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::extension::{evaluate, Cell, Extension};
use super::tortilla::Tortilla;
use crate::errors::{DatasetError, ExtensionError};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub doi: String,
    pub citation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Dataset-wide descriptive metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub dataset_version: String,
    pub description: String,
    pub licenses: Vec<String>,
    pub providers: Vec<Contact>,
    pub tasks: Vec<String>,
    pub title: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curators: Option<Vec<Contact>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publications: Option<Vec<Publication>>,
}

impl Default for Collection {
    fn default() -> Self {
        Self {
            id: "my-dataset".to_string(),
            dataset_version: "1.0.0".to_string(),
            description: "TACO dataset: My Dataset".to_string(),
            licenses: vec!["CC-BY-4.0".to_string()],
            providers: vec![Contact {
                name: Some("Dataset Author".to_string()),
                role: Some("producer".to_string()),
                ..Contact::default()
            }],
            tasks: vec!["other".to_string()],
            title: "My Dataset".to_string(),
            keywords: vec!["taco".to_string(), "dataset".to_string()],
            curators: None,
            publications: None,
        }
    }
}

fn collection_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9-]*$").expect("static id pattern is valid"))
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\d+\.\d+\.\d+([-+][0-9A-Za-z.-]+)?$").expect("static version pattern is valid")
    })
}

impl Collection {
    pub fn validate(&self) -> Result<(), DatasetError> {
        if !collection_id_pattern().is_match(&self.id) {
            return Err(DatasetError::InvalidId(self.id.clone()));
        }
        if !version_pattern().is_match(&self.dataset_version) {
            return Err(DatasetError::InvalidVersion(self.dataset_version.clone()));
        }
        if self.title.trim().is_empty() {
            return Err(DatasetError::EmptyField("title"));
        }
        if self.description.trim().is_empty() {
            return Err(DatasetError::EmptyField("description"));
        }
        if self.licenses.is_empty() {
            return Err(DatasetError::EmptyField("licenses"));
        }
        if self.providers.is_empty() {
            return Err(DatasetError::EmptyField("providers"));
        }
        if self.tasks.is_empty() {
            return Err(DatasetError::EmptyField("tasks"));
        }
        Ok(())
    }
}

/// The finished dataset: root tortilla plus collection metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Taco {
    tortilla: Tortilla,
    collection: Collection,
    extensions: IndexMap<String, Cell>,
    descriptions: BTreeMap<String, String>,
}

impl Taco {
    pub fn new(tortilla: Tortilla, collection: Collection) -> Result<Self, DatasetError> {
        collection.validate()?;
        if tortilla.is_empty() {
            return Err(DatasetError::EmptyTortilla);
        }
        Ok(Self {
            tortilla,
            collection,
            extensions: IndexMap::new(),
            descriptions: BTreeMap::new(),
        })
    }

    pub fn tortilla(&self) -> &Tortilla {
        &self.tortilla
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn extensions(&self) -> &IndexMap<String, Cell> {
        &self.extensions
    }

    pub fn field_descriptions(&self) -> &BTreeMap<String, String> {
        &self.descriptions
    }

    pub fn extend_with(&mut self, ext: &dyn Extension<Taco>) -> Result<(), ExtensionError> {
        let (table, descriptions) = evaluate(ext, self, 1)?;
        let row = &table.rows()[0];
        for (field, value) in table.schema().fields().iter().zip(row) {
            self.extensions.insert(
                field.name.clone(),
                Cell {
                    dtype: field.dtype,
                    value: value.clone(),
                },
            );
        }
        self.descriptions.extend(descriptions);
        info!(extension = ext.name(), "[TACO] Applied dataset extension");
        Ok(())
    }
}
