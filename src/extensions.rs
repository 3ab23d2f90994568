//! Ready-made extensions used by the scaffold hierarchy.
//!
//! Sample extensions carry their values as fields and ignore the sample they
//! are attached to. Tortilla and taco extensions derive their values from
//! the owner.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use wkt::TryFromWkt;

use crate::datamodel::{DataType, Extension, Field, Sample, Schema, Table, Taco, Tortilla, Value};
use crate::errors::ExtensionError;

fn schema_of(fields: &[(&str, DataType)]) -> Schema {
    fields
        .iter()
        .map(|(name, dtype)| Field::new(*name, *dtype))
        .collect()
}

fn descriptions_of(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn table(extension: &str, schema: Schema, rows: Vec<Vec<Value>>) -> Result<Table, ExtensionError> {
    Table::try_new(schema, rows).map_err(|source| ExtensionError::Table {
        extension: extension.to_string(),
        source,
    })
}

fn invalid(extension: &str, reason: impl Into<String>) -> ExtensionError {
    ExtensionError::Compute {
        extension: extension.to_string(),
        reason: reason.into(),
    }
}

/// Region and quality score of a root sample.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomMetadata {
    pub region: String,
    pub quality_score: f64,
    pub flag: Option<String>,
}

impl Extension<Sample> for CustomMetadata {
    fn schema(&self) -> Schema {
        schema_of(&[
            ("custom:region", DataType::String),
            ("custom:quality_score", DataType::Float32),
            ("custom:flag", DataType::String),
        ])
    }

    fn field_descriptions(&self) -> BTreeMap<String, String> {
        descriptions_of(&[
            ("custom:region", "Geographic region"),
            ("custom:quality_score", "Quality assessment score (0-1)"),
            ("custom:flag", "Optional processing flag"),
        ])
    }

    fn compute(&self, _sample: &Sample) -> Result<Table, ExtensionError> {
        if !(0.0..=1.0).contains(&self.quality_score) {
            return Err(invalid(
                self.name(),
                format!("quality_score {} is outside [0, 1]", self.quality_score),
            ));
        }
        table(
            self.name(),
            self.schema(),
            vec![vec![
                self.region.as_str().into(),
                self.quality_score.into(),
                self.flag.clone().into(),
            ]],
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemporalMetadata {
    /// `YYYY-MM-DD`
    pub date: String,
    pub day_of_year: i32,
    pub season: String,
}

impl Extension<Sample> for TemporalMetadata {
    fn schema(&self) -> Schema {
        schema_of(&[
            ("temporal:date", DataType::String),
            ("temporal:day_of_year", DataType::Int32),
            ("temporal:season", DataType::String),
        ])
    }

    fn field_descriptions(&self) -> BTreeMap<String, String> {
        descriptions_of(&[
            ("temporal:date", "Acquisition date (YYYY-MM-DD)"),
            ("temporal:day_of_year", "Day of year (1-366)"),
            ("temporal:season", "Season (spring, summer, fall, winter)"),
        ])
    }

    fn compute(&self, _sample: &Sample) -> Result<Table, ExtensionError> {
        if chrono::NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").is_err() {
            return Err(invalid(self.name(), format!("'{}' is not a YYYY-MM-DD date", self.date)));
        }
        if !(1..=366).contains(&self.day_of_year) {
            return Err(invalid(
                self.name(),
                format!("day_of_year {} is outside 1..=366", self.day_of_year),
            ));
        }
        table(
            self.name(),
            self.schema(),
            vec![vec![
                self.date.as_str().into(),
                self.day_of_year.into(),
                self.season.as_str().into(),
            ]],
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneMetadata {
    pub scene_id: String,
    /// Percentage, 0 to 100.
    pub cloud_cover: f64,
    pub quality_flag: i32,
}

impl Extension<Sample> for SceneMetadata {
    fn schema(&self) -> Schema {
        schema_of(&[
            ("scene:id", DataType::String),
            ("scene:cloud_cover", DataType::Float32),
            ("scene:quality_flag", DataType::Int32),
        ])
    }

    fn field_descriptions(&self) -> BTreeMap<String, String> {
        descriptions_of(&[
            ("scene:id", "Scene identifier"),
            ("scene:cloud_cover", "Cloud cover percentage (0-100)"),
            ("scene:quality_flag", "Quality flag (0=good, 1=moderate, 2=poor)"),
        ])
    }

    fn compute(&self, _sample: &Sample) -> Result<Table, ExtensionError> {
        if !(0.0..=100.0).contains(&self.cloud_cover) {
            return Err(invalid(
                self.name(),
                format!("cloud_cover {} is outside [0, 100]", self.cloud_cover),
            ));
        }
        table(
            self.name(),
            self.schema(),
            vec![vec![
                self.scene_id.as_str().into(),
                self.cloud_cover.into(),
                self.quality_flag.into(),
            ]],
        )
    }
}

/// Dataset partition a sample belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub split: String,
}

impl Split {
    const ALLOWED: [&'static str; 3] = ["train", "test", "validation"];

    pub fn new(split: impl Into<String>) -> Self {
        Self {
            split: split.into(),
        }
    }
}

impl Extension<Sample> for Split {
    fn schema(&self) -> Schema {
        schema_of(&[("split:name", DataType::String)])
    }

    fn field_descriptions(&self) -> BTreeMap<String, String> {
        descriptions_of(&[("split:name", "Dataset partition (train, test or validation)")])
    }

    fn compute(&self, _sample: &Sample) -> Result<Table, ExtensionError> {
        if !Self::ALLOWED.contains(&self.split.as_str()) {
            return Err(invalid(
                self.name(),
                format!("'{}' is not one of {:?}", self.split, Self::ALLOWED),
            ));
        }
        table(self.name(), self.schema(), vec![vec![self.split.as_str().into()]])
    }
}

/// Band count, pixel type and class values of a raster file.
#[derive(Debug, Clone, PartialEq)]
pub struct BandLayout {
    pub bands: i32,
    pub dtype: String,
    /// Class values for categorical rasters.
    pub classes: Option<Vec<i64>>,
}

impl BandLayout {
    pub fn continuous(bands: i32, dtype: impl Into<String>) -> Self {
        Self {
            bands,
            dtype: dtype.into(),
            classes: None,
        }
    }

    pub fn categorical(dtype: impl Into<String>, classes: Vec<i64>) -> Self {
        Self {
            bands: 1,
            dtype: dtype.into(),
            classes: Some(classes),
        }
    }
}

impl Extension<Sample> for BandLayout {
    fn schema(&self) -> Schema {
        schema_of(&[
            ("raster:bands", DataType::Int32),
            ("raster:dtype", DataType::String),
            ("raster:classes", DataType::String),
        ])
    }

    fn field_descriptions(&self) -> BTreeMap<String, String> {
        descriptions_of(&[
            ("raster:bands", "Number of bands"),
            ("raster:dtype", "Pixel data type"),
            ("raster:classes", "Comma-separated class values for categorical rasters"),
        ])
    }

    fn compute(&self, _sample: &Sample) -> Result<Table, ExtensionError> {
        if self.bands < 1 {
            return Err(invalid(self.name(), "a raster has at least one band"));
        }
        let classes = self.classes.as_ref().map(|values| {
            values
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(",")
        });
        table(
            self.name(),
            self.schema(),
            vec![vec![self.bands.into(), self.dtype.as_str().into(), classes.into()]],
        )
    }
}

/// Footprint given as WKT, stored as WKB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    pub wkt: String,
}

impl Geometry {
    pub fn new(wkt: impl Into<String>) -> Self {
        Self { wkt: wkt.into() }
    }

    /// Parses the WKT and encodes it as WKB.
    pub fn to_wkb(&self) -> Result<Vec<u8>, String> {
        let geometry = geo_types::Geometry::<f64>::try_from_wkt_str(&self.wkt)
            .map_err(|e| format!("invalid WKT '{}': {e:?}", self.wkt))?;
        wkb::geom_to_wkb(&geometry).map_err(|e| format!("WKB encoding failed: {e:?}"))
    }
}

impl Extension<Sample> for Geometry {
    fn schema(&self) -> Schema {
        schema_of(&[("geometry:wkb", DataType::Binary)])
    }

    fn field_descriptions(&self) -> BTreeMap<String, String> {
        descriptions_of(&[("geometry:wkb", "Geometry in WKB binary format")])
    }

    fn compute(&self, _sample: &Sample) -> Result<Table, ExtensionError> {
        let bytes = self.to_wkb().map_err(|reason| invalid(self.name(), reason))?;
        table(self.name(), self.schema(), vec![vec![Value::Binary(bytes)]])
    }
}

/// Per-sample position and sample count of a tortilla. Padding samples get a
/// null position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpatialCoverage;

impl Extension<Tortilla> for SpatialCoverage {
    fn schema(&self) -> Schema {
        schema_of(&[
            ("coverage:n_samples", DataType::Int64),
            ("coverage:position", DataType::Int64),
        ])
    }

    fn field_descriptions(&self) -> BTreeMap<String, String> {
        descriptions_of(&[
            ("coverage:n_samples", "Number of real samples in the tortilla"),
            ("coverage:position", "Zero-based position of the sample"),
        ])
    }

    fn compute(&self, tortilla: &Tortilla) -> Result<Table, ExtensionError> {
        let real = (tortilla.len() - tortilla.padding()) as i64;
        let rows = tortilla
            .samples()
            .iter()
            .enumerate()
            .map(|(idx, sample)| {
                let position = (!sample.is_padding()).then_some(idx as i64);
                vec![Value::Int(real), position.into()]
            })
            .collect();
        table(self.name(), self.schema(), rows)
    }
}

/// Creation timestamp and root sample count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatasetStats;

impl Extension<Taco> for DatasetStats {
    fn schema(&self) -> Schema {
        schema_of(&[
            ("stats:creation_date", DataType::String),
            ("stats:n_root_samples", DataType::Int64),
        ])
    }

    fn field_descriptions(&self) -> BTreeMap<String, String> {
        descriptions_of(&[
            ("stats:creation_date", "ISO timestamp when dataset was created"),
            ("stats:n_root_samples", "Number of root-level samples"),
        ])
    }

    fn compute(&self, taco: &Taco) -> Result<Table, ExtensionError> {
        let created = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        table(
            self.name(),
            self.schema(),
            vec![vec![created.into(), (taco.tortilla().len() as i64).into()]],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetTag {
    pub tag: String,
}

impl DatasetTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl Extension<Taco> for DatasetTag {
    fn schema(&self) -> Schema {
        schema_of(&[
            ("mock:dataset_tag", DataType::String),
            ("mock:total_samples", DataType::Int64),
        ])
    }

    fn field_descriptions(&self) -> BTreeMap<String, String> {
        descriptions_of(&[
            ("mock:dataset_tag", "Release tag of the dataset"),
            ("mock:total_samples", "Total number of samples in the root tortilla"),
        ])
    }

    fn compute(&self, taco: &Taco) -> Result<Table, ExtensionError> {
        table(
            self.name(),
            self.schema(),
            vec![vec![
                self.tag.as_str().into(),
                (taco.tortilla().len() as i64).into(),
            ]],
        )
    }
}
