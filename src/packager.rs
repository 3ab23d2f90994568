//! Persistence boundary.
//!
//! Encoding a [`Taco`] into its final archive is the job of an external
//! packaging library, reached through the [`Packager`] trait. The crate ships
//! [`JsonManifestPackager`], which writes the collection document and the
//! per-level metadata as plain JSON into a folder. It is meant for dry runs
//! and tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
#[allow(unused_imports)]
use mockall::automock;
use serde_json::{json, Map, Value as Json};
use tracing::{debug, info, warn};

use crate::config::{BuildConfig, OutputFormat, ParquetConfig};
use crate::datamodel::{Schema, Taco, Tortilla};
use crate::errors::TableError;

pub type PackageError = Box<dyn std::error::Error + Send + Sync>;

/// Everything a packager needs to persist one dataset.
pub struct PackageRequest<'a> {
    pub taco: &'a Taco,
    pub build: &'a BuildConfig,
    /// Passed through untouched.
    pub parquet: &'a ParquetConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackagedOutput {
    /// Files written, collection document first.
    pub paths: Vec<PathBuf>,
    pub format: OutputFormat,
}

/// Writes a finished taco somewhere durable.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Packager: Send + Sync {
    async fn persist<'a>(&self, req: PackageRequest<'a>) -> Result<PackagedOutput, PackageError>;
}

/// Folder packager writing `COLLECTION.json` and `METADATA/level{d}.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonManifestPackager;

#[async_trait]
impl Packager for JsonManifestPackager {
    async fn persist<'a>(&self, req: PackageRequest<'a>) -> Result<PackagedOutput, PackageError> {
        if req.build.format == OutputFormat::Zip {
            return Err("format 'zip' requires an archive packager; use 'folder' or 'auto'".into());
        }
        let root = folder_path(&req.build.output);
        info!(output = %root.display(), "[PACKAGE] Writing JSON manifest");

        if root.exists() {
            if req.build.clean_previous_outputs {
                if !is_previous_manifest(&root) {
                    return Err(format!(
                        "refusing to clean a non-manifest directory {}: no COLLECTION.json from an earlier build",
                        root.display()
                    )
                    .into());
                }
                warn!(output = %root.display(), "[PACKAGE] Removing previous output");
                fs::remove_dir_all(&root)?;
            } else {
                return Err(format!(
                    "output {} already exists and clean_previous_outputs is off",
                    root.display()
                )
                .into());
            }
        }
        if req.build.split_size.is_some() || req.build.group_by.is_some() {
            debug!("[PACKAGE] split_size and group_by only apply to archive output");
        }

        let levels = collect_levels(req.taco.tortilla())?;
        let metadata_dir = root.join("METADATA");
        fs::create_dir_all(&metadata_dir)?;

        let collection_path = root.join("COLLECTION.json");
        let document = collection_document(req.taco, &levels, req.parquet)?;
        fs::write(&collection_path, serde_json::to_vec_pretty(&document)?)?;

        let mut paths = vec![collection_path];
        for (depth, level) in levels.iter().enumerate() {
            let path = metadata_dir.join(format!("level{depth}.json"));
            fs::write(&path, serde_json::to_vec_pretty(&level.records)?)?;
            debug!(depth, records = level.records.len(), "[PACKAGE] Wrote level metadata");
            paths.push(path);
        }

        info!(files = paths.len(), "[PACKAGE] Manifest written");
        Ok(PackagedOutput {
            paths,
            format: OutputFormat::Folder,
        })
    }
}

/// `output.tacozip` becomes the folder `output`.
fn folder_path(output: &Path) -> PathBuf {
    match output.extension().and_then(|e| e.to_str()) {
        Some("tacozip") | Some("zip") => output.with_extension(""),
        _ => output.to_path_buf(),
    }
}

/// A folder this packager wrote before: it holds a `COLLECTION.json` carrying
/// the level index.
fn is_previous_manifest(root: &Path) -> bool {
    if !root.is_dir() {
        return false;
    }
    let Ok(raw) = fs::read(root.join("COLLECTION.json")) else {
        return false;
    };
    serde_json::from_slice::<Json>(&raw)
        .map(|doc| doc.get("taco:levels").is_some_and(Json::is_array))
        .unwrap_or(false)
}

#[derive(Debug, Default)]
struct LevelExport {
    schema: Schema,
    records: Vec<Map<String, Json>>,
}

/// Flattens the tree breadth first, one export per depth. A depth's schema is
/// the union of the fields of every tortilla at that depth, first seen first.
fn collect_levels(root: &Tortilla) -> Result<Vec<LevelExport>, TableError> {
    let mut levels = Vec::new();
    let mut frontier: Vec<(String, &Tortilla)> = vec![(String::new(), root)];

    while !frontier.is_empty() {
        let mut export = LevelExport::default();
        let mut next = Vec::new();
        for (parent, tortilla) in frontier {
            let table = tortilla.export_metadata()?;
            // relaxed tortillas under different parents may add fields
            for field in table.schema().fields() {
                if export.schema.get(&field.name).is_none() {
                    export.schema.push(field.clone());
                }
            }
            for (sample, mut record) in tortilla.samples().iter().zip(table.to_records()) {
                let path = if parent.is_empty() {
                    sample.id().to_string()
                } else {
                    format!("{parent}/{}", sample.id())
                };
                record.insert("internal:parent".to_string(), Json::from(parent.clone()));
                record.insert("internal:path".to_string(), Json::from(path.clone()));
                if let Some(child) = sample.child() {
                    next.push((path, child));
                }
                export.records.push(record);
            }
        }
        levels.push(export);
        frontier = next;
    }
    Ok(levels)
}

fn gather_descriptions(tortilla: &Tortilla, into: &mut BTreeMap<String, String>) {
    into.extend(tortilla.field_descriptions().clone());
    for child in tortilla.samples().iter().filter_map(|s| s.child()) {
        gather_descriptions(child, into);
    }
}

fn collection_document(
    taco: &Taco,
    levels: &[LevelExport],
    parquet: &ParquetConfig,
) -> Result<Json, serde_json::Error> {
    let mut document = serde_json::to_value(taco.collection())?;

    let extensions: Map<String, Json> = taco
        .extensions()
        .iter()
        .map(|(name, cell)| (name.clone(), cell.value.to_json()))
        .collect();

    let mut descriptions = BTreeMap::new();
    gather_descriptions(taco.tortilla(), &mut descriptions);
    descriptions.extend(taco.field_descriptions().clone());

    let level_schemas: Vec<Json> = levels
        .iter()
        .enumerate()
        .map(|(depth, level)| {
            json!({
                "depth": depth,
                "n_records": level.records.len(),
                "fields": level.schema,
            })
        })
        .collect();

    if let Json::Object(map) = &mut document {
        map.insert("taco:extensions".to_string(), Json::Object(extensions));
        map.insert("taco:field_descriptions".to_string(), serde_json::to_value(descriptions)?);
        map.insert("taco:levels".to_string(), Json::Array(level_schemas));
        map.insert("taco:parquet".to_string(), serde_json::to_value(parquet)?);
    }
    Ok(document)
}
