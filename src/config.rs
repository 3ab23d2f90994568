// taco-builder/src/config.rs

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::{Limit, ProviderConfig};
use crate::datamodel::Collection;

/// Where `format: auto` decides between a single archive and a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Auto,
    Zip,
    Folder,
}

/// Build options handed to the root builder and the packager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub workers: usize,
    pub level0_parallel: bool,
    pub level0_sample_limit: Limit,
    pub output: PathBuf,
    pub format: OutputFormat,
    /// Max size per archive part, e.g. `4GB`; `None` disables splitting.
    pub split_size: Option<String>,
    pub group_by: Option<Vec<String>>,
    pub consolidate: bool,
    pub clean_previous_outputs: bool,
    pub validate_schema: bool,
    pub generate_docs: bool,
    pub download_base_url: Option<String>,
    pub catalogue_url: String,
    /// Show progress bars while building.
    pub progress: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            level0_parallel: true,
            level0_sample_limit: Limit::All,
            output: PathBuf::from("output.tacozip"),
            format: OutputFormat::Auto,
            split_size: Some("4GB".to_string()),
            group_by: None,
            consolidate: true,
            clean_previous_outputs: true,
            validate_schema: true,
            generate_docs: true,
            download_base_url: None,
            catalogue_url: "https://tacofoundation.github.io/catalogue".to_string(),
            progress: true,
        }
    }
}

impl BuildConfig {
    pub fn trace_loaded(&self) {
        info!(
            workers = self.workers,
            level0_parallel = self.level0_parallel,
            limit = ?self.level0_sample_limit,
            output = %self.output.display(),
            format = ?self.format,
            "Loaded BuildConfig"
        );
    }

    /// Split size in bytes, if splitting is enabled.
    pub fn split_size_bytes(&self) -> Result<Option<u64>, String> {
        self.split_size.as_deref().map(parse_size).transpose()
    }
}

/// Parquet writer options. Carried through to the packager untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParquetConfig {
    pub row_group_size: u64,
    pub compression: String,
    pub compression_level: i32,
    pub use_dictionary: bool,
    pub write_statistics: bool,
    pub data_page_size: u64,
}

impl Default for ParquetConfig {
    fn default() -> Self {
        Self {
            row_group_size: 122_880,
            compression: "zstd".to_string(),
            compression_level: 3,
            use_dictionary: true,
            write_statistics: true,
            data_page_size: 1_048_576,
        }
    }
}

/// Full configuration of one dataset build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TacoConfig {
    #[serde(default)]
    pub collection: Collection,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub parquet: ParquetConfig,
    #[serde(default)]
    pub contexts: ProviderConfig,
    /// Number of levels below the root in the scaffold hierarchy.
    #[serde(default = "default_levels")]
    pub levels: usize,
}

fn default_levels() -> usize {
    4
}

impl Default for TacoConfig {
    fn default() -> Self {
        Self {
            collection: Collection::default(),
            build: BuildConfig::default(),
            parquet: ParquetConfig::default(),
            contexts: ProviderConfig::default(),
            levels: default_levels(),
        }
    }
}

impl TacoConfig {
    pub fn trace_loaded(&self) {
        info!(
            collection_id = %self.collection.id,
            version = %self.collection.dataset_version,
            levels = self.levels,
            contexts = ?self.contexts,
            "Loaded TacoConfig"
        );
        self.build.trace_loaded();
        debug!(?self, "Config loaded (full debug)");
    }
}

fn size_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?i)\s*(\d+(?:\.\d+)?)\s*(B|KB|MB|GB|TB)\s*$")
            .expect("static size pattern is valid")
    })
}

/// Parses sizes such as `512MB` or `4GB` into bytes (binary multiples).
pub fn parse_size(raw: &str) -> Result<u64, String> {
    let caps = size_pattern()
        .captures(raw)
        .ok_or_else(|| format!("invalid size '{raw}', expected <number><B|KB|MB|GB|TB>"))?;
    let number: f64 = caps[1]
        .parse()
        .map_err(|e| format!("invalid size '{raw}': {e}"))?;
    let unit: u64 = match caps[2].to_ascii_uppercase().as_str() {
        "B" => 1,
        "KB" => 1 << 10,
        "MB" => 1 << 20,
        "GB" => 1 << 30,
        _ => 1 << 40,
    };
    Ok((number * unit as f64) as u64)
}
