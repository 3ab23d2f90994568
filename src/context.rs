//! Context records and the providers that seed a build.
//!
//! A context is a string-keyed map carrying everything one root sample needs:
//! a required unique `"id"` plus any paths, dates or regions the levels read.
//! Contexts are produced once, cloned into workers and never mutated.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[allow(unused_imports)]
use mockall::automock;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::errors::{BuildError, ProviderError};

/// Key every context must carry.
pub const ID_KEY: &str = "id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(Map<String, Value>);

impl Context {
    pub fn new(id: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert(ID_KEY.to_string(), Value::String(id.into()));
        Self(map)
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Builder-style insert used when assembling contexts.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn id(&self) -> Result<&str, BuildError> {
        self.require_str(ID_KEY)
    }

    /// Id for reports; never fails.
    pub fn label(&self) -> String {
        self.0
            .get(ID_KEY)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| "<missing id>".to_string())
    }

    pub fn require(&self, key: &str) -> Result<&Value, BuildError> {
        self.0
            .get(key)
            .ok_or_else(|| BuildError::MissingKey(key.to_string()))
    }

    pub fn require_str(&self, key: &str) -> Result<&str, BuildError> {
        self.require(key)?
            .as_str()
            .ok_or_else(|| BuildError::UnsupportedValue {
                key: key.to_string(),
                expected: "a string",
            })
    }

    pub fn require_f64(&self, key: &str) -> Result<f64, BuildError> {
        self.require(key)?
            .as_f64()
            .ok_or_else(|| BuildError::UnsupportedValue {
                key: key.to_string(),
                expected: "a number",
            })
    }

    /// Reads a filesystem location from a string value.
    pub fn require_path(&self, key: &str) -> Result<PathBuf, BuildError> {
        match self.require(key)? {
            Value::String(s) => Ok(PathBuf::from(s)),
            _ => Err(BuildError::UnsupportedValue {
                key: key.to_string(),
                expected: "a path string",
            }),
        }
    }
}

/// How many contexts to keep from the front of the collection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Limit {
    #[default]
    All,
    /// Proportion in (0, 1], rounded up, never below one.
    Fraction(f64),
    /// Exact count, clamped to what is available.
    Count(usize),
}

impl Limit {
    pub fn apply(self, total: usize) -> Result<usize, ProviderError> {
        match self {
            Limit::All => Ok(total),
            Limit::Fraction(f) => {
                if !(f > 0.0 && f <= 1.0) {
                    return Err(ProviderError::InvalidLimit(f));
                }
                if total == 0 {
                    return Ok(0);
                }
                // 10 * 0.3 is 3.0000000000000004 in f64: snap products that
                // are whole up to rounding error, round everything else up
                let exact = total as f64 * f;
                let nearest = exact.round();
                let count = if (exact - nearest).abs() <= f64::EPSILON * exact.max(1.0) {
                    nearest as usize
                } else {
                    exact.ceil() as usize
                };
                Ok(count.clamp(1, total))
            }
            Limit::Count(n) => Ok(n.min(total)),
        }
    }

    /// Parses `all`, an integer count or a fraction such as `0.1`.
    pub fn parse(raw: &str) -> Result<Self, ProviderError> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("all") || raw.eq_ignore_ascii_case("none") {
            return Ok(Limit::All);
        }
        if let Ok(count) = raw.parse::<usize>() {
            return Ok(Limit::Count(count));
        }
        match raw.parse::<f64>() {
            Ok(f) if f > 0.0 && f <= 1.0 => Ok(Limit::Fraction(f)),
            Ok(f) => Err(ProviderError::InvalidLimit(f)),
            Err(e) => Err(ProviderError::Parse {
                path: "limit".to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

impl Serialize for Limit {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Limit::All => serializer.serialize_none(),
            Limit::Fraction(f) => serializer.serialize_f64(*f),
            Limit::Count(n) => serializer.serialize_u64(*n as u64),
        }
    }
}

impl<'de> Deserialize<'de> for Limit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawLimit {
            Count(u64),
            Fraction(f64),
        }

        match Option::<RawLimit>::deserialize(deserializer)? {
            None => Ok(Limit::All),
            Some(RawLimit::Count(n)) => Ok(Limit::Count(n as usize)),
            Some(RawLimit::Fraction(f)) if f > 0.0 && f <= 1.0 => Ok(Limit::Fraction(f)),
            Some(RawLimit::Fraction(f)) => Err(serde::de::Error::custom(format!(
                "fractional limit must be in (0, 1], got {f}"
            ))),
        }
    }
}

/// Source of root contexts: a file, a folder tree, a database.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait ContextProvider: Send + Sync {
    /// Every context, in the order the root should build them.
    fn fetch(&self) -> Result<Vec<Context>, ProviderError>;
}

/// Fetch from `provider`, check ids and apply `limit`.
pub fn load_contexts(
    provider: &dyn ContextProvider,
    limit: Limit,
) -> Result<Vec<Context>, ProviderError> {
    let mut contexts = provider.fetch()?;
    check_ids(&contexts)?;

    let total = contexts.len();
    let keep = limit.apply(total)?;
    contexts.truncate(keep);

    if keep < total {
        warn!(kept = keep, total, ?limit, "[CONTEXTS] Sample limit active, building a subset");
    }
    info!(contexts = contexts.len(), "[CONTEXTS] Loaded contexts");
    Ok(contexts)
}

/// Every context must carry a string id, unique across the collection.
pub fn check_ids(contexts: &[Context]) -> Result<(), ProviderError> {
    let mut seen = HashSet::with_capacity(contexts.len());
    for (position, ctx) in contexts.iter().enumerate() {
        let id = ctx
            .get(ID_KEY)
            .and_then(Value::as_str)
            .ok_or(ProviderError::MissingId(position))?;
        if !seen.insert(id) {
            return Err(ProviderError::DuplicateId(id.to_string()));
        }
    }
    Ok(())
}

/// In-memory contexts.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    contexts: Vec<Context>,
}

impl StaticProvider {
    pub fn new(contexts: Vec<Context>) -> Self {
        Self { contexts }
    }

    /// Five placeholder contexts, `sample01` to `sample05`.
    pub fn mock() -> Self {
        let contexts = (1..=5)
            .map(|n| {
                let id = format!("sample{n:02}");
                let path = format!("/mock/{id}");
                Context::new(id).with("path", path)
            })
            .collect();
        Self { contexts }
    }
}

impl ContextProvider for StaticProvider {
    fn fetch(&self) -> Result<Vec<Context>, ProviderError> {
        Ok(self.contexts.clone())
    }
}

/// One context per immediate subdirectory of `root`, sorted by name.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: PathBuf,
}

impl DirectoryProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ContextProvider for DirectoryProvider {
    fn fetch(&self) -> Result<Vec<Context>, ProviderError> {
        debug!(root = %self.root.display(), "[CONTEXTS] Scanning directory for contexts");
        let mut contexts = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| match e.into_io_error() {
                Some(io) => ProviderError::Io(io),
                None => ProviderError::Unavailable(format!(
                    "filesystem loop below {}",
                    self.root.display()
                )),
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let path = entry.path().display().to_string();
            contexts.push(Context::new(name).with("path", path));
        }
        Ok(contexts)
    }
}

/// Contexts from a JSON array of objects or a JSON Lines file.
#[derive(Debug, Clone)]
pub struct JsonProvider {
    path: PathBuf,
}

impl JsonProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ContextProvider for JsonProvider {
    fn fetch(&self) -> Result<Vec<Context>, ProviderError> {
        let content = fs::read_to_string(&self.path)?;
        parse_contexts(&self.path, &content)
    }
}

fn parse_contexts(path: &Path, content: &str) -> Result<Vec<Context>, ProviderError> {
    let parse_err = |reason: String| ProviderError::Parse {
        path: path.display().to_string(),
        reason,
    };

    if content.trim_start().starts_with('[') {
        return serde_json::from_str::<Vec<Context>>(content).map_err(|e| parse_err(e.to_string()));
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<Context>(line)
                .map_err(|e| parse_err(format!("line {}: {e}", idx + 1)))
        })
        .collect()
}

/// Provider selection as written in the config file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    #[default]
    Mock,
    Directory {
        root: PathBuf,
    },
    Json {
        path: PathBuf,
    },
}

impl ProviderConfig {
    pub fn provider(&self) -> Box<dyn ContextProvider> {
        match self {
            ProviderConfig::Mock => Box::new(StaticProvider::mock()),
            ProviderConfig::Directory { root } => Box::new(DirectoryProvider::new(root.clone())),
            ProviderConfig::Json { path } => Box::new(JsonProvider::new(path.clone())),
        }
    }
}
