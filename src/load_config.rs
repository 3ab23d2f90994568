use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::config::TacoConfig;
use crate::context::Limit;
use crate::hierarchy::MAX_DEPTH;

/// Loads a YAML config file, applies `TACO_*` environment overrides and
/// validates the result.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<TacoConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    let mut config: TacoConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    apply_env_overrides(&mut config)?;
    validate(&config)?;
    config.trace_loaded();
    Ok(config)
}

fn apply_env_overrides(config: &mut TacoConfig) -> Result<()> {
    if let Ok(var) = std::env::var("TACO_WORKERS") {
        config.build.workers = match var.parse::<usize>() {
            Ok(workers) => workers,
            Err(e) => {
                error!(error = ?e, var = ?var, "TACO_WORKERS must be a positive integer");
                anyhow::bail!("TACO_WORKERS must be a positive integer: {e}");
            }
        };
        info!(workers = config.build.workers, "TACO_WORKERS override applied");
    }

    if let Ok(var) = std::env::var("TACO_SAMPLE_LIMIT") {
        config.build.level0_sample_limit = Limit::parse(&var)
            .with_context(|| format!("TACO_SAMPLE_LIMIT is not a valid limit: {var:?}"))?;
        warn!(limit = ?config.build.level0_sample_limit, "TACO_SAMPLE_LIMIT override applied");
    }

    if let Ok(var) = std::env::var("TACO_OUTPUT") {
        config.build.output = var.into();
        info!(output = %config.build.output.display(), "TACO_OUTPUT override applied");
    }

    Ok(())
}

fn validate(config: &TacoConfig) -> Result<()> {
    if config.build.workers == 0 {
        anyhow::bail!("build.workers must be at least 1");
    }
    if let Err(e) = config.build.split_size_bytes() {
        anyhow::bail!("build.split_size: {e}");
    }
    config
        .collection
        .validate()
        .context("collection metadata is invalid")?;
    if !(1..=MAX_DEPTH).contains(&config.levels) {
        anyhow::bail!("levels must be between 1 and {MAX_DEPTH}, got {}", config.levels);
    }
    Ok(())
}
