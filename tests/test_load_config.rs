use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

use taco_builder::config::OutputFormat;
use taco_builder::context::{Limit, ProviderConfig};
use taco_builder::load_config::load_config;

fn clear_env() {
    for var in ["TACO_WORKERS", "TACO_SAMPLE_LIMIT", "TACO_OUTPUT"] {
        env::remove_var(var);
    }
}

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).expect("write config");
    file
}

const MINIMAL: &str = r#"
collection:
  id: sentinel-tiles
  dataset_version: 0.2.0
  description: Sentinel-2 tiles with masks
  licenses: [CC-BY-4.0]
  providers:
    - name: Remote Sensing Lab
      role: producer
  tasks: [segmentation]
  title: Sentinel Tiles
"#;

#[tokio::test]
#[serial]
async fn test_minimal_config_uses_defaults() {
    clear_env();
    let file = config_file(MINIMAL);

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.collection.id, "sentinel-tiles");
    assert_eq!(config.levels, 4);
    assert_eq!(config.build.workers, 4);
    assert!(config.build.level0_parallel);
    assert_eq!(config.build.level0_sample_limit, Limit::All);
    assert_eq!(config.build.output, PathBuf::from("output.tacozip"));
    assert_eq!(config.build.format, OutputFormat::Auto);
    assert_eq!(config.build.split_size_bytes().expect("size"), Some(4 << 30));
    assert_eq!(config.parquet.row_group_size, 122_880);
    assert_eq!(config.contexts, ProviderConfig::Mock);
}

#[tokio::test]
#[serial]
async fn test_env_overrides_take_precedence() {
    clear_env();
    let file = config_file(&format!("{MINIMAL}build:\n  workers: 2\n  output: from-file.tacozip\n"));

    env::set_var("TACO_WORKERS", "12");
    env::set_var("TACO_SAMPLE_LIMIT", "0.5");
    env::set_var("TACO_OUTPUT", "/tmp/override");
    let config = load_config(file.path()).expect("Config should load");
    clear_env();

    assert_eq!(config.build.workers, 12);
    assert_eq!(config.build.level0_sample_limit, Limit::Fraction(0.5));
    assert_eq!(config.build.output, PathBuf::from("/tmp/override"));
}

#[tokio::test]
#[serial]
async fn test_invalid_worker_override_is_rejected() {
    clear_env();
    let file = config_file(MINIMAL);

    env::set_var("TACO_WORKERS", "many");
    let err = load_config(file.path()).unwrap_err();
    clear_env();

    assert!(err.to_string().contains("TACO_WORKERS"), "got: {err}");
}

#[tokio::test]
#[serial]
async fn test_invalid_yaml_and_missing_file_fail() {
    clear_env();
    let file = config_file("collection: [unterminated");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config YAML"), "got: {err}");

    let err = load_config("/definitely/not/here.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"), "got: {err}");
}

#[tokio::test]
#[serial]
async fn test_semantic_validation() {
    clear_env();

    let file = config_file(&format!("{MINIMAL}build:\n  workers: 0\n"));
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("build.workers must be at least 1"), "got: {err}");

    let file = config_file(&format!("{MINIMAL}levels: 5\n"));
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("levels must be between"), "got: {err}");

    let file = config_file(&format!("{MINIMAL}build:\n  split_size: lots\n"));
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("build.split_size"), "got: {err}");

    let file = config_file(&MINIMAL.replace("sentinel-tiles", "Sentinel Tiles"));
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("collection metadata is invalid"), "got: {err}");
}

#[tokio::test]
#[serial]
async fn test_sample_limit_forms() {
    clear_env();
    let cases = [
        ("0.25", Limit::Fraction(0.25)),
        ("3", Limit::Count(3)),
        ("null", Limit::All),
    ];
    for (raw, expected) in cases {
        let file = config_file(&format!("{MINIMAL}build:\n  level0_sample_limit: {raw}\n"));
        let config = load_config(file.path()).expect("Config should load");
        assert_eq!(config.build.level0_sample_limit, expected, "limit {raw}");
    }

    let file = config_file(&format!("{MINIMAL}build:\n  level0_sample_limit: 1.5\n"));
    assert!(load_config(file.path()).is_err());
}

#[tokio::test]
#[serial]
async fn test_context_provider_and_output_format_are_read() {
    clear_env();
    let file = config_file(&format!(
        "{MINIMAL}contexts:\n  kind: json\n  path: ./contexts.jsonl\nbuild:\n  format: folder\n  split_size: null\n"
    ));
    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(
        config.contexts,
        ProviderConfig::Json {
            path: PathBuf::from("./contexts.jsonl")
        }
    );
    assert_eq!(config.build.format, OutputFormat::Folder);
    assert_eq!(config.build.split_size_bytes().expect("size"), None);
}
