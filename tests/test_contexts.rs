use std::fs::{self, write};

use serde_json::Map;
use tempfile::{tempdir, NamedTempFile};

use taco_builder::context::{
    load_contexts, Context, ContextProvider, DirectoryProvider, JsonProvider, Limit, MockContextProvider,
    ProviderConfig, StaticProvider,
};
use taco_builder::errors::ProviderError;

fn ids(contexts: &[Context]) -> Vec<String> {
    contexts.iter().map(Context::label).collect()
}

#[test]
fn test_fractional_limit_rounds_up_over_mocks() {
    let contexts = load_contexts(&StaticProvider::mock(), Limit::Fraction(0.4)).expect("load");
    assert_eq!(ids(&contexts), vec!["sample01", "sample02"]);
}

#[test]
fn test_count_limit_is_clamped_and_none_returns_all() {
    let provider = StaticProvider::mock();
    assert_eq!(load_contexts(&provider, Limit::Count(10)).expect("load").len(), 5);
    assert_eq!(load_contexts(&provider, Limit::All).expect("load").len(), 5);
    assert_eq!(load_contexts(&provider, Limit::Count(3)).expect("load").len(), 3);
}

#[test]
fn test_tiny_fraction_keeps_at_least_one_context() {
    let contexts = load_contexts(&StaticProvider::mock(), Limit::Fraction(0.01)).expect("load");
    assert_eq!(ids(&contexts), vec!["sample01"]);
}

#[test]
fn test_fraction_is_exact_when_product_is_whole() {
    let contexts: Vec<Context> = (0..10).map(|n| Context::new(format!("c{n}"))).collect();
    let loaded = load_contexts(&StaticProvider::new(contexts), Limit::Fraction(0.3)).expect("load");
    assert_eq!(loaded.len(), 3);
}

#[test]
fn test_fraction_just_above_a_whole_count_rounds_up() {
    let loaded = load_contexts(&StaticProvider::mock(), Limit::Fraction(0.2000000001)).expect("load");
    assert_eq!(ids(&loaded), vec!["sample01", "sample02"]);

    let loaded = load_contexts(&StaticProvider::mock(), Limit::Fraction(0.2)).expect("load");
    assert_eq!(loaded.len(), 1);
}

#[test]
fn test_out_of_range_fraction_is_rejected() {
    let err = load_contexts(&StaticProvider::mock(), Limit::Fraction(0.0)).unwrap_err();
    assert!(matches!(err, ProviderError::InvalidLimit(f) if f == 0.0));
}

#[test]
fn test_duplicate_and_missing_ids_are_rejected() {
    let duplicated = StaticProvider::new(vec![Context::new("a"), Context::new("b"), Context::new("a")]);
    let err = load_contexts(&duplicated, Limit::All).unwrap_err();
    assert!(matches!(err, ProviderError::DuplicateId(ref id) if id == "a"));

    let missing = StaticProvider::new(vec![Context::new("a"), Context::from_map(Map::new())]);
    let err = load_contexts(&missing, Limit::All).unwrap_err();
    assert!(matches!(err, ProviderError::MissingId(1)));
}

#[test]
fn test_provider_errors_surface_unmodified() {
    let mut provider = MockContextProvider::new();
    provider
        .expect_fetch()
        .times(1)
        .returning(|| Err(ProviderError::Unavailable("catalogue offline".into())));

    let err = load_contexts(&provider, Limit::All).unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable(ref m) if m == "catalogue offline"));
}

#[test]
fn test_directory_provider_lists_subdirectories_sorted() {
    let dir = tempdir().expect("tempdir");
    fs::create_dir(dir.path().join("tile_b")).expect("mkdir");
    fs::create_dir(dir.path().join("tile_a")).expect("mkdir");
    write(dir.path().join("notes.txt"), "not a context").expect("write");

    let contexts = load_contexts(&DirectoryProvider::new(dir.path()), Limit::All).expect("load");
    assert_eq!(ids(&contexts), vec!["tile_a", "tile_b"]);
    let path = contexts[0].require_path("path").expect("path");
    assert_eq!(path, dir.path().join("tile_a"));
}

#[test]
fn test_json_provider_reads_arrays_and_json_lines() {
    let array = NamedTempFile::new().expect("temp file");
    write(
        array.path(),
        r#"[{"id": "s1", "path": "/data/s1", "cloud_cover": 12.5}, {"id": "s2", "path": "/data/s2"}]"#,
    )
    .expect("write");
    let contexts = load_contexts(&JsonProvider::new(array.path()), Limit::All).expect("load");
    assert_eq!(ids(&contexts), vec!["s1", "s2"]);
    assert_eq!(contexts[0].require_f64("cloud_cover").expect("number"), 12.5);

    let lines = NamedTempFile::new().expect("temp file");
    write(lines.path(), "{\"id\": \"a\"}\n{\"id\": \"b\"}\n{\"id\": \"c\"}\n").expect("write");
    let contexts = load_contexts(&JsonProvider::new(lines.path()), Limit::Count(2)).expect("load");
    assert_eq!(ids(&contexts), vec!["a", "b"]);
}

#[test]
fn test_json_provider_reports_parse_errors() {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), "{\"id\": \"a\"}\nnot json\n").expect("write");
    let err = load_contexts(&JsonProvider::new(file.path()), Limit::All).unwrap_err();
    assert!(err.to_string().contains("line 2"), "got: {err}");
}

#[test]
fn test_provider_config_selects_implementation() {
    let config: ProviderConfig = serde_yaml::from_str("kind: mock").expect("yaml");
    let contexts = config.provider().fetch().expect("fetch");
    assert_eq!(contexts.len(), 5);

    let config: ProviderConfig =
        serde_yaml::from_str("kind: json\npath: /tmp/contexts.jsonl").expect("yaml");
    assert!(matches!(config, ProviderConfig::Json { .. }));
}
