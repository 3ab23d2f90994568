use std::sync::Arc;

use taco_builder::context::{Context, ContextProvider, StaticProvider};
use taco_builder::datamodel::Sample;
use taco_builder::demo;
use taco_builder::errors::BuildError;
use taco_builder::hierarchy::{Hierarchy, Level, SampleBuilder};
use taco_builder::validate::{validate_level, ValidateOptions};

fn mock_contexts() -> Vec<Context> {
    StaticProvider::mock().fetch().expect("mock contexts")
}

fn options(ratio: f64, seed: Option<u64>) -> ValidateOptions {
    ValidateOptions {
        sample_ratio: ratio,
        workers: 3,
        seed,
        progress: false,
    }
}

/// A leaf level where `bad` fails for `sample03` and `boom` panics for `sample04`.
fn flaky_hierarchy() -> Arc<Hierarchy> {
    let leaves = Level::new("files")
        .with_builder(SampleBuilder::file("good", |ctx| {
            Ok(Sample::file("good", ctx.require_path("path")?)?)
        }))
        .with_builder(SampleBuilder::file("bad", |ctx| {
            if ctx.id()? == "sample03" {
                return Err(BuildError::builder("bad", "missing band 4"));
            }
            Ok(Sample::file("bad", ctx.require_path("path")?)?)
        }))
        .with_builder(SampleBuilder::file("boom", |ctx| {
            if ctx.id()? == "sample04" {
                panic!("reader blew up");
            }
            Ok(Sample::bytes("boom", vec![1u8])?)
        }));
    Arc::new(Hierarchy::new(vec![leaves]).expect("valid hierarchy"))
}

#[tokio::test]
async fn test_full_ratio_runs_every_item() {
    let hierarchy = Arc::new(demo::hierarchy(2).expect("scaffold"));
    let report = validate_level(hierarchy, 2, &mock_contexts(), &options(1.0, Some(7)))
        .await
        .expect("validation runs");

    assert_eq!(report.depth, 2);
    assert_eq!(report.total, 25);
    assert_eq!(report.tested, 25);
    assert!(report.passed());
}

#[tokio::test]
async fn test_ratio_rounds_down_but_tests_at_least_one() {
    let hierarchy = Arc::new(demo::hierarchy(2).expect("scaffold"));
    let contexts = mock_contexts();

    let report = validate_level(Arc::clone(&hierarchy), 2, &contexts, &options(0.1, None))
        .await
        .expect("validation runs");
    assert_eq!(report.tested, 2);

    let report = validate_level(hierarchy, 2, &contexts, &options(0.01, None))
        .await
        .expect("validation runs");
    assert_eq!(report.tested, 1);
}

#[tokio::test]
async fn test_failures_are_collected_not_fatal() {
    let report = validate_level(flaky_hierarchy(), 0, &mock_contexts(), &options(1.0, Some(1)))
        .await
        .expect("validation runs");

    assert_eq!(report.total, 15);
    assert_eq!(report.tested, 15);
    assert!(!report.passed());
    assert_eq!(report.failures.len(), 2);

    let rendered: Vec<String> = report.failures.iter().map(ToString::to_string).collect();
    assert!(rendered[0].starts_with("bad[sample03]: "), "got {rendered:?}");
    assert!(rendered[0].contains("missing band 4"));
    assert_eq!(report.failures[1].builder, "boom");
    assert_eq!(report.failures[1].context_id, "sample04");
    assert!(report.failures[1].message.contains("panicked"));
}

#[tokio::test]
async fn test_same_seed_selects_the_same_items() {
    let contexts = mock_contexts();
    let first = validate_level(flaky_hierarchy(), 0, &contexts, &options(0.4, Some(42)))
        .await
        .expect("validation runs");
    let second = validate_level(flaky_hierarchy(), 0, &contexts, &options(0.4, Some(42)))
        .await
        .expect("validation runs");

    assert_eq!(first.tested, 6);
    assert_eq!(first.failures, second.failures);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let hierarchy = Arc::new(demo::hierarchy(2).expect("scaffold"));
    let contexts = mock_contexts();

    for ratio in [0.0, -0.5, 1.5] {
        let err = validate_level(Arc::clone(&hierarchy), 1, &contexts, &options(ratio, None))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Provider(_)), "ratio {ratio}: {err:?}");
    }

    let err = validate_level(hierarchy, 3, &contexts, &options(0.5, None))
        .await
        .unwrap_err();
    assert!(matches!(err, BuildError::NoSuchLevel { depth: 3, levels: 3 }));
}

#[tokio::test]
async fn test_no_contexts_means_nothing_to_test() {
    let hierarchy = Arc::new(demo::hierarchy(1).expect("scaffold"));
    let report = validate_level(hierarchy, 1, &[], &options(0.5, None))
        .await
        .expect("validation runs");
    assert_eq!((report.tested, report.total), (0, 0));
    assert!(report.passed());
}
