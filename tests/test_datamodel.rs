use std::collections::BTreeMap;

use taco_builder::datamodel::{
    Collection, DataType, Extension, Field, Sample, Schema, Table, Taco, Tortilla, TortillaOptions,
    Value, PADDING_PREFIX,
};
use taco_builder::errors::{DatasetError, ExtensionError, SchemaError};
use taco_builder::extensions::{BandLayout, DatasetTag, SpatialCoverage, Split};

/// Attaches a single `test:score` column of the given type.
struct Score {
    dtype: DataType,
    value: Value,
}

impl Extension<Sample> for Score {
    fn schema(&self) -> Schema {
        Schema::new(vec![Field::new("test:score", self.dtype)])
    }

    fn field_descriptions(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("test:score".to_string(), "Test score".to_string())])
    }

    fn compute(&self, _sample: &Sample) -> Result<Table, ExtensionError> {
        Ok(Table::single_row(self.schema(), vec![self.value.clone()]).expect("valid row"))
    }
}

/// Declares `id`, which the datamodel owns.
struct ClaimsId;

impl Extension<Sample> for ClaimsId {
    fn schema(&self) -> Schema {
        Schema::new(vec![Field::new("id", DataType::String)])
    }

    fn field_descriptions(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn compute(&self, _sample: &Sample) -> Result<Table, ExtensionError> {
        Ok(Table::single_row(self.schema(), vec![Value::from("x")]).expect("valid row"))
    }
}

/// Declares one field and returns another.
struct Liar;

impl Extension<Sample> for Liar {
    fn schema(&self) -> Schema {
        Schema::new(vec![Field::new("test:declared", DataType::String)])
    }

    fn field_descriptions(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn compute(&self, _sample: &Sample) -> Result<Table, ExtensionError> {
        let schema = Schema::new(vec![Field::new("test:actual", DataType::String)]);
        Ok(Table::single_row(schema, vec![Value::from("x")]).expect("valid row"))
    }
}

/// Returns a single row no matter how many samples the tortilla holds.
struct OneRowSummary;

impl Extension<Tortilla> for OneRowSummary {
    fn schema(&self) -> Schema {
        Schema::new(vec![Field::new("summary:n", DataType::Int64)])
    }

    fn field_descriptions(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn compute(&self, tortilla: &Tortilla) -> Result<Table, ExtensionError> {
        Ok(Table::single_row(self.schema(), vec![Value::Int(tortilla.len() as i64)]).expect("valid row"))
    }
}

fn split_sample(id: &str, split: &str) -> Sample {
    Sample::file(id, format!("/data/{id}.tif"))
        .expect("sample")
        .with_extension(&Split::new(split))
        .expect("split")
}

#[test]
fn test_strict_schema_rejects_heterogeneous_samples() {
    let samples = vec![
        split_sample("a", "train"),
        Sample::file("b", "/data/b.tif").expect("sample"),
    ];
    let err = Tortilla::new(samples, TortillaOptions::default()).unwrap_err();
    match err {
        SchemaError::StrictMismatch {
            sample_id,
            reference_id,
            ..
        } => {
            assert_eq!(sample_id, "b");
            assert_eq!(reference_id, "a");
        }
        other => panic!("expected strict mismatch, got {other:?}"),
    }
}

#[test]
fn test_relaxed_schema_fills_missing_fields_with_null() {
    let samples = vec![
        Sample::file("a", "/data/a.tif").expect("sample"),
        split_sample("b", "test"),
    ];
    let tortilla = Tortilla::new(samples, TortillaOptions::relaxed()).expect("relaxed tortilla");

    assert_eq!(tortilla.schema().names().collect::<Vec<_>>(), vec!["split:name"]);
    assert_eq!(tortilla.samples()[0].value("split:name"), Some(&Value::Null));
    assert_eq!(tortilla.samples()[1].value("split:name"), Some(&Value::from("test")));
}

#[test]
fn test_relaxed_schema_still_rejects_type_conflicts() {
    let a = Sample::file("a", "/a.tif")
        .expect("sample")
        .with_extension(&Score {
            dtype: DataType::Int64,
            value: Value::Int(3),
        })
        .expect("score");
    let b = Sample::file("b", "/b.tif")
        .expect("sample")
        .with_extension(&Score {
            dtype: DataType::Float64,
            value: Value::Float(0.5),
        })
        .expect("score");

    let err = Tortilla::new(vec![a, b], TortillaOptions::relaxed()).unwrap_err();
    assert!(matches!(err, SchemaError::TypeConflict { ref field, .. } if field == "test:score"));
}

#[test]
fn test_padding_reaches_multiple_of_pad_to() {
    let samples: Vec<Sample> = ["a", "b", "c"].iter().map(|id| split_sample(id, "train")).collect();
    let tortilla =
        Tortilla::new(samples, TortillaOptions::default().with_pad_to(4)).expect("padded tortilla");

    assert_eq!(tortilla.len(), 4);
    assert_eq!(tortilla.padding(), 1);
    let pad = &tortilla.samples()[3];
    assert!(pad.is_padding());
    assert!(pad.id().starts_with(PADDING_PREFIX));
    assert_eq!(pad.value("split:name"), Some(&Value::Null));

    let exact: Vec<Sample> = ["a", "b", "c"].iter().map(|id| split_sample(id, "train")).collect();
    let tortilla = Tortilla::new(exact, TortillaOptions::default().with_pad_to(3)).expect("tortilla");
    assert_eq!(tortilla.padding(), 0);

    let err = Tortilla::new(vec![], TortillaOptions::default().with_pad_to(0)).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidPad));
}

#[test]
fn test_sample_ids_are_validated() {
    let samples = vec![split_sample("a", "train"), split_sample("a", "test")];
    let err = Tortilla::new(samples, TortillaOptions::default()).unwrap_err();
    assert!(matches!(err, SchemaError::DuplicateId(ref id) if id == "a"));

    assert!(matches!(Sample::file("", "/x"), Err(SchemaError::EmptyId)));
    assert!(matches!(
        Sample::bytes(format!("{PADDING_PREFIX}1"), vec![0u8]),
        Err(SchemaError::ReservedId(_))
    ));
}

#[test]
fn test_reattaching_an_extension_replaces_its_columns() {
    let mut sample = split_sample("rgb", "train");
    sample.extend_with(&Split::new("validation")).expect("second split");

    assert_eq!(sample.schema().len(), 1);
    assert_eq!(sample.value("split:name"), Some(&Value::from("validation")));
}

#[test]
fn test_extension_contract_is_enforced() {
    let mut sample = Sample::file("rgb", "/rgb.tif").expect("sample");

    let err = sample.extend_with(&ClaimsId).unwrap_err();
    assert!(matches!(err, ExtensionError::ReservedField { ref field, .. } if field == "id"));

    let err = sample.extend_with(&Liar).unwrap_err();
    assert!(matches!(err, ExtensionError::SchemaMismatch { .. }));
    assert!(sample.schema().is_empty());
}

#[test]
fn test_tortilla_extensions_need_one_row_per_sample() {
    let samples: Vec<Sample> = ["a", "b", "c"].iter().map(|id| split_sample(id, "train")).collect();
    let mut tortilla = Tortilla::new(samples, TortillaOptions::default()).expect("tortilla");

    let err = tortilla.extend_with(&OneRowSummary).unwrap_err();
    assert!(matches!(
        err,
        ExtensionError::RowCount {
            expected: 3,
            found: 1,
            ..
        }
    ));

    tortilla.extend_with(&SpatialCoverage).expect("coverage");
    let table = tortilla.export_metadata().expect("export");
    let names: Vec<&str> = table.schema().names().collect();
    assert_eq!(
        names,
        vec!["id", "type", "path", "split:name", "coverage:n_samples", "coverage:position"]
    );
    assert_eq!(table.rows()[2][5], Value::Int(2));
    assert!(tortilla.field_descriptions().contains_key("coverage:position"));
}

#[test]
fn test_coverage_marks_padding_with_null_position() {
    let samples: Vec<Sample> = ["a", "b"].iter().map(|id| split_sample(id, "train")).collect();
    let mut tortilla =
        Tortilla::new(samples, TortillaOptions::default().with_pad_to(3)).expect("tortilla");
    tortilla.extend_with(&SpatialCoverage).expect("coverage");

    let table = tortilla.export_metadata().expect("export");
    let n_samples = table.column("coverage:n_samples").expect("column");
    let positions = table.column("coverage:position").expect("column");
    assert!(n_samples.iter().all(|v| **v == Value::Int(2)));
    assert_eq!(positions[2], &Value::Null);
}

#[test]
fn test_export_reports_kind_and_path() {
    let leaf = Sample::file("rgb", "/data/rgb.tif")
        .expect("sample")
        .with_extension(&BandLayout::continuous(3, "uint8"))
        .expect("layout");
    let child = Tortilla::new(vec![leaf], TortillaOptions::default()).expect("child");
    let folder = Sample::folder("tile", child).expect("folder");
    let root = Tortilla::new(vec![folder], TortillaOptions::default()).expect("root");

    assert_eq!(root.depth(), 1);
    let records = root.export_metadata().expect("export").to_records();
    assert_eq!(records[0]["type"], "FOLDER");
    assert!(records[0]["path"].is_null());

    let child_records = root.samples()[0]
        .child()
        .expect("child tortilla")
        .export_metadata()
        .expect("export")
        .to_records();
    assert_eq!(child_records[0]["type"], "FILE");
    assert_eq!(child_records[0]["path"], "/data/rgb.tif");
    assert_eq!(child_records[0]["raster:bands"], 3);
}

#[test]
fn test_taco_validates_collection_and_applies_extensions() {
    let tortilla = Tortilla::new(vec![split_sample("a", "train")], TortillaOptions::default())
        .expect("tortilla");

    let bad = Collection {
        id: "My Dataset".to_string(),
        ..Collection::default()
    };
    let err = Taco::new(tortilla.clone(), bad).unwrap_err();
    assert!(matches!(err, DatasetError::InvalidId(_)));

    let empty = Tortilla::new(vec![], TortillaOptions::default()).expect("empty tortilla");
    let err = Taco::new(empty, Collection::default()).unwrap_err();
    assert!(matches!(err, DatasetError::EmptyTortilla));

    let mut taco = Taco::new(tortilla, Collection::default()).expect("taco");
    taco.extend_with(&DatasetTag::new("v1.0")).expect("tag");
    assert_eq!(taco.extensions()["mock:dataset_tag"].value, Value::from("v1.0"));
    assert_eq!(taco.extensions()["mock:total_samples"].value, Value::Int(1));
}
