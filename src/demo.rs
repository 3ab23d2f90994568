//! The scaffold hierarchy shipped with the binary.
//!
//! ```text
//! level0  <ctx id>          FOLDER  CustomMetadata
//! level1  date_2023_05      FOLDER  TemporalMetadata
//! level2  scene_001         FOLDER  SceneMetadata
//! level3  split_train       FOLDER  Split
//! level4  rgb, multiband, singleband, mask_binary, mask_multiclass   FILE  BandLayout
//! ```
//!
//! With fewer levels the chain is cut short and the leaf files move up to the
//! last level. Contexts need an `id` and a `path`; `region` and
//! `quality_score` are optional.

use std::path::PathBuf;

use crate::context::Context;
use crate::datamodel::{Sample, Tortilla};
use crate::errors::BuildError;
use crate::extensions::{BandLayout, CustomMetadata, SceneMetadata, Split, TemporalMetadata};
use crate::hierarchy::{Hierarchy, Level, SampleBuilder, MAX_DEPTH};

/// Build the scaffold with `levels` levels below the root (1 to 4).
pub fn hierarchy(levels: usize) -> Result<Hierarchy, BuildError> {
    if !(1..=MAX_DEPTH).contains(&levels) {
        return Err(BuildError::Hierarchy(format!(
            "scaffold supports 1 to {MAX_DEPTH} levels below the root, got {levels}"
        )));
    }

    let intermediates = [
        Level::new("dates").with_builder(SampleBuilder::folder("date", build_date)),
        Level::new("scenes").with_builder(SampleBuilder::folder("scene", build_scene)),
        Level::new("splits").with_builder(SampleBuilder::folder("train", build_train)),
    ];

    let mut stack = vec![Level::new("root").with_builder(SampleBuilder::folder("root", build_root))];
    stack.extend(intermediates.into_iter().take(levels - 1));
    stack.push(leaf_level());
    Hierarchy::new(stack)
}

fn leaf_level() -> Level {
    Level::new("files")
        .with_builder(SampleBuilder::file("rgb", |ctx| {
            leaf(ctx, "rgb", "rgb_uint8.tif", BandLayout::continuous(3, "uint8"))
        }))
        .with_builder(SampleBuilder::file("multiband", |ctx| {
            leaf(ctx, "multiband", "multiband_uint16.tif", BandLayout::continuous(10, "uint16"))
        }))
        .with_builder(SampleBuilder::file("singleband", |ctx| {
            leaf(ctx, "singleband", "singleband_float32.tif", BandLayout::continuous(1, "float32"))
        }))
        .with_builder(SampleBuilder::file("mask_binary", |ctx| {
            leaf(ctx, "mask_binary", "mask_binary.tif", BandLayout::categorical("uint8", vec![0, 1]))
        }))
        .with_builder(SampleBuilder::file("mask_multiclass", |ctx| {
            leaf(
                ctx,
                "mask_multiclass",
                "mask_multiclass.tif",
                BandLayout::categorical("uint8", (0..=5).collect()),
            )
        }))
}

fn leaf(ctx: &Context, id: &str, file: &str, layout: BandLayout) -> Result<Sample, BuildError> {
    let dir: PathBuf = ctx.require_path("path")?;
    Ok(Sample::file(id, dir.join(file))?.with_extension(&layout)?)
}

fn build_root(ctx: &Context, child: Tortilla) -> Result<Sample, BuildError> {
    let region = match ctx.get("region") {
        Some(_) => ctx.require_str("region")?.to_string(),
        None => "unknown".to_string(),
    };
    let quality_score = match ctx.get("quality_score") {
        Some(_) => ctx.require_f64("quality_score")?,
        None => 1.0,
    };
    let meta = CustomMetadata {
        region,
        quality_score,
        flag: None,
    };
    Ok(Sample::folder(ctx.id()?, child)?.with_extension(&meta)?)
}

fn build_date(_ctx: &Context, child: Tortilla) -> Result<Sample, BuildError> {
    let meta = TemporalMetadata {
        date: "2023-05-15".to_string(),
        day_of_year: 135,
        season: "spring".to_string(),
    };
    Ok(Sample::folder("date_2023_05", child)?.with_extension(&meta)?)
}

fn build_scene(_ctx: &Context, child: Tortilla) -> Result<Sample, BuildError> {
    let meta = SceneMetadata {
        scene_id: "S2A_20230515".to_string(),
        cloud_cover: 12.5,
        quality_flag: 0,
    };
    Ok(Sample::folder("scene_001", child)?.with_extension(&meta)?)
}

fn build_train(_ctx: &Context, child: Tortilla) -> Result<Sample, BuildError> {
    Ok(Sample::folder("split_train", child)?.with_extension(&Split::new("train"))?)
}
