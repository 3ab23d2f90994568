//! End-to-end dataset build: contexts → root tortilla → taco → packager.

use std::sync::Arc;

use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::TacoConfig;
use crate::context::ContextProvider;
use crate::datamodel::{Collection, Extension, Taco, Tortilla};
use crate::errors::PipelineError;
use crate::extensions::{DatasetStats, DatasetTag, SpatialCoverage};
use crate::hierarchy::Hierarchy;
use crate::packager::{PackageRequest, PackagedOutput, Packager};
use crate::root::{BuildOverrides, ContextFailure, RootBuild, RootBuilder};

/// Extensions applied after the root build.
#[derive(Default)]
pub struct PipelineExtensions {
    pub tortilla: Vec<Box<dyn Extension<Tortilla>>>,
    pub taco: Vec<Box<dyn Extension<Taco>>>,
}

impl PipelineExtensions {
    /// Coverage on the root tortilla, stats and a release tag on the taco.
    pub fn scaffold(collection: &Collection) -> Self {
        Self {
            tortilla: vec![Box::new(SpatialCoverage)],
            taco: vec![
                Box::new(DatasetStats),
                Box::new(DatasetTag::new(format!("v{}", collection.dataset_version))),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub run_id: Uuid,
    pub collection_id: String,
    pub attempted: usize,
    pub root_samples: usize,
    pub failures: Vec<ContextFailure>,
    pub output: PackagedOutput,
}

/// Build the root tortilla and apply tortilla extensions.
pub async fn create_tortilla(
    builder: &RootBuilder,
    overrides: BuildOverrides,
    extensions: &[Box<dyn Extension<Tortilla>>],
) -> Result<RootBuild, PipelineError> {
    let mut build = builder.build(overrides).await?;
    for ext in extensions {
        build.tortilla.extend_with(ext.as_ref())?;
    }
    Ok(build)
}

/// Wrap `tortilla` with collection metadata and apply taco extensions.
pub fn create_taco(
    tortilla: Tortilla,
    collection: Collection,
    extensions: &[Box<dyn Extension<Taco>>],
) -> Result<Taco, PipelineError> {
    let mut taco = Taco::new(tortilla, collection)?;
    for ext in extensions {
        taco.extend_with(ext.as_ref())?;
    }
    info!(
        collection_id = %taco.collection().id,
        root_samples = taco.tortilla().len(),
        extensions = taco.extensions().len(),
        "[TACO] Created taco"
    );
    Ok(taco)
}

pub async fn build_dataset(
    config: &TacoConfig,
    hierarchy: Arc<Hierarchy>,
    provider: Arc<dyn ContextProvider>,
    extensions: &PipelineExtensions,
    packager: &dyn Packager,
    overrides: BuildOverrides,
) -> Result<BuildReport, PipelineError> {
    let run_id = Uuid::new_v4();
    let span = info_span!("build_dataset", %run_id, collection_id = %config.collection.id);

    async move {
        info!("[PIPELINE] Starting dataset build");
        let builder = RootBuilder::new(hierarchy, provider, config.build.clone());
        let RootBuild {
            tortilla,
            failures,
            attempted,
        } = create_tortilla(&builder, overrides, &extensions.tortilla).await?;

        let taco = create_taco(tortilla, config.collection.clone(), &extensions.taco)?;

        let request = PackageRequest {
            taco: &taco,
            build: &config.build,
            parquet: &config.parquet,
        };
        let output = packager.persist(request).await.map_err(|e| {
            error!(error = %e, "[PIPELINE] Packaging failed");
            PipelineError::Package(e.to_string())
        })?;

        info!(
            attempted,
            failed = failures.len(),
            files = output.paths.len(),
            "[PIPELINE] Dataset build complete"
        );
        Ok(BuildReport {
            run_id,
            collection_id: taco.collection().id.clone(),
            attempted,
            root_samples: taco.tortilla().len(),
            failures,
            output,
        })
    }
    .instrument(span)
    .await
}
