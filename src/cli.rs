use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

use crate::context::{load_contexts, ContextProvider, Limit};
use crate::demo;
use crate::load_config::load_config;
use crate::packager::JsonManifestPackager;
use crate::pipeline::{build_dataset, PipelineExtensions};
use crate::root::BuildOverrides;
use crate::validate::{validate_level, ValidateOptions};

/// CLI for taco-builder: build hierarchical TACO datasets from context records.
#[derive(Parser)]
#[clap(
    name = "taco-builder",
    version,
    about = "Fan context records out through a TACO level hierarchy and package the result"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the dataset and write it with the JSON manifest packager
    Build {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Build root contexts one after another
        #[clap(long)]
        sequential: bool,
        #[clap(long)]
        workers: Option<usize>,
        /// `all`, a count, or a fraction in (0, 1]
        #[clap(long)]
        limit: Option<String>,
    },
    /// Run a random share of one level's builders and report failures
    Validate {
        #[clap(long)]
        config: PathBuf,
        #[clap(long)]
        level: usize,
        #[clap(long, default_value_t = 0.1)]
        ratio: f64,
        #[clap(long)]
        workers: Option<usize>,
        #[clap(long)]
        seed: Option<u64>,
    },
    /// Build one level per context and print its metadata table
    Inspect {
        #[clap(long)]
        config: PathBuf,
        #[clap(long)]
        level: usize,
        #[clap(long)]
        limit: Option<String>,
    },
    /// Load contexts and print a summary
    Contexts {
        #[clap(long)]
        config: PathBuf,
        #[clap(long)]
        limit: Option<String>,
    },
}

fn parse_limit(raw: Option<&str>, fallback: Limit) -> Result<Limit> {
    match raw {
        Some(raw) => Limit::parse(raw).with_context(|| format!("invalid --limit {raw:?}")),
        None => Ok(fallback),
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("taco_builder_started");

    match cli.command {
        Commands::Build {
            config,
            sequential,
            workers,
            limit,
        } => {
            let mut config = load_config(config)?;
            config.build.level0_sample_limit =
                parse_limit(limit.as_deref(), config.build.level0_sample_limit)?;
            let hierarchy = Arc::new(demo::hierarchy(config.levels)?);
            let provider: Arc<dyn ContextProvider> = Arc::from(config.contexts.provider());
            let extensions = PipelineExtensions::scaffold(&config.collection);
            let overrides = BuildOverrides {
                contexts: None,
                parallel: sequential.then_some(false),
                workers,
            };

            println!("Build starting...");
            match build_dataset(
                &config,
                hierarchy,
                provider,
                &extensions,
                &JsonManifestPackager,
                overrides,
            )
            .await
            {
                Ok(report) => {
                    println!("Build complete.\nReport:");
                    println!("{:#?}", report);
                    if !report.failures.is_empty() {
                        eprintln!(
                            "[WARN] {} of {} contexts failed:",
                            report.failures.len(),
                            report.attempted
                        );
                        for failure in &report.failures {
                            eprintln!("  {}: {}", failure.context_id, failure.message);
                        }
                    }
                    Ok(())
                }
                Err(e) => Err(anyhow::Error::new(e).context("Build failed")),
            }
        }
        Commands::Validate {
            config,
            level,
            ratio,
            workers,
            seed,
        } => {
            let config = load_config(config)?;
            let hierarchy = Arc::new(demo::hierarchy(config.levels)?);
            let provider = config.contexts.provider();
            let contexts = load_contexts(provider.as_ref(), config.build.level0_sample_limit)?;
            let options = ValidateOptions {
                sample_ratio: ratio,
                workers: workers.unwrap_or(config.build.workers),
                seed,
                progress: config.build.progress,
            };

            let report = validate_level(hierarchy, level, &contexts, &options).await?;
            println!(
                "Tested {}/{} builder runs at level {}",
                report.tested, report.total, report.depth
            );
            if report.passed() {
                println!("Validated!");
                Ok(())
            } else {
                println!("Errors:");
                for failure in &report.failures {
                    println!("  {failure}");
                }
                anyhow::bail!("{} builder runs failed", report.failures.len())
            }
        }
        Commands::Inspect {
            config,
            level,
            limit,
        } => {
            let config = load_config(config)?;
            let hierarchy = demo::hierarchy(config.levels)?;
            let provider = config.contexts.provider();
            let limit = parse_limit(limit.as_deref(), Limit::Count(2))?;
            let contexts = load_contexts(provider.as_ref(), limit)?;

            println!("Building level{level} with {} contexts...", contexts.len());
            for ctx in &contexts {
                let tortilla = hierarchy
                    .build_level(level, ctx)
                    .with_context(|| format!("level {level} failed for context '{}'", ctx.label()))?;
                println!("{}: {} samples", ctx.label(), tortilla.len());
                let records = tortilla.export_metadata()?.to_records();
                println!("{}", serde_json::to_string_pretty(&records)?);
            }
            Ok(())
        }
        Commands::Contexts { config, limit } => {
            let config = load_config(config)?;
            let provider = config.contexts.provider();
            let limit = parse_limit(limit.as_deref(), config.build.level0_sample_limit)?;
            let contexts = load_contexts(provider.as_ref(), limit)?;

            println!("Loaded {} contexts", contexts.len());
            if let Some(first) = contexts.first() {
                println!("First context: {}", serde_json::to_string_pretty(first)?);
            }
            Ok(())
        }
    }
}
