//! Root builder: the only stage that iterates over every context.
//!
//! Each context is fanned out over the depth-0 builders, either in order on a
//! single blocking thread or over the bounded pool. A context whose subtree
//! fails is recorded and skipped; the build goes on with the rest. Only a
//! crashed worker aborts the whole build.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use indicatif::ProgressBar;
use tracing::{debug, error, info, warn};

use crate::config::BuildConfig;
use crate::context::{check_ids, load_contexts, Context, ContextProvider};
use crate::datamodel::{Sample, Tortilla};
use crate::errors::BuildError;
use crate::hierarchy::Hierarchy;
use crate::pool::map_bounded;
use crate::progress::create_progress_bar;

/// Per-call replacements for the configured build settings.
#[derive(Debug, Clone, Default)]
pub struct BuildOverrides {
    /// Build exactly these contexts instead of asking the provider.
    pub contexts: Option<Vec<Context>>,
    pub parallel: Option<bool>,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextFailure {
    pub context_id: String,
    pub message: String,
}

/// Outcome of a root build.
#[derive(Debug, Clone)]
pub struct RootBuild {
    pub tortilla: Tortilla,
    pub failures: Vec<ContextFailure>,
    /// Number of contexts submitted.
    pub attempted: usize,
}

impl RootBuild {
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failures.len()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.context_id.as_str()).collect()
    }

    /// True when no context was dropped.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

type Outcome = (String, Result<Vec<Sample>, BuildError>);

pub struct RootBuilder {
    hierarchy: Arc<Hierarchy>,
    provider: Arc<dyn ContextProvider>,
    config: BuildConfig,
}

impl RootBuilder {
    pub fn new(
        hierarchy: Arc<Hierarchy>,
        provider: Arc<dyn ContextProvider>,
        config: BuildConfig,
    ) -> Self {
        Self {
            hierarchy,
            provider,
            config,
        }
    }

    pub fn hierarchy(&self) -> &Arc<Hierarchy> {
        &self.hierarchy
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub async fn build(&self, overrides: BuildOverrides) -> Result<RootBuild, BuildError> {
        let contexts = match overrides.contexts {
            Some(contexts) => {
                check_ids(&contexts)?;
                contexts
            }
            None => load_contexts(self.provider.as_ref(), self.config.level0_sample_limit)?,
        };
        let parallel = overrides.parallel.unwrap_or(self.config.level0_parallel);
        let workers = overrides.workers.unwrap_or(self.config.workers);
        let attempted = contexts.len();

        info!(
            contexts = attempted,
            builders = self.hierarchy.root().builders().len(),
            parallel,
            workers,
            "[ROOT] Building root samples"
        );

        let bar = create_progress_bar(attempted as u64, "Building root samples", self.config.progress);
        let outcomes = if parallel {
            self.collect_parallel(contexts, workers, &bar).await?
        } else {
            self.collect_sequential(contexts, bar.clone()).await?
        };
        bar.finish_and_clear();

        let mut successes = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for (context_id, result) in outcomes {
            match result {
                Ok(samples) => successes.push((context_id, samples)),
                Err(e) => failures.push(ContextFailure {
                    context_id,
                    message: e.to_string(),
                }),
            }
        }

        if !failures.is_empty() {
            // sequential mode already warned per context as it went
            if parallel {
                for failure in &failures {
                    warn!(context_id = %failure.context_id, error = %failure.message, "[ROOT] Context failed");
                }
            }
            let failed_ids: Vec<&str> = failures.iter().map(|f| f.context_id.as_str()).collect();
            error!(
                failed = failures.len(),
                attempted,
                failed_ids = ?failed_ids,
                "[ROOT] Some contexts failed and were skipped"
            );
        }

        if self.config.validate_schema {
            self.hierarchy.check_positional_identity(&successes)?;
        }

        let samples: Vec<Sample> = successes
            .into_iter()
            .flat_map(|(_, samples)| samples)
            .collect();
        let tortilla = Tortilla::new(samples, self.hierarchy.root().options())?;

        info!(
            samples = tortilla.len(),
            succeeded = attempted - failures.len(),
            failed = failures.len(),
            "[ROOT] Root tortilla built"
        );

        Ok(RootBuild {
            tortilla,
            failures,
            attempted,
        })
    }

    async fn collect_sequential(
        &self,
        contexts: Vec<Context>,
        bar: ProgressBar,
    ) -> Result<Vec<Outcome>, BuildError> {
        let hierarchy = Arc::clone(&self.hierarchy);
        let collected = tokio::task::spawn_blocking(move || {
            let mut outcomes = Vec::with_capacity(contexts.len());
            for ctx in contexts {
                let context_id = ctx.label();
                let result = panic::catch_unwind(AssertUnwindSafe(|| hierarchy.root_samples(&ctx)))
                    .map_err(|payload| BuildError::WorkerCrashed {
                        context_id: context_id.clone(),
                        reason: panic_message(payload.as_ref()),
                    })?;
                match &result {
                    Ok(samples) => {
                        debug!(context_id = %context_id, samples = samples.len(), "[ROOT] Context built")
                    }
                    Err(e) => warn!(context_id = %context_id, error = %e, "[ROOT] Context failed"),
                }
                bar.inc(1);
                outcomes.push((context_id, result));
            }
            Ok(outcomes)
        })
        .await;

        match collected {
            Ok(outcomes) => outcomes,
            Err(e) => Err(BuildError::WorkerCrashed {
                context_id: "<sequential>".to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn collect_parallel(
        &self,
        contexts: Vec<Context>,
        workers: usize,
        bar: &ProgressBar,
    ) -> Result<Vec<Outcome>, BuildError> {
        let ids: Vec<String> = contexts.iter().map(Context::label).collect();
        let hierarchy = Arc::clone(&self.hierarchy);
        let task = Arc::new(move |ctx: Context| hierarchy.root_samples(&ctx));

        let results = map_bounded(contexts, workers, task, bar).await;

        let mut outcomes = Vec::with_capacity(results.len());
        for (context_id, joined) in ids.into_iter().zip(results) {
            match joined {
                Ok(result) => outcomes.push((context_id, result)),
                Err(e) => {
                    error!(context_id = %context_id, error = %e, "[ROOT] Worker crashed");
                    return Err(BuildError::WorkerCrashed {
                        context_id,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(outcomes)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
