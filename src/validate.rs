//! Smoke-test harness for sample builders.
//!
//! Picks a random share of the (builder, context) pairs of one level, runs
//! them on the bounded pool and collects every failure instead of stopping
//! at the first one.

use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info};

use crate::context::Context;
use crate::errors::{BuildError, ProviderError};
use crate::hierarchy::Hierarchy;
use crate::pool::map_bounded;
use crate::progress::create_progress_bar;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidateOptions {
    /// Share of work items to run, in (0, 1].
    pub sample_ratio: f64,
    pub workers: usize,
    /// Fixes the selection; `None` draws from the OS.
    pub seed: Option<u64>,
    pub progress: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            sample_ratio: 0.1,
            workers: 4,
            seed: None,
            progress: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub builder: String,
    pub context_id: String,
    pub message: String,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.builder, self.context_id, self.message)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub depth: usize,
    pub tested: usize,
    pub total: usize,
    pub failures: Vec<ItemFailure>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run a random subset of the builders of level `depth` against `contexts`.
///
/// At least one item is tested whenever there is work at all.
pub async fn validate_level(
    hierarchy: Arc<Hierarchy>,
    depth: usize,
    contexts: &[Context],
    options: &ValidateOptions,
) -> Result<ValidationReport, BuildError> {
    let ratio = options.sample_ratio;
    if !(ratio > 0.0 && ratio <= 1.0) {
        return Err(ProviderError::InvalidLimit(ratio).into());
    }
    let level = hierarchy.level(depth)?;
    let builder_names: Vec<String> = level.builders().iter().map(|b| b.name().to_string()).collect();

    let items: Vec<(usize, Context)> = (0..builder_names.len())
        .flat_map(|idx| contexts.iter().map(move |ctx| (idx, ctx.clone())))
        .collect();
    let total = items.len();
    let n_test = if total == 0 {
        0
    } else {
        ((total as f64 * ratio).floor() as usize).clamp(1, total)
    };

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut picked = rand::seq::index::sample(&mut rng, total, n_test).into_vec();
    picked.sort_unstable();

    let mut slots: Vec<Option<(usize, Context)>> = items.into_iter().map(Some).collect();
    let selected: Vec<(usize, Context)> = picked
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect();
    let labels: Vec<(String, String)> = selected
        .iter()
        .map(|(idx, ctx)| (builder_names[*idx].clone(), ctx.label()))
        .collect();

    info!(depth, tested = n_test, total, workers = options.workers, "[VALIDATE] Testing builders");

    let bar = create_progress_bar(n_test as u64, format!("Validating level {depth}"), options.progress);
    let task_hierarchy = Arc::clone(&hierarchy);
    let task = Arc::new(move |(idx, ctx): (usize, Context)| -> Result<(), String> {
        let level = task_hierarchy.level(depth).map_err(|e| e.to_string())?;
        task_hierarchy
            .run_builder(depth, &level.builders()[idx], &ctx)
            .map(|_| ())
            .map_err(|e| e.to_string())
    });
    let results = map_bounded(selected, options.workers, task, &bar).await;
    bar.finish_and_clear();

    let failures: Vec<ItemFailure> = labels
        .into_iter()
        .zip(results)
        .filter_map(|((builder, context_id), joined)| {
            let message = match joined {
                Ok(Ok(())) => return None,
                Ok(Err(message)) => message,
                Err(e) => format!("builder panicked: {e}"),
            };
            Some(ItemFailure {
                builder,
                context_id,
                message,
            })
        })
        .collect();

    if failures.is_empty() {
        info!(depth, tested = n_test, "[VALIDATE] Validated");
    } else {
        for failure in &failures {
            error!(%failure, "[VALIDATE] Builder failed");
        }
    }

    Ok(ValidationReport {
        depth,
        tested: n_test,
        total,
        failures,
    })
}
