//! Recursive level builder.
//!
//! A [`Hierarchy`] is an ordered list of [`Level`]s, depth 0 being the root.
//! Each level declares a static list of [`SampleBuilder`]s; the order of that
//! list is the column order of the resulting tortilla. Below the root every
//! level is built from ONE context, sequentially, and folder builders recurse
//! into the next level with the same context before wrapping the child.
//!
//! ```text
//! ctx ─▶ level 0 ─┬─ folder "sample01" ◀── level 1 ─┬─ folder "date_2023_05" ◀── level 2 ...
//!                 │                                  └─ ...
//!                 └─ ...
//! ```
//!
//! Sample ids below the root must be fixed: every context produces the same
//! ids at the same positions so all root samples share one layout.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::context::Context;
use crate::datamodel::{Sample, Tortilla, TortillaOptions};
use crate::errors::BuildError;

/// Deepest level index a hierarchy may declare (level0..level4).
pub const MAX_DEPTH: usize = 4;

pub type FileFn = dyn Fn(&Context) -> Result<Sample, BuildError> + Send + Sync;
pub type FolderFn = dyn Fn(&Context, Tortilla) -> Result<Sample, BuildError> + Send + Sync;

#[derive(Clone)]
enum BuilderFn {
    File(Arc<FileFn>),
    Folder(Arc<FolderFn>),
}

/// One declared sample builder.
#[derive(Clone)]
pub struct SampleBuilder {
    name: String,
    func: BuilderFn,
}

impl SampleBuilder {
    /// Leaf builder: maps a context to a file-like sample.
    pub fn file<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Context) -> Result<Sample, BuildError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: BuilderFn::File(Arc::new(f)),
        }
    }

    /// Folder builder: receives the tortilla built by the next level.
    pub fn folder<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Context, Tortilla) -> Result<Sample, BuildError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: BuilderFn::Folder(Arc::new(f)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.func, BuilderFn::Folder(_))
    }
}

impl fmt::Debug for SampleBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleBuilder")
            .field("name", &self.name)
            .field("folder", &self.is_folder())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Level {
    name: String,
    builders: Vec<SampleBuilder>,
    options: TortillaOptions,
}

impl Level {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            builders: Vec::new(),
            options: TortillaOptions::default(),
        }
    }

    pub fn with_builder(mut self, builder: SampleBuilder) -> Self {
        self.builders.push(builder);
        self
    }

    pub fn with_options(mut self, options: TortillaOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn builders(&self) -> &[SampleBuilder] {
        &self.builders
    }

    pub fn options(&self) -> TortillaOptions {
        self.options
    }
}

#[derive(Debug, Clone)]
pub struct Hierarchy {
    levels: Vec<Level>,
}

impl Hierarchy {
    pub fn new(levels: Vec<Level>) -> Result<Self, BuildError> {
        if levels.is_empty() {
            return Err(BuildError::Hierarchy("at least one level is required".into()));
        }
        if levels.len() > MAX_DEPTH + 1 {
            return Err(BuildError::Hierarchy(format!(
                "{} levels declared, at most {} are supported",
                levels.len(),
                MAX_DEPTH + 1
            )));
        }
        for (depth, level) in levels.iter().enumerate() {
            if level.builders.is_empty() {
                return Err(BuildError::Hierarchy(format!(
                    "level {depth} ('{}') declares no builders",
                    level.name
                )));
            }
        }
        let last = levels.len() - 1;
        if let Some(folder) = levels[last].builders.iter().find(|b| b.is_folder()) {
            return Err(BuildError::Hierarchy(format!(
                "leaf level {last} declares folder builder '{}'",
                folder.name
            )));
        }
        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Index of the leaf level.
    pub fn max_depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn root(&self) -> &Level {
        &self.levels[0]
    }

    pub fn level(&self, depth: usize) -> Result<&Level, BuildError> {
        self.levels.get(depth).ok_or(BuildError::NoSuchLevel {
            depth,
            levels: self.levels.len(),
        })
    }

    /// Depth-0 samples for one context, one per root builder.
    pub fn root_samples(&self, ctx: &Context) -> Result<Vec<Sample>, BuildError> {
        self.root()
            .builders
            .iter()
            .map(|builder| self.run_builder(0, builder, ctx))
            .collect()
    }

    /// Build the tortilla of level `depth` for one context.
    ///
    /// Builders run in declaration order; the first error is returned as is
    /// and no partial tortilla is produced.
    pub fn build_level(&self, depth: usize, ctx: &Context) -> Result<Tortilla, BuildError> {
        let level = self.level(depth)?;
        let samples = level
            .builders
            .iter()
            .map(|builder| self.run_builder(depth, builder, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(depth, level = %level.name, samples = samples.len(), "[LEVEL] Built level");
        Ok(Tortilla::new(samples, level.options)?)
    }

    /// Run one builder of level `depth`, recursing first for folder builders.
    pub fn run_builder(
        &self,
        depth: usize,
        builder: &SampleBuilder,
        ctx: &Context,
    ) -> Result<Sample, BuildError> {
        match &builder.func {
            BuilderFn::File(f) => f(ctx),
            BuilderFn::Folder(f) => {
                let child = self.build_level(depth + 1, ctx)?;
                f(ctx, child)
            }
        }
    }

    /// Every root sample produced by the same root builder must share the
    /// sample ids of its subtree position by position.
    ///
    /// `outcomes` holds, per successful context, its id and its root samples
    /// in builder order.
    pub fn check_positional_identity(
        &self,
        outcomes: &[(String, Vec<Sample>)],
    ) -> Result<(), BuildError> {
        for position in 0..self.root().builders.len() {
            let mut reference: Option<&Tortilla> = None;
            for (context_id, samples) in outcomes {
                let Some(child) = samples.get(position).and_then(Sample::child) else {
                    continue;
                };
                match reference {
                    None => reference = Some(child),
                    Some(expected) => compare_layout(expected, child, 1, context_id)?,
                }
            }
        }
        Ok(())
    }
}

fn describe(sample: Option<&Sample>) -> String {
    match sample {
        Some(s) => format!("{} ({})", s.id(), s.kind()),
        None => "<none>".to_string(),
    }
}

fn compare_layout(
    expected: &Tortilla,
    found: &Tortilla,
    depth: usize,
    context_id: &str,
) -> Result<(), BuildError> {
    let width = expected.len().max(found.len());
    for position in 0..width {
        let left = expected.samples().get(position);
        let right = found.samples().get(position);
        let mismatch = || BuildError::VaryingSampleId {
            depth,
            position,
            expected: describe(left),
            found: describe(right),
            context_id: context_id.to_string(),
        };
        let (Some(left_sample), Some(right_sample)) = (left, right) else {
            return Err(mismatch());
        };
        if left_sample.id() != right_sample.id() || left_sample.kind() != right_sample.kind() {
            return Err(mismatch());
        }
        if let (Some(l), Some(r)) = (left_sample.child(), right_sample.child()) {
            compare_layout(l, r, depth + 1, context_id)?;
        }
    }
    Ok(())
}
