pub mod cli;
pub mod config;
pub mod context;
pub mod datamodel;
pub mod demo;
pub mod errors;
pub mod extensions;
pub mod hierarchy;
pub mod load_config;
pub mod packager;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod root;
pub mod validate;

pub use context::{load_contexts, Context, ContextProvider, Limit};
pub use datamodel::{Sample, Taco, Tortilla, TortillaOptions};
pub use errors::{BuildError, SchemaError};
pub use hierarchy::{Hierarchy, Level, SampleBuilder};
pub use root::{BuildOverrides, RootBuild, RootBuilder};
