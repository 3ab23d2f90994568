//! Sample, tortilla and taco types plus the typed tables their metadata is
//! expressed in.

mod extension;
mod sample;
mod table;
mod taco;
mod tortilla;

pub use extension::{Cell, Extension, RESERVED_FIELDS};
pub use sample::{Payload, Sample, SampleKind, PADDING_PREFIX};
pub use table::{DataType, Field, Schema, Table, Value};
pub use taco::{Collection, Contact, Publication, Taco};
pub use tortilla::{Tortilla, TortillaOptions};
