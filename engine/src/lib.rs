//! The DataMorph data engine: the subsystem that makes a multi-gigabyte CSV
//! or JSON file openable in under a second, scrollable without lag, and
//! transformable through a stack of reversible column operations, all within
//! a bounded memory footprint.
//!
//! The pieces compose leaves-first:
//!
//! - [`format::detect`] classifies the input as CSV, JSON Lines, a JSON
//!   array, or a single JSON object.
//! - [`source::MmapSource`] maps the file; everything downstream reads
//!   through it at its own offsets.
//! - [`index::CsvRowIndexer`] / [`index::JsonLinesRowIndexer`] build a
//!   checkpointed byte-offset index on a background task while the UI is
//!   already interactive.
//! - [`schema`] infers typed column schemas from a bounded initial scan and
//!   keeps refining them, copy-on-write, in the background.
//! - [`cache::RowByteCache`] plus the fetchers in [`reader`] and the
//!   [`cell`] extractor turn checkpoints into cell values on demand.
//! - [`transform::LazyTransformer`] applies the current
//!   [`transform::ActionStack`] over any [`table::TableSource`];
//!   [`filter::FilterRowIndexer`] materializes matched rows for filter
//!   actions asynchronously.
//! - [`recipe`] persists action stacks as named, hand-editable recipes.
//! - [`state::FileLoader`] and [`state::AppState`] wire it all to the UI.

pub mod cache;
pub mod cell;
pub mod error;
pub mod filter;
pub mod format;
pub mod index;
pub mod reader;
pub mod recipe;
pub mod schema;
pub mod source;
pub mod state;
pub mod table;
pub mod transform;

pub use error::{Error, MorphResult};
pub use format::{detect, DataFormat};
pub use index::RowIndex;
pub use recipe::Recipe;
pub use schema::{ColumnSchema, ColumnType, SchemaRef, TableSchema};
pub use source::MmapSource;
pub use state::{AppState, FileLoader, ViewMode};
pub use table::TableSource;
pub use transform::{ActionStack, FilterOperator, LazyTransformer, MorphAction};
