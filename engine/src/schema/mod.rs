//! Typed column schemas. [`TableSchema`] and [`ColumnSchema`] are immutable;
//! refinement returns the same instance when nothing changed and a new one
//! otherwise, so a stabilized schema stops allocating. The UI reads the
//! current schema through a [`SchemaSlot`], which background scanners
//! republish with a single reference swap.

use std::sync::{Arc, RwLock};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay, EnumString};

use crate::format::DataFormat;
use crate::{Error, MorphResult};

mod csv_scan;
mod infer;
mod jsonl_scan;
mod resolve;

pub use csv_scan::{refine_schema as refine_csv_schema, scan_schema as scan_csv_schema,
    scan_schema_with_limit as scan_csv_schema_with_limit, CsvBackgroundScanner};
pub use infer::{infer_type, parse_timestamp};
pub use jsonl_scan::{refine_schema as refine_jsonl_schema, scan_schema as scan_jsonl_schema,
    scan_schema_with_limit as scan_jsonl_schema_with_limit, JsonlBackgroundScanner};
pub use resolve::resolve;

/// How many rows or lines the initial schema scan reads before first
/// publication; background refinement continues past it.
pub const INITIAL_SCAN_ROWS: usize = 200;

pub type SchemaRef = Arc<TableSchema>;

/// The cell types a column can take. `Text` is the top of the promotion
/// lattice: every type unions with it, and with any incompatible type, to
/// `Text`.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
    EnumString,
    StrumDisplay,
    AsRefStr,
)]
pub enum ColumnType {
    Text,
    WholeNumber,
    FloatingPoint,
    Boolean,
    Timestamp,
    /// A nested object, surfaced as an opaque cell
    JsonObject,
    /// A nested array, surfaced as an opaque cell
    JsonArray,
}

/// One column. `name` and `column_index` are fixed at creation; `column_type`
/// and `is_nullable` evolve copy-on-write through [`Self::with_updated_type`]
/// and [`Self::with_marked_nullable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    name: String,
    column_type: ColumnType,
    is_nullable: bool,
    column_index: usize,
    display_format: Option<String>,
}

impl ColumnSchema {
    pub fn new(
        name: impl Into<String>,
        column_type: ColumnType,
        is_nullable: bool,
        column_index: usize,
    ) -> Self {
        Self {
            name: name.into(),
            column_type,
            is_nullable,
            column_index,
            display_format: None,
        }
    }

    pub fn with_display_format(mut self, display_format: impl Into<String>) -> Self {
        self.display_format = Some(display_format.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn is_nullable(&self) -> bool {
        self.is_nullable
    }

    pub fn column_index(&self) -> usize {
        self.column_index
    }

    pub fn display_format(&self) -> Option<&str> {
        self.display_format.as_deref()
    }

    /// Returns the same instance when `column_type` already matches.
    pub fn with_updated_type(self: Arc<Self>, column_type: ColumnType) -> Arc<Self> {
        if self.column_type == column_type {
            return self;
        }
        Arc::new(Self {
            column_type,
            ..(*self).clone()
        })
    }

    /// Returns the same instance when the column is already nullable.
    /// Nullability is monotone: there is no way back to non-nullable.
    pub fn with_marked_nullable(self: Arc<Self>) -> Arc<Self> {
        if self.is_nullable {
            return self;
        }
        Arc::new(Self {
            is_nullable: true,
            ..(*self).clone()
        })
    }
}

/// An immutable, ordered set of columns for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    columns: Vec<Arc<ColumnSchema>>,
    source_format: DataFormat,
}

impl TableSchema {
    /// Fails on duplicate column names or a column whose recorded index does
    /// not match its position.
    pub fn try_new(
        columns: impl IntoIterator<Item = ColumnSchema>,
        source_format: DataFormat,
    ) -> MorphResult<Self> {
        Self::try_from_arcs(columns.into_iter().map(Arc::new).collect(), source_format)
    }

    pub(crate) fn try_from_arcs(
        columns: Vec<Arc<ColumnSchema>>,
        source_format: DataFormat,
    ) -> MorphResult<Self> {
        if let Some(dup) = columns.iter().map(|c| c.name.as_str()).duplicates().next() {
            return Err(Error::schema(format!("duplicate column name `{dup}`")));
        }
        for (i, column) in columns.iter().enumerate() {
            if column.column_index != i {
                return Err(Error::schema(format!(
                    "column `{}` records index {} at position {i}",
                    column.name, column.column_index
                )));
            }
        }
        Ok(Self {
            columns,
            source_format,
        })
    }

    pub fn columns(&self) -> &[Arc<ColumnSchema>] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Arc<ColumnSchema>> {
        self.columns.get(index)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Arc<ColumnSchema>> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn source_format(&self) -> DataFormat {
        self.source_format
    }

    /// Rebuild `schema` with `columns`, returning the same instance when
    /// every column is pointer-equal to the current one (the no-change fast
    /// path the scanners rely on). New columns may only be appended.
    pub(crate) fn rebuilt(schema: &SchemaRef, columns: Vec<Arc<ColumnSchema>>) -> SchemaRef {
        if columns.len() == schema.columns.len()
            && columns
                .iter()
                .zip(&schema.columns)
                .all(|(a, b)| Arc::ptr_eq(a, b))
        {
            return schema.clone();
        }
        Arc::new(TableSchema {
            columns,
            source_format: schema.source_format,
        })
    }
}

/// The published-schema cell shared between background scanners and the UI.
/// Replacement is one reference swap under a short-held lock; readers clone
/// the [`Arc`] out and never observe a partially built schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaSlot(Arc<RwLock<Option<SchemaRef>>>);

impl SchemaSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, schema: SchemaRef) {
        let mut slot = match self.0.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(schema);
    }

    pub fn load(&self) -> Option<SchemaRef> {
        let slot = match self.0.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.clone()
    }

    pub fn clear(&self) {
        let mut slot = match self.0.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = None;
    }
}
