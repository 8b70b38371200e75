//! Schema scanning for CSV sources: an initial bounded scan that seeds the
//! schema from the first usable row, then per-row refinement that the
//! background scanner keeps running over the rest of the file.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{
    infer::infer_type, resolve::resolve, ColumnSchema, ColumnType, SchemaRef, SchemaSlot,
    TableSchema, INITIAL_SCAN_ROWS,
};
use crate::format::DataFormat;
use crate::index::CHECKPOINT_INTERVAL;
use crate::source::MmapSource;
use crate::MorphResult;

/// Derive a schema from the header names and the first
/// [`INITIAL_SCAN_ROWS`] rows.
pub fn scan_schema(column_names: &[String], rows: &[Vec<String>]) -> MorphResult<SchemaRef> {
    scan_schema_with_limit(column_names, rows, INITIAL_SCAN_ROWS)
}

/// [`scan_schema`] with an explicit row limit. Rows whose width differs from
/// the header are skipped; empty header names become `Column{i+1}`.
pub fn scan_schema_with_limit(
    column_names: &[String],
    rows: &[Vec<String>],
    initial_scan_count: usize,
) -> MorphResult<SchemaRef> {
    let names: Vec<String> = column_names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            if name.trim().is_empty() {
                format!("Column{}", i + 1)
            } else {
                name.clone()
            }
        })
        .collect();

    let mut usable = rows
        .iter()
        .take(initial_scan_count)
        .filter(|row| row.len() == names.len());

    let columns: Vec<ColumnSchema> = match usable.next() {
        // the first usable row seeds each column's type
        Some(first) => names
            .iter()
            .zip(first)
            .enumerate()
            .map(|(i, (name, cell))| {
                let empty = cell.trim().is_empty();
                let column_type = if empty { ColumnType::Text } else { infer_type(cell) };
                ColumnSchema::new(name, column_type, empty, i)
            })
            .collect(),
        // header-only input: everything is nullable text
        None => names
            .iter()
            .enumerate()
            .map(|(i, name)| ColumnSchema::new(name, ColumnType::Text, true, i))
            .collect(),
    };

    let mut schema: SchemaRef = Arc::new(TableSchema::try_from_arcs(
        columns.into_iter().map(Arc::new).collect(),
        DataFormat::Csv,
    )?);
    for row in usable {
        schema = refine_schema(&schema, row);
    }
    Ok(schema)
}

/// Fold one row into the schema. Returns the same instance when no cell
/// changed any column's type or nullability; a width-mismatched row is
/// skipped outright.
pub fn refine_schema(schema: &SchemaRef, row: &[String]) -> SchemaRef {
    if row.len() != schema.len() {
        return schema.clone();
    }
    let columns = schema
        .columns()
        .iter()
        .cloned()
        .zip(row)
        .map(|(column, cell)| {
            if cell.trim().is_empty() {
                column.with_marked_nullable()
            } else {
                let resolved = resolve(column.column_type(), infer_type(cell));
                column.with_updated_type(resolved)
            }
        })
        .collect();
    TableSchema::rebuilt(schema, columns)
}

/// Continues refinement past the initial scan on a background task,
/// republishing through the [`SchemaSlot`] only when a row actually changed
/// something.
pub struct CsvBackgroundScanner {
    source: Arc<MmapSource>,
    slot: SchemaSlot,
}

impl CsvBackgroundScanner {
    pub fn new(source: Arc<MmapSource>, slot: SchemaSlot) -> Self {
        Self { source, slot }
    }

    /// Stream every record through [`refine_schema`], yielding every
    /// [`CHECKPOINT_INTERVAL`] rows. Requires an initial schema to already be
    /// published.
    pub async fn run(&self, cancel: CancellationToken) -> MorphResult<()> {
        let Some(mut schema) = self.slot.load() else {
            return Ok(());
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(self.source.tail(0)?);

        let mut record = csv::StringRecord::new();
        let mut row_buf: Vec<String> = Vec::with_capacity(schema.len());
        let mut rows: u64 = 0;
        while reader.read_record(&mut record)? {
            row_buf.clear();
            row_buf.extend(record.iter().map(str::to_string));
            let refined = refine_schema(&schema, &row_buf);
            if !Arc::ptr_eq(&refined, &schema) {
                self.slot.publish(refined.clone());
                schema = refined;
            }
            rows += 1;
            if rows % CHECKPOINT_INTERVAL == 0 {
                if cancel.is_cancelled() {
                    debug!(rows, "csv schema refinement cancelled");
                    return Ok(());
                }
                tokio::task::yield_now().await;
            }
        }
        info!(rows, "csv schema refinement complete");
        Ok(())
    }
}
