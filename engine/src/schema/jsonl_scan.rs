//! Schema scanning for JSON Lines sources. Columns are the first-seen union
//! of object keys across lines; nullability is derived from how often a key
//! was observed with a non-null value.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{
    infer::infer_type, resolve::resolve, ColumnSchema, ColumnType, SchemaRef, SchemaSlot,
    TableSchema, INITIAL_SCAN_ROWS,
};
use crate::format::DataFormat;
use crate::index::CHECKPOINT_INTERVAL;
use crate::reader::split_lines;
use crate::source::MmapSource;
use crate::{Error, MorphResult};

/// Derive a schema from the first [`INITIAL_SCAN_ROWS`] lines.
pub fn scan_schema<'a>(lines: impl IntoIterator<Item = &'a [u8]>) -> MorphResult<SchemaRef> {
    scan_schema_with_limit(lines, INITIAL_SCAN_ROWS)
}

/// [`scan_schema`] with an explicit line limit. Lines that do not parse as a
/// JSON object are silently skipped; if every line is skipped the scan fails.
pub fn scan_schema_with_limit<'a>(
    lines: impl IntoIterator<Item = &'a [u8]>,
    initial_scan_count: usize,
) -> MorphResult<SchemaRef> {
    struct KeyState {
        column_type: ColumnType,
        observed: u64,
    }

    let mut keys: IndexMap<String, KeyState> = IndexMap::new();
    let mut lines_scanned: u64 = 0;

    for line in lines.into_iter().take(initial_scan_count) {
        let Ok(Value::Object(object)) = serde_json::from_slice::<Value>(line) else {
            continue;
        };
        lines_scanned += 1;
        for (key, value) in &object {
            match observed_type(value) {
                None => {
                    // null seeds unknown keys as text and is not an observation
                    keys.entry(key.clone()).or_insert(KeyState {
                        column_type: ColumnType::Text,
                        observed: 0,
                    });
                }
                Some(observed) => match keys.get_mut(key) {
                    Some(state) => {
                        state.column_type = resolve(state.column_type, observed);
                        state.observed += 1;
                    }
                    None => {
                        keys.insert(
                            key.clone(),
                            KeyState {
                                column_type: observed,
                                observed: 1,
                            },
                        );
                    }
                },
            }
        }
    }

    if lines_scanned == 0 {
        return Err(Error::schema("no JSON object lines found in scan"));
    }

    let columns = keys
        .into_iter()
        .enumerate()
        .map(|(i, (name, state))| {
            Arc::new(ColumnSchema::new(
                name,
                state.column_type,
                state.observed < lines_scanned,
                i,
            ))
        })
        .collect();
    Ok(Arc::new(TableSchema::try_from_arcs(
        columns,
        DataFormat::JsonLines,
    )?))
}

/// Fold one line into the schema. Keys absent from the line (or present as
/// null) mark their column nullable; keys new to the schema are appended as
/// nullable. Returns the same instance when nothing changed.
pub fn refine_schema(schema: &SchemaRef, line: &[u8]) -> SchemaRef {
    let Ok(Value::Object(object)) = serde_json::from_slice::<Value>(line) else {
        return schema.clone();
    };

    let mut columns = schema.columns().to_vec();
    let mut seen = vec![false; columns.len()];
    for (key, value) in &object {
        let position = columns.iter().position(|c| c.name() == key.as_str());
        match (position, observed_type(value)) {
            (Some(i), Some(observed)) => {
                seen[i] = true;
                let resolved = resolve(columns[i].column_type(), observed);
                columns[i] = columns[i].clone().with_updated_type(resolved);
            }
            // null counts as absent for nullability
            (Some(_), None) => {}
            (None, observed) => {
                // absent from every prior line, so nullable from the start
                columns.push(Arc::new(ColumnSchema::new(
                    key.clone(),
                    observed.unwrap_or(ColumnType::Text),
                    true,
                    columns.len(),
                )));
            }
        }
    }
    for (i, seen) in seen.into_iter().enumerate() {
        if !seen {
            columns[i] = columns[i].clone().with_marked_nullable();
        }
    }
    TableSchema::rebuilt(schema, columns)
}

fn observed_type(value: &Value) -> Option<ColumnType> {
    match value {
        Value::Null => None,
        Value::Object(_) => Some(ColumnType::JsonObject),
        Value::Array(_) => Some(ColumnType::JsonArray),
        Value::Bool(_) => Some(ColumnType::Boolean),
        Value::Number(n) => Some(infer_type(&n.to_string())),
        Value::String(s) => Some(infer_type(s)),
    }
}

/// Continues refinement past the initial scan on a background task.
pub struct JsonlBackgroundScanner {
    source: Arc<MmapSource>,
    slot: SchemaSlot,
}

impl JsonlBackgroundScanner {
    pub fn new(source: Arc<MmapSource>, slot: SchemaSlot) -> Self {
        Self { source, slot }
    }

    /// Stream every line through [`refine_schema`], yielding every
    /// [`CHECKPOINT_INTERVAL`] lines. Requires an initial schema to already
    /// be published.
    pub async fn run(&self, cancel: CancellationToken) -> MorphResult<()> {
        let Some(mut schema) = self.slot.load() else {
            return Ok(());
        };
        let mut lines: u64 = 0;
        for line in split_lines(self.source.tail(0)?) {
            let refined = refine_schema(&schema, line);
            if !Arc::ptr_eq(&refined, &schema) {
                self.slot.publish(refined.clone());
                schema = refined;
            }
            lines += 1;
            if lines % CHECKPOINT_INTERVAL == 0 {
                if cancel.is_cancelled() {
                    debug!(lines, "jsonl schema refinement cancelled");
                    return Ok(());
                }
                tokio::task::yield_now().await;
            }
        }
        info!(lines, "jsonl schema refinement complete");
        Ok(())
    }
}
