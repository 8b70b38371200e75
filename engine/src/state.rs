//! Process-wide state and the [`FileLoader`] entry point that wires the
//! engine together for the UI: detection, mapping, background index and
//! schema builds, and view construction over the current action stack.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::filter::FilterRowIndexer;
use crate::format::{detect, DataFormat};
use crate::index::{CsvRowIndexer, JsonLinesRowIndexer, RowIndex};
use crate::reader::{CsvFilterSource, CsvRowFetcher, FilterCellSource, JsonlFilterSource, JsonlRowFetcher};
use crate::schema::{
    scan_csv_schema, scan_jsonl_schema, CsvBackgroundScanner, JsonlBackgroundScanner, SchemaSlot,
    INITIAL_SCAN_ROWS,
};
use crate::source::MmapSource;
use crate::table::{CsvTableSource, JsonlTableSource, TableSource};
use crate::transform::{ActionStack, LazyTransformer, MorphAction};
use crate::{Error, MorphResult};

/// How a loaded file is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// Row-and-column table view
    Table,
    /// Tree navigation over JSON shapes
    Tree,
}

/// The error slot background tasks report into; the UI polls it for the
/// dedicated error view.
#[derive(Debug, Clone, Default)]
pub struct ErrorSlot(Arc<Mutex<Option<String>>>);

impl ErrorSlot {
    pub fn set(&self, message: impl ToString) {
        let mut slot = match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(message.to_string());
    }

    pub fn get(&self) -> Option<String> {
        let slot = match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.clone()
    }

    pub fn clear(&self) {
        let mut slot = match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = None;
    }
}

/// Everything the UI needs about the currently loaded file. Created once at
/// startup; reset by every successful load. Mutated only from the UI thread;
/// the slots inside are the only cross-task cells.
pub struct AppState {
    pub current_file_path: Option<PathBuf>,
    pub current_mode: ViewMode,
    pub format: Option<DataFormat>,
    pub source: Option<Arc<MmapSource>>,
    pub schema: SchemaSlot,
    pub row_index: Option<Arc<RowIndex>>,
    pub action_stack: ActionStack,
    pub cancellation: CancellationToken,
    pub last_error: ErrorSlot,
    jsonl_scan_started: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            current_file_path: None,
            current_mode: ViewMode::Table,
            format: None,
            source: None,
            schema: SchemaSlot::new(),
            row_index: None,
            action_stack: ActionStack::new(),
            cancellation: CancellationToken::new(),
            last_error: ErrorSlot::default(),
            jsonl_scan_started: false,
        }
    }

    /// Append `action` to the stack. Holders of the previous stack are
    /// unaffected; callers rebuild their view through
    /// [`FileLoader::build_view`].
    pub fn append_action(&mut self, action: MorphAction) {
        self.action_stack = self.action_stack.push(action);
    }

    /// Whether a filter action may be added: the row index must be finished
    /// so the filter scan sees a final row count.
    pub fn can_apply_filter(&self) -> bool {
        self.row_index.as_ref().is_some_and(|index| index.is_complete())
    }
}

/// Loads files into an [`AppState`] and builds table views over them.
/// Background work is dispatched on the held runtime handle, the way the UI
/// shell owns one multi-threaded runtime for the whole process.
pub struct FileLoader {
    handle: tokio::runtime::Handle,
}

impl FileLoader {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Detect, map, and start background builds for `path`. On success the
    /// state is fully reset (empty action stack, cleared error); on failure
    /// the previous state is kept and `last_error` is set.
    pub fn load(&self, state: &mut AppState, path: impl AsRef<Path>) -> MorphResult<()> {
        let path = path.as_ref();
        match self.try_load(state, path) {
            Ok(()) => Ok(()),
            Err(e) => {
                state.last_error.set(&e);
                Err(e)
            }
        }
    }

    fn try_load(&self, state: &mut AppState, path: &Path) -> MorphResult<()> {
        let format = detect(|| Ok(std::fs::File::open(path)?))?;
        let source = MmapSource::open(path)?;

        // stop whatever the previous file still had running
        state.cancellation.cancel();
        let cancellation = CancellationToken::new();
        let schema = SchemaSlot::new();
        let last_error = state.last_error.clone();
        last_error.clear();

        let (row_index, mode) = match format {
            DataFormat::Csv => {
                let indexer = CsvRowIndexer::new(source.clone())?;
                let index = indexer.index();

                schema.publish(initial_csv_schema(&source)?);
                let scanner = CsvBackgroundScanner::new(source.clone(), schema.clone());
                let scan_cancel = cancellation.child_token();
                let scan_errors = last_error.clone();
                self.handle.spawn(async move {
                    if let Err(e) = scanner.run(scan_cancel).await {
                        error!(error = %e, "csv schema refinement failed");
                        scan_errors.set(e);
                    }
                });

                let build_cancel = cancellation.child_token();
                let build_errors = last_error.clone();
                self.handle.spawn(async move {
                    if let Err(e) = indexer.build_index(build_cancel).await {
                        error!(error = %e, "csv index build failed");
                        build_errors.set(e);
                    }
                });
                (Some(index), ViewMode::Table)
            }
            DataFormat::JsonLines => {
                let indexer = JsonLinesRowIndexer::new(source.clone());
                let index = indexer.index();
                let build_cancel = cancellation.child_token();
                let build_errors = last_error.clone();
                self.handle.spawn(async move {
                    if let Err(e) = indexer.build_index(build_cancel).await {
                        error!(error = %e, "jsonl index build failed");
                        build_errors.set(e);
                    }
                });
                // schema is deferred until the first toggle into table mode
                (Some(index), ViewMode::Tree)
            }
            DataFormat::JsonArray | DataFormat::JsonObject => (None, ViewMode::Tree),
        };

        info!(path = %path.display(), ?format, ?mode, "loaded file");
        state.current_file_path = Some(path.to_path_buf());
        state.current_mode = mode;
        state.format = Some(format);
        state.source = Some(source);
        state.schema = schema;
        state.row_index = row_index;
        state.action_stack = ActionStack::new();
        state.cancellation = cancellation;
        state.jsonl_scan_started = false;
        Ok(())
    }

    /// Flip a JSON Lines source between tree and table. The first entry into
    /// table mode kicks off the lazy schema scan.
    pub fn toggle_table_mode(&self, state: &mut AppState) -> MorphResult<()> {
        if state.format != Some(DataFormat::JsonLines) {
            return Err(Error::generic(
                "table mode toggle only applies to JSON Lines sources",
            ));
        }
        if state.current_mode == ViewMode::Table {
            state.current_mode = ViewMode::Tree;
            return Ok(());
        }
        if !state.jsonl_scan_started {
            let source = state
                .source
                .clone()
                .ok_or_else(|| Error::generic("no file loaded"))?;
            state.jsonl_scan_started = true;
            schema_scan_jsonl(
                &self.handle,
                source,
                state.schema.clone(),
                state.cancellation.child_token(),
                state.last_error.clone(),
            );
        }
        state.current_mode = ViewMode::Table;
        Ok(())
    }

    /// Build the table view for the current schema and action stack: the raw
    /// source when the stack is empty, otherwise a [`LazyTransformer`] over
    /// it, with a filter index build started when the stack holds filters.
    /// Returns `None` while no schema has been published yet.
    pub fn build_view(&self, state: &AppState) -> MorphResult<Option<Box<dyn TableSource>>> {
        let (Some(schema), Some(source), Some(index)) = (
            state.schema.load(),
            state.source.clone(),
            state.row_index.clone(),
        ) else {
            return Ok(None);
        };

        let raw: Box<dyn TableSource> = match schema.source_format() {
            DataFormat::Csv => Box::new(CsvTableSource::new(source.clone(), index.clone(), &schema)),
            DataFormat::JsonLines => {
                Box::new(JsonlTableSource::new(source.clone(), index.clone(), &schema))
            }
            other => {
                return Err(Error::generic(format!(
                    "no table view over a {other} source"
                )))
            }
        };
        if state.action_stack.is_empty() {
            return Ok(Some(raw));
        }

        let mut transformer = LazyTransformer::new(raw, &schema, &state.action_stack);
        if transformer.has_filters() {
            if !index.is_complete() {
                // the gate the UI enforces through can_apply_filter
                warn!("filter requested before the row index finished");
            }
            let filter_index = Arc::new(FilterRowIndexer::new(transformer.filter_specs().to_vec()));
            let dedicated: Box<dyn FilterCellSource> = match schema.source_format() {
                DataFormat::Csv => Box::new(CsvFilterSource(CsvRowFetcher::new(
                    source.clone(),
                    index.clone(),
                    schema.len(),
                ))),
                _ => Box::new(JsonlFilterSource {
                    fetcher: JsonlRowFetcher::new(source.clone(), index.clone()),
                    column_names: schema.column_names(),
                }),
            };
            let total_rows = index.total_rows();
            let cancel = state.cancellation.child_token();
            let errors = state.last_error.clone();
            let build_index = filter_index.clone();
            self.handle.spawn(async move {
                if let Err(e) = build_index.build_index(dedicated, total_rows, cancel).await {
                    error!(error = %e, "filter index build failed");
                    errors.set(e);
                }
            });
            transformer.attach_filter_index(filter_index);
        }
        Ok(Some(Box::new(transformer)))
    }
}

/// The initial bounded schema scan for a CSV load: header plus the first
/// [`INITIAL_SCAN_ROWS`] records, read straight off the map.
fn initial_csv_schema(source: &MmapSource) -> MorphResult<crate::schema::SchemaRef> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(source.tail(0)?);
    let names: Vec<String> = reader
        .headers()?
        .iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::with_capacity(INITIAL_SCAN_ROWS);
    let mut record = csv::StringRecord::new();
    while rows.len() < INITIAL_SCAN_ROWS && reader.read_record(&mut record)? {
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }
    scan_csv_schema(&names, &rows)
}

/// The lazy JSONL schema scan: a bounded initial scan published immediately,
/// then background refinement over the rest of the file.
fn schema_scan_jsonl(
    handle: &tokio::runtime::Handle,
    source: Arc<MmapSource>,
    slot: SchemaSlot,
    cancel: CancellationToken,
    errors: ErrorSlot,
) {
    handle.spawn(async move {
        let initial = {
            let bytes = match source.tail(0) {
                Ok(bytes) => bytes,
                Err(e) => {
                    errors.set(&e);
                    return;
                }
            };
            scan_jsonl_schema(crate::reader::split_lines(bytes))
        };
        match initial {
            Ok(schema) => slot.publish(schema),
            Err(e) => {
                error!(error = %e, "jsonl schema scan failed");
                errors.set(e);
                return;
            }
        }
        let scanner = JsonlBackgroundScanner::new(source, slot);
        if let Err(e) = scanner.run(cancel).await {
            error!(error = %e, "jsonl schema refinement failed");
            errors.set(e);
        }
    });
}
