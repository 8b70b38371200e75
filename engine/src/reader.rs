//! On-demand row readers. Fetchers are positioned through
//! [`RowIndex::get_checkpoint`]: seek to the checkpointed offset, step over
//! the remainder, then materialize the requested rows. Each fetcher reads the
//! shared map at its own offsets, so the display cache, the filter scan, and
//! the schema scan never fight over a file position.

use std::sync::Arc;

use memchr::memchr;

use crate::cache::RowFetcher;
use crate::cell::extract_cell;
use crate::index::RowIndex;
use crate::source::MmapSource;
use crate::MorphResult;

/// Iterate `\n`-separated lines, with any trailing `\r` stripped. A final
/// unterminated line is yielded too.
pub(crate) fn split_lines(bytes: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = Some(bytes);
    std::iter::from_fn(move || {
        let remaining = rest?;
        if remaining.is_empty() {
            rest = None;
            return None;
        }
        let line = match memchr(b'\n', remaining) {
            Some(at) => {
                rest = Some(&remaining[at + 1..]);
                &remaining[..at]
            }
            None => {
                rest = None;
                remaining
            }
        };
        Some(line.strip_suffix(b"\r").unwrap_or(line))
    })
}

/// Materializes CSV rows as fixed-width cell vectors. Ragged rows are padded
/// or truncated to `column_count`; missing cells read as empty.
pub struct CsvRowFetcher {
    source: Arc<MmapSource>,
    index: Arc<RowIndex>,
    column_count: usize,
}

impl CsvRowFetcher {
    pub fn new(source: Arc<MmapSource>, index: Arc<RowIndex>, column_count: usize) -> Self {
        Self {
            source,
            index,
            column_count,
        }
    }
}

impl RowFetcher<Vec<String>> for CsvRowFetcher {
    fn fetch(&mut self, start_row: u64, count: usize) -> MorphResult<Vec<Vec<String>>> {
        let (offset, skip) = self.index.get_checkpoint(start_row);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(self.source.tail(offset)?);

        let mut record = csv::StringRecord::new();
        for _ in 0..skip {
            if !reader.read_record(&mut record)? {
                return Ok(Vec::new());
            }
        }
        let mut rows = Vec::with_capacity(count);
        for _ in 0..count {
            if !reader.read_record(&mut record)? {
                break;
            }
            let mut cells: Vec<String> = record.iter().map(str::to_string).collect();
            cells.resize(self.column_count, String::new());
            rows.push(cells);
        }
        Ok(rows)
    }
}

/// Materializes JSON Lines rows as raw line bytes for [`extract_cell`].
pub struct JsonlRowFetcher {
    source: Arc<MmapSource>,
    index: Arc<RowIndex>,
}

impl JsonlRowFetcher {
    pub fn new(source: Arc<MmapSource>, index: Arc<RowIndex>) -> Self {
        Self { source, index }
    }
}

impl RowFetcher<Vec<u8>> for JsonlRowFetcher {
    fn fetch(&mut self, start_row: u64, count: usize) -> MorphResult<Vec<Vec<u8>>> {
        let (offset, skip) = self.index.get_checkpoint(start_row);
        Ok(split_lines(self.source.tail(offset)?)
            .skip(skip as usize)
            .take(count)
            .map(<[u8]>::to_vec)
            .collect())
    }
}

/// Batched access to the raw cells the filter scan evaluates, routed through
/// a dedicated fetcher so the display window is left alone.
pub trait FilterCellSource: Send {
    /// For each row in `start_row..start_row + count`, the raw values of the
    /// requested source columns, in the order given. Fewer rows mean EOF.
    fn fetch_cells(
        &mut self,
        start_row: u64,
        count: usize,
        columns: &[usize],
    ) -> MorphResult<Vec<Vec<String>>>;
}

pub struct CsvFilterSource(pub CsvRowFetcher);

impl FilterCellSource for CsvFilterSource {
    fn fetch_cells(
        &mut self,
        start_row: u64,
        count: usize,
        columns: &[usize],
    ) -> MorphResult<Vec<Vec<String>>> {
        let rows = self.0.fetch(start_row, count)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|&c| row.get(c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect())
    }
}

pub struct JsonlFilterSource {
    pub fetcher: JsonlRowFetcher,
    /// Source column names, indexed by source column position.
    pub column_names: Vec<String>,
}

impl FilterCellSource for JsonlFilterSource {
    fn fetch_cells(
        &mut self,
        start_row: u64,
        count: usize,
        columns: &[usize],
    ) -> MorphResult<Vec<Vec<String>>> {
        let lines = self.fetcher.fetch(start_row, count)?;
        Ok(lines
            .into_iter()
            .map(|line| {
                columns
                    .iter()
                    .map(|&c| match self.column_names.get(c) {
                        Some(name) => extract_cell(&line, name.as_bytes()),
                        None => String::new(),
                    })
                    .collect()
            })
            .collect())
    }
}
