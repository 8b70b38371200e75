//! The [`TableSource`] capability published to the UI, and its two concrete
//! implementations over indexed files. `rows` is live: it mirrors the
//! background indexer's counter while a build runs.

use std::sync::Arc;

use crate::cache::RowByteCache;
use crate::cell::extract_cell;
use crate::index::RowIndex;
use crate::reader::{CsvRowFetcher, JsonlRowFetcher};
use crate::schema::SchemaRef;
use crate::source::MmapSource;
use crate::{Error, MorphResult};

/// Cell-level access to a table. `cell` takes `&mut self` because the
/// backing cache slides its window; access is single-threaded by contract.
pub trait TableSource: Send {
    /// Live row count; grows while the index build is running.
    fn rows(&self) -> u64;

    fn columns(&self) -> usize;

    fn column_names(&self) -> &[String];

    /// The display value at `(row, col)`. Rows not yet indexed read as empty;
    /// a column outside the schema is an error.
    fn cell(&mut self, row: u64, col: usize) -> MorphResult<String>;
}

/// CSV table access: rows are materialized by a strict reader into
/// fixed-width cell vectors and cached in a sliding window.
pub struct CsvTableSource {
    names: Vec<String>,
    cache: RowByteCache<Vec<String>>,
}

impl CsvTableSource {
    pub fn new(source: Arc<MmapSource>, index: Arc<RowIndex>, schema: &SchemaRef) -> Self {
        let names = schema.column_names();
        let fetcher = CsvRowFetcher::new(source, index.clone(), names.len());
        Self {
            names,
            cache: RowByteCache::new(Box::new(fetcher), index),
        }
    }
}

impl TableSource for CsvTableSource {
    fn rows(&self) -> u64 {
        self.cache.total_rows()
    }

    fn columns(&self) -> usize {
        self.names.len()
    }

    fn column_names(&self) -> &[String] {
        &self.names
    }

    fn cell(&mut self, row: u64, col: usize) -> MorphResult<String> {
        if col >= self.names.len() {
            return Err(Error::CellOutOfRange { row, col });
        }
        Ok(self
            .cache
            .get_row(row)?
            .and_then(|cells| cells.get(col).cloned())
            .unwrap_or_default())
    }
}

/// JSON Lines table access: the cache holds raw line bytes and cells are
/// extracted on demand by a forward scan keyed on the column name.
pub struct JsonlTableSource {
    names: Vec<String>,
    cache: RowByteCache<Vec<u8>>,
}

impl JsonlTableSource {
    pub fn new(source: Arc<MmapSource>, index: Arc<RowIndex>, schema: &SchemaRef) -> Self {
        let fetcher = JsonlRowFetcher::new(source, index.clone());
        Self {
            names: schema.column_names(),
            cache: RowByteCache::new(Box::new(fetcher), index),
        }
    }
}

impl TableSource for JsonlTableSource {
    fn rows(&self) -> u64 {
        self.cache.total_rows()
    }

    fn columns(&self) -> usize {
        self.names.len()
    }

    fn column_names(&self) -> &[String] {
        &self.names
    }

    fn cell(&mut self, row: u64, col: usize) -> MorphResult<String> {
        let Some(name) = self.names.get(col) else {
            return Err(Error::CellOutOfRange { row, col });
        };
        Ok(match self.cache.get_row(row)? {
            Some(line) => extract_cell(line, name.as_bytes()),
            None => String::new(),
        })
    }
}
