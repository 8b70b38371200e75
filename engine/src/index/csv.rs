//! Background row indexing for CSV sources. The scan is a quote-aware newline
//! search: vectorized via `memchr`, with quote parity carried across chunk
//! boundaries so delimiters and newlines inside quoted fields never split a
//! row. Checkpoints address data rows; the header line is stepped over once
//! at construction.

use std::sync::Arc;

use memchr::{memchr, memchr2};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{RowIndex, CHECKPOINT_INTERVAL, SCAN_CHUNK_SIZE};
use crate::source::MmapSource;
use crate::MorphResult;

#[derive(Debug)]
pub struct CsvRowIndexer {
    source: Arc<MmapSource>,
    index: Arc<RowIndex>,
    /// Offset of the first data row, just past the header terminator.
    data_start: u64,
}

impl CsvRowIndexer {
    /// Locates the end of the header line and seeds checkpoint 0 there, so
    /// `checkpoints[k]` is the start offset of data row `k * 1000` for every
    /// `k` including 0.
    pub fn new(source: Arc<MmapSource>) -> MorphResult<Self> {
        let data_start = header_end(&source)?;
        Ok(Self {
            index: Arc::new(RowIndex::new(data_start)),
            source,
            data_start,
        })
    }

    pub fn index(&self) -> Arc<RowIndex> {
        self.index.clone()
    }

    /// Scan the entire file once, publishing `total_rows` and a checkpoint
    /// every [`CHECKPOINT_INTERVAL`] rows. Yields to the scheduler on the
    /// same cadence; on cancellation the partial index stays usable.
    pub async fn build_index(&self, cancel: CancellationToken) -> MorphResult<()> {
        let len = self.source.len();
        let mut pos = self.data_start;
        let mut rows: u64 = 0;
        let mut in_quotes = false;

        while pos < len {
            let chunk_len = SCAN_CHUNK_SIZE.min((len - pos) as usize);
            let chunk = self.source.slice(pos, chunk_len)?;
            let mut i = 0;
            while i < chunk_len {
                let hit = if in_quotes {
                    memchr(b'"', &chunk[i..])
                } else {
                    memchr2(b'"', b'\n', &chunk[i..])
                };
                let Some(off) = hit else {
                    break;
                };
                let at = i + off;
                i = at + 1;
                if chunk[at] == b'"' {
                    in_quotes = !in_quotes;
                    continue;
                }
                rows += 1;
                if rows % CHECKPOINT_INTERVAL == 0 {
                    self.index.publish_rows(rows);
                    let after = pos + at as u64 + 1;
                    // a checkpoint at EOF would address a row that does not exist
                    if after < len {
                        self.index.push_checkpoint(after);
                    }
                    if cancel.is_cancelled() {
                        debug!(rows, "csv index build cancelled");
                        return Ok(());
                    }
                    tokio::task::yield_now().await;
                }
            }
            pos += chunk_len as u64;
            if cancel.is_cancelled() {
                debug!(rows, "csv index build cancelled");
                return Ok(());
            }
            tokio::task::yield_now().await;
        }

        // a final row with no trailing newline still counts
        if len > self.data_start && !in_quotes && self.source.slice(len - 1, 1)?[0] != b'\n' {
            rows += 1;
        }
        self.index.publish_rows(rows);
        self.index.mark_complete();
        info!(rows, path = %self.source.path().display(), "csv row index complete");
        Ok(())
    }
}

/// Offset just past the header line's terminator, honoring quoted fields that
/// may hold newlines. A header with no terminator puts the data start at EOF.
fn header_end(source: &MmapSource) -> MorphResult<u64> {
    let len = source.len();
    let mut pos = 0u64;
    let mut in_quotes = false;
    while pos < len {
        let chunk_len = SCAN_CHUNK_SIZE.min((len - pos) as usize);
        let chunk = source.slice(pos, chunk_len)?;
        let mut i = 0;
        while i < chunk_len {
            let hit = if in_quotes {
                memchr(b'"', &chunk[i..])
            } else {
                memchr2(b'"', b'\n', &chunk[i..])
            };
            let Some(off) = hit else {
                break;
            };
            let at = i + off;
            i = at + 1;
            if chunk[at] == b'"' {
                in_quotes = !in_quotes;
            } else {
                return Ok(pos + at as u64 + 1);
            }
        }
        pos += chunk_len as u64;
    }
    Ok(len)
}
