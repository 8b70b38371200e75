//! Background row indexing for JSON Lines sources. Identical to the CSV scan
//! minus the quote bookkeeping: every newline ends a row.

use std::sync::Arc;

use memchr::memchr_iter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{RowIndex, CHECKPOINT_INTERVAL, SCAN_CHUNK_SIZE};
use crate::source::MmapSource;
use crate::MorphResult;

#[derive(Debug)]
pub struct JsonLinesRowIndexer {
    source: Arc<MmapSource>,
    index: Arc<RowIndex>,
}

impl JsonLinesRowIndexer {
    pub fn new(source: Arc<MmapSource>) -> Self {
        Self {
            index: Arc::new(RowIndex::new(0)),
            source,
        }
    }

    pub fn index(&self) -> Arc<RowIndex> {
        self.index.clone()
    }

    /// Scan the entire file once, publishing `total_rows` and a checkpoint
    /// every [`CHECKPOINT_INTERVAL`] lines.
    pub async fn build_index(&self, cancel: CancellationToken) -> MorphResult<()> {
        let len = self.source.len();
        let mut pos = 0u64;
        let mut rows: u64 = 0;

        while pos < len {
            let chunk_len = SCAN_CHUNK_SIZE.min((len - pos) as usize);
            let chunk = self.source.slice(pos, chunk_len)?;
            for at in memchr_iter(b'\n', chunk) {
                rows += 1;
                if rows % CHECKPOINT_INTERVAL == 0 {
                    self.index.publish_rows(rows);
                    let after = pos + at as u64 + 1;
                    if after < len {
                        self.index.push_checkpoint(after);
                    }
                    if cancel.is_cancelled() {
                        debug!(rows, "jsonl index build cancelled");
                        return Ok(());
                    }
                    tokio::task::yield_now().await;
                }
            }
            pos += chunk_len as u64;
            if cancel.is_cancelled() {
                debug!(rows, "jsonl index build cancelled");
                return Ok(());
            }
            tokio::task::yield_now().await;
        }

        if len > 0 && self.source.slice(len - 1, 1)?[0] != b'\n' {
            rows += 1;
        }
        self.index.publish_rows(rows);
        self.index.mark_complete();
        info!(rows, path = %self.source.path().display(), "jsonl row index complete");
        Ok(())
    }
}
