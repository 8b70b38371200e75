//! Checkpointed byte-offset indices for row-oriented formats. A [`RowIndex`]
//! is shared between one background builder and any number of readers: the
//! builder publishes a monotonic row counter and a checkpoint every
//! [`CHECKPOINT_INTERVAL`] rows, and readers turn a row number into a nearby
//! byte offset plus a skip count with [`RowIndex::get_checkpoint`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

mod csv;
mod jsonl;

pub use csv::CsvRowIndexer;
pub use jsonl::JsonLinesRowIndexer;

/// One checkpoint is recorded per this many rows; builders also yield to the
/// scheduler and observe cancellation on the same cadence.
pub const CHECKPOINT_INTERVAL: u64 = 1000;

/// Builders scan the mapped file in chunks of this many bytes.
pub(crate) const SCAN_CHUNK_SIZE: usize = 1024 * 1024;

/// Shared state of one row index. `total_rows` is monotonically nondecreasing
/// while a build runs; the checkpoint list only ever grows, under a
/// short-held lock.
#[derive(Debug)]
pub struct RowIndex {
    total_rows: AtomicU64,
    checkpoints: Mutex<Vec<u64>>,
    complete: AtomicBool,
}

impl RowIndex {
    /// `first_checkpoint` is the byte offset of row 0.
    pub(crate) fn new(first_checkpoint: u64) -> Self {
        Self {
            total_rows: AtomicU64::new(0),
            checkpoints: Mutex::new(vec![first_checkpoint]),
            complete: AtomicBool::new(false),
        }
    }

    /// The number of rows indexed so far. Grows until [`Self::is_complete`].
    pub fn total_rows(&self) -> u64 {
        self.total_rows.load(Ordering::Acquire)
    }

    /// Whether the build has scanned the whole file.
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// Map `target_row` to `(byte_offset, rows_to_skip)`: the offset of the
    /// nearest preceding checkpointed row and how many rows to step over from
    /// there. While the build is still running, `target_row` is clamped to
    /// the last available checkpoint, so the pair is always usable.
    pub fn get_checkpoint(&self, target_row: u64) -> (u64, u64) {
        let checkpoints = self.lock_checkpoints();
        let idx = ((target_row / CHECKPOINT_INTERVAL) as usize).min(checkpoints.len() - 1);
        (checkpoints[idx], target_row - idx as u64 * CHECKPOINT_INTERVAL)
    }

    pub(crate) fn publish_rows(&self, rows: u64) {
        self.total_rows.store(rows, Ordering::Release);
    }

    pub(crate) fn push_checkpoint(&self, offset: u64) {
        self.lock_checkpoints().push(offset);
    }

    pub(crate) fn mark_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn checkpoints(&self) -> Vec<u64> {
        self.lock_checkpoints().clone()
    }

    fn lock_checkpoints(&self) -> std::sync::MutexGuard<'_, Vec<u64>> {
        // a poisoned lock still holds a valid list; the panic that poisoned
        // it happened between whole push operations
        match self.checkpoints.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
