//! Asynchronous materialization of a filter's matched-row index. The build is
//! a single sequential pass over the source through its own reader, so the
//! display cache's window is never evicted by the scan. The matched counter
//! is live: the UI shows rows as they are found.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::index::CHECKPOINT_INTERVAL;
use crate::reader::FilterCellSource;
use crate::transform::{predicate, FilterSpec};
use crate::MorphResult;

pub struct FilterRowIndexer {
    specs: Vec<FilterSpec>,
    matched: Mutex<Vec<u64>>,
    total_matched: AtomicU64,
    complete: AtomicBool,
}

impl FilterRowIndexer {
    pub fn new(specs: Vec<FilterSpec>) -> Self {
        Self {
            specs,
            matched: Mutex::new(Vec::new()),
            total_matched: AtomicU64::new(0),
            complete: AtomicBool::new(false),
        }
    }

    /// Matched rows so far; grows while the build runs.
    pub fn total_matched_rows(&self) -> u64 {
        self.total_matched.load(Ordering::Acquire)
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// The source row displayed at `filtered_row`, or `None` while that part
    /// of the index is not materialized yet.
    pub fn get_source_row(&self, filtered_row: u64) -> Option<u64> {
        self.lock_matched().get(filtered_row as usize).copied()
    }

    /// Scan rows `0..total_rows` once, evaluating every spec against its
    /// column and recording the rows where all of them hold. Yields every
    /// [`CHECKPOINT_INTERVAL`] rows; cancellation keeps the partial index
    /// visible. `total_rows` must come from a completed row index.
    pub async fn build_index(
        &self,
        mut source: Box<dyn FilterCellSource>,
        total_rows: u64,
        cancel: CancellationToken,
    ) -> MorphResult<()> {
        let columns: Vec<usize> = self.specs.iter().map(|s| s.source_column_index).collect();
        let mut row = 0u64;
        while row < total_rows {
            if cancel.is_cancelled() {
                debug!(row, matched = self.total_matched_rows(), "filter build cancelled");
                return Ok(());
            }
            let count = CHECKPOINT_INTERVAL.min(total_rows - row) as usize;
            let batch = source.fetch_cells(row, count, &columns)?;
            let fetched = batch.len();
            for (i, cells) in batch.into_iter().enumerate() {
                let matched = self
                    .specs
                    .iter()
                    .zip(&cells)
                    .all(|(spec, raw)| predicate::matches(spec, raw));
                if matched {
                    self.lock_matched().push(row + i as u64);
                    self.total_matched.fetch_add(1, Ordering::Release);
                }
            }
            row += fetched as u64;
            if fetched < count {
                break;
            }
            tokio::task::yield_now().await;
        }
        self.complete.store(true, Ordering::Release);
        info!(
            scanned = row,
            matched = self.total_matched_rows(),
            "filter index complete"
        );
        Ok(())
    }

    fn lock_matched(&self) -> std::sync::MutexGuard<'_, Vec<u64>> {
        match self.matched.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;
    use crate::transform::FilterOperator;

    /// In-memory rows standing in for a file-backed reader.
    struct FixedRows(Vec<Vec<String>>);

    impl FilterCellSource for FixedRows {
        fn fetch_cells(
            &mut self,
            start_row: u64,
            count: usize,
            columns: &[usize],
        ) -> MorphResult<Vec<Vec<String>>> {
            Ok(self
                .0
                .iter()
                .skip(start_row as usize)
                .take(count)
                .map(|row| {
                    columns
                        .iter()
                        .map(|&c| row.get(c).cloned().unwrap_or_default())
                        .collect()
                })
                .collect())
        }
    }

    fn age_rows(ages: &[&str]) -> FixedRows {
        FixedRows(ages.iter().map(|a| vec![a.to_string()]).collect())
    }

    fn age_above(value: &str) -> FilterSpec {
        FilterSpec {
            source_column_index: 0,
            column_type: ColumnType::WholeNumber,
            operator: FilterOperator::Gt,
            value: value.to_string(),
        }
    }

    #[tokio::test]
    async fn matches_and_orders_source_rows() {
        let indexer = FilterRowIndexer::new(vec![age_above("25")]);
        let rows = age_rows(&["30", "25", "40"]);
        indexer
            .build_index(Box::new(rows), 3, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(indexer.total_matched_rows(), 2);
        assert_eq!(indexer.get_source_row(0), Some(0));
        assert_eq!(indexer.get_source_row(1), Some(2));
        assert_eq!(indexer.get_source_row(2), None);
        assert!(indexer.is_complete());
    }

    #[tokio::test]
    async fn multiple_filters_combine_with_and() {
        let specs = vec![
            age_above("10"),
            FilterSpec {
                source_column_index: 1,
                column_type: ColumnType::Text,
                operator: FilterOperator::StartsWith,
                value: "a".to_string(),
            },
        ];
        let rows = FixedRows(vec![
            vec!["30".into(), "alice".into()],
            vec!["30".into(), "bob".into()],
            vec!["5".into(), "anna".into()],
        ]);
        let indexer = FilterRowIndexer::new(specs);
        indexer
            .build_index(Box::new(rows), 3, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(indexer.total_matched_rows(), 1);
        assert_eq!(indexer.get_source_row(0), Some(0));
    }

    #[tokio::test]
    async fn cancellation_keeps_partial_matches() {
        let indexer = FilterRowIndexer::new(vec![age_above("0")]);
        let rows = age_rows(&["1", "2", "3"]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        indexer.build_index(Box::new(rows), 3, cancel).await.unwrap();
        assert!(!indexer.is_complete());
        assert_eq!(indexer.total_matched_rows(), 0);
    }
}
