//! A sliding window of materialized rows between the byte-offset index and
//! cell-level access. The window recenters on the most recent miss and the
//! previous window is discarded, so scrolling in either direction stays one
//! fetch ahead of the viewport. Single-threaded by contract: only the UI
//! thread touches a cache.

use std::sync::Arc;

use crate::index::RowIndex;
use crate::MorphResult;

/// Default number of rows held in the window.
pub const DEFAULT_CACHE_SIZE: usize = 200;

/// The seam between the cache and a concrete reader. `T` is whatever row
/// representation the format materializes: parsed cells for CSV, raw line
/// bytes for JSON Lines.
pub trait RowFetcher<T>: Send {
    /// Fetch up to `count` rows starting at `start_row`. Returning fewer rows
    /// than asked means the file ended first.
    fn fetch(&mut self, start_row: u64, count: usize) -> MorphResult<Vec<T>>;
}

pub struct RowByteCache<T> {
    fetcher: Box<dyn RowFetcher<T>>,
    index: Arc<RowIndex>,
    cache_size: usize,
    window_start: u64,
    rows: Vec<T>,
}

impl<T> RowByteCache<T> {
    pub fn new(fetcher: Box<dyn RowFetcher<T>>, index: Arc<RowIndex>) -> Self {
        Self::with_cache_size(fetcher, index, DEFAULT_CACHE_SIZE)
    }

    pub fn with_cache_size(
        fetcher: Box<dyn RowFetcher<T>>,
        index: Arc<RowIndex>,
        cache_size: usize,
    ) -> Self {
        Self {
            fetcher,
            index,
            cache_size: cache_size.max(1),
            window_start: 0,
            rows: Vec::new(),
        }
    }

    /// Mirrors the indexer's live counter.
    pub fn total_rows(&self) -> u64 {
        self.index.total_rows()
    }

    /// Cached row lookup, fetching a fresh window on miss. Rows at or past
    /// `total_rows` read as absent rather than failing.
    pub fn get_row(&mut self, row: u64) -> MorphResult<Option<&T>> {
        let total = self.total_rows();
        if row >= total {
            return Ok(None);
        }
        if row < self.window_start || row >= self.window_start + self.rows.len() as u64 {
            self.refill(row, total)?;
        }
        Ok(self.rows.get((row - self.window_start) as usize))
    }

    fn refill(&mut self, requested: u64, total: u64) -> MorphResult<()> {
        let half = (self.cache_size / 2) as u64;
        let max_start = total.saturating_sub(self.cache_size as u64);
        let start = requested.saturating_sub(half).min(max_start);
        let count = self.cache_size.min((total - start) as usize);
        self.rows = self.fetcher.fetch(start, count)?;
        self.window_start = start;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fetcher that records each fetch and yields the row number as its row.
    struct CountingFetcher {
        fetches: Arc<std::sync::Mutex<Vec<(u64, usize)>>>,
    }

    impl RowFetcher<u64> for CountingFetcher {
        fn fetch(&mut self, start_row: u64, count: usize) -> MorphResult<Vec<u64>> {
            self.fetches.lock().unwrap().push((start_row, count));
            Ok((start_row..start_row + count as u64).collect())
        }
    }

    fn cache_over(total: u64, cache_size: usize) -> (RowByteCache<u64>, Arc<std::sync::Mutex<Vec<(u64, usize)>>>) {
        let fetches = Arc::new(std::sync::Mutex::new(Vec::new()));
        let index = Arc::new(RowIndex::new(0));
        index.publish_rows(total);
        index.mark_complete();
        let cache = RowByteCache::with_cache_size(
            Box::new(CountingFetcher {
                fetches: fetches.clone(),
            }),
            index,
            cache_size,
        );
        (cache, fetches)
    }

    #[test]
    fn window_centers_on_request() {
        let (mut cache, fetches) = cache_over(10_000, 200);
        assert_eq!(cache.get_row(5_000).unwrap(), Some(&5_000));
        assert_eq!(fetches.lock().unwrap().as_slice(), &[(4_900, 200)]);
    }

    #[test]
    fn hits_within_window_do_not_refetch() {
        let (mut cache, fetches) = cache_over(10_000, 200);
        cache.get_row(5_000).unwrap();
        cache.get_row(5_050).unwrap();
        cache.get_row(4_900).unwrap();
        assert_eq!(fetches.lock().unwrap().len(), 1);
    }

    #[test]
    fn window_clamps_at_both_ends() {
        let (mut cache, fetches) = cache_over(10_000, 200);
        cache.get_row(3).unwrap();
        cache.get_row(9_999).unwrap();
        assert_eq!(
            fetches.lock().unwrap().as_slice(),
            &[(0, 200), (9_800, 200)]
        );
    }

    #[test]
    fn short_files_fetch_what_exists() {
        let (mut cache, fetches) = cache_over(50, 200);
        assert_eq!(cache.get_row(49).unwrap(), Some(&49));
        assert_eq!(fetches.lock().unwrap().as_slice(), &[(0, 50)]);
    }

    #[test]
    fn rows_past_the_end_read_as_absent() {
        let (mut cache, _) = cache_over(50, 200);
        assert_eq!(cache.get_row(50).unwrap(), None);
        assert_eq!(cache.get_row(u64::MAX).unwrap(), None);
    }
}
