#![forbid(unsafe_code)]

//! The cache store contract and its reference implementation.
//!
//! A [`CacheStore`] keeps one window of view rows resident. It never talks
//! to a row source directly: every call that may issue loads or deliver
//! results receives a [`RowProvider`], the capability object through which
//! the store obtains loaders, builds error rows, and reports finished rows
//! for repaint.
//!
//! [`RowCache`] is the store a `CachingTable` uses by default:
//!
//! - The requested range is clamped to `[0, row_count)`.
//! - Each loading slot holds a ticket and a cancellation source. Leaving the
//!   window, invalidation, and `clear()` cancel the load; a completion whose
//!   ticket no longer matches its slot is discarded.
//! - Loads run on a [`LoadExecutor`]; completions are applied only from
//!   [`process_completions`](CacheStore::process_completions), on the
//!   caller's thread.
//! - While loads are suspended, range changes only mark slots unloaded;
//!   [`flush_loads`](CacheStore::flush_loads) issues them.

use std::cell::Cell;
use std::mem;
use std::ops::Range;

use lazytable_core::LoadError;
use lazytable_runtime::{CancellationSource, LoadExecutor, LoadJob, Ticket};
use tracing::{debug, trace, warn};

use crate::cache_range::CacheRange;
use crate::row_source::MutationKind;

/// What a cache store needs from the table that owns it.
pub trait RowProvider<R> {
    /// Number of view rows.
    fn row_count(&self) -> usize;

    /// Loader for `view_row`.
    fn loader_at(&self, view_row: usize) -> LoadJob<R>;

    /// Row to cache for `view_row` when its load failed.
    fn error_row_at(&self, view_row: usize, error: &LoadError) -> R;

    /// `view_row` now holds new data and should be repainted.
    fn row_updated(&self, view_row: usize);
}

/// Keyed store of loaded rows for one viewport.
pub trait CacheStore<R> {
    /// Keep `range` resident, issuing loads for uncached rows unless
    /// suspended. Rows leaving the range are released.
    fn set_range(&mut self, range: CacheRange, provider: &dyn RowProvider<R>);

    /// Rows `first..=last` (view numbering) changed.
    fn invalidate_range(
        &mut self,
        kind: MutationKind,
        first: usize,
        last: usize,
        provider: &dyn RowProvider<R>,
    );

    /// Drop every cached row and cancel every pending load.
    fn clear(&mut self);

    /// Loaded row at `view_row`, if resident.
    fn get(&self, view_row: usize) -> Option<&R>;

    /// Suspend or resume load issuance on range changes.
    fn set_loads_suspended(&mut self, suspended: bool);

    /// Whether load issuance is suspended.
    fn loads_suspended(&self) -> bool;

    /// Issue loads for every unloaded row in the range, even while suspended.
    fn flush_loads(&mut self, provider: &dyn RowProvider<R>);

    /// Apply finished loads. Returns the number of rows updated.
    fn process_completions(&mut self, provider: &dyn RowProvider<R>) -> usize;
}

/// Counters kept by [`RowCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// `get` calls answered from the cache.
    pub hits: u64,
    /// `get` calls for rows not (yet) loaded.
    pub misses: u64,
    /// Loads handed to the executor.
    pub loads_issued: u64,
    /// Completions applied to a slot.
    pub loads_completed: u64,
    /// Completions dropped because their slot moved on.
    pub stale_discarded: u64,
    /// Completions turned into error rows.
    pub error_rows: u64,
}

enum Slot<R> {
    Unloaded,
    Loading {
        ticket: Ticket,
        cancel: CancellationSource,
    },
    Ready(R),
}

impl<R> Slot<R> {
    fn release(&mut self) {
        if let Self::Loading { cancel, .. } = mem::replace(self, Self::Unloaded) {
            cancel.cancel();
        }
    }
}

/// Window-of-slots cache store backed by a [`LoadExecutor`].
pub struct RowCache<R: Send + 'static> {
    /// First view row of the window.
    start: usize,
    slots: Vec<Slot<R>>,
    executor: LoadExecutor<R>,
    suspended: bool,
    stats: CacheStats,
    hits: Cell<u64>,
    misses: Cell<u64>,
}

impl<R: Send + 'static> RowCache<R> {
    /// Store that runs loads on `executor`.
    pub fn new(executor: LoadExecutor<R>) -> Self {
        Self {
            start: 0,
            slots: Vec::new(),
            executor,
            suspended: false,
            stats: CacheStats::default(),
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    /// Store that loads synchronously at issue time.
    pub fn inline() -> Self {
        Self::new(LoadExecutor::inline())
    }

    /// Store with a pool of `workers` loader threads.
    pub fn with_workers(workers: usize) -> Self {
        Self::new(LoadExecutor::with_workers(workers))
    }

    /// Resident view rows.
    pub fn window(&self) -> Range<usize> {
        self.start..self.start + self.slots.len()
    }

    /// Whether a load for `view_row` is in flight.
    pub fn is_loading(&self, view_row: usize) -> bool {
        matches!(self.slot(view_row), Some(Slot::Loading { .. }))
    }

    /// Number of loads in flight.
    pub fn pending_loads(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Loading { .. }))
            .count()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.get(),
            misses: self.misses.get(),
            ..self.stats
        }
    }

    /// Loader pool backing this store.
    pub fn executor(&self) -> &LoadExecutor<R> {
        &self.executor
    }

    fn slot(&self, view_row: usize) -> Option<&Slot<R>> {
        view_row
            .checked_sub(self.start)
            .and_then(|index| self.slots.get(index))
    }

    fn issue_pending(&mut self, provider: &dyn RowProvider<R>) {
        let start = self.start;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !matches!(slot, Slot::Unloaded) {
                continue;
            }
            let row = start + index;
            let cancel = CancellationSource::new();
            let ticket = self
                .executor
                .submit(row, cancel.token(), provider.loader_at(row));
            *slot = Slot::Loading { ticket, cancel };
            self.stats.loads_issued += 1;
        }
    }

    fn issue_if_running(&mut self, provider: &dyn RowProvider<R>) {
        if !self.suspended {
            self.issue_pending(provider);
        }
    }

    /// Drop slots past `row_count`.
    fn truncate_to(&mut self, row_count: usize) {
        let keep = row_count.saturating_sub(self.start).min(self.slots.len());
        for slot in &mut self.slots[keep..] {
            slot.release();
        }
        self.slots.truncate(keep);
    }

    fn release_rows(&mut self, rows: Range<usize>) {
        let window = self.window();
        let first = rows.start.max(window.start);
        let end = rows.end.min(window.end);
        if first >= end {
            return;
        }
        for slot in &mut self.slots[first - self.start..end - self.start] {
            slot.release();
        }
    }
}

impl<R: Send + 'static> CacheStore<R> for RowCache<R> {
    fn set_range(&mut self, range: CacheRange, provider: &dyn RowProvider<R>) {
        let wanted = range.clamped(provider.row_count());
        if wanted != self.window() {
            let mut old = mem::take(&mut self.slots);
            let old_start = self.start;
            let slots = wanted
                .clone()
                .map(|row| {
                    row.checked_sub(old_start)
                        .and_then(|index| old.get_mut(index))
                        .map_or(Slot::Unloaded, |slot| mem::replace(slot, Slot::Unloaded))
                })
                .collect();
            for slot in &mut old {
                slot.release();
            }
            self.start = wanted.start;
            self.slots = slots;
            trace!(
                start = wanted.start,
                end = wanted.end,
                "Cache window moved"
            );
        }
        self.issue_if_running(provider);
    }

    fn invalidate_range(
        &mut self,
        kind: MutationKind,
        first: usize,
        last: usize,
        provider: &dyn RowProvider<R>,
    ) {
        match kind {
            MutationKind::StructureChange => {
                self.clear();
                return;
            }
            MutationKind::Update => self.release_rows(first..last.saturating_add(1)),
            // Shifted rows are stale from `first` on.
            MutationKind::Insert | MutationKind::Delete => self.release_rows(first..usize::MAX),
        }
        self.truncate_to(provider.row_count());
        self.issue_if_running(provider);
    }

    fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.release();
        }
        self.slots.clear();
        self.start = 0;
    }

    fn get(&self, view_row: usize) -> Option<&R> {
        match self.slot(view_row) {
            Some(Slot::Ready(row)) => {
                self.hits.set(self.hits.get() + 1);
                Some(row)
            }
            _ => {
                self.misses.set(self.misses.get() + 1);
                None
            }
        }
    }

    fn set_loads_suspended(&mut self, suspended: bool) {
        if self.suspended != suspended {
            debug!(suspended, "Load issuance toggled");
        }
        self.suspended = suspended;
    }

    fn loads_suspended(&self) -> bool {
        self.suspended
    }

    fn flush_loads(&mut self, provider: &dyn RowProvider<R>) {
        self.issue_pending(provider);
    }

    fn process_completions(&mut self, provider: &dyn RowProvider<R>) -> usize {
        let mut applied = 0;
        for done in self.executor.drain() {
            let start = self.start;
            let slot = done
                .row
                .checked_sub(start)
                .and_then(|index| self.slots.get_mut(index));
            let Some(slot) = slot else {
                self.stats.stale_discarded += 1;
                trace!(ticket = done.ticket, row = done.row, "Discarding stale load");
                continue;
            };
            if !matches!(slot, Slot::Loading { ticket, .. } if *ticket == done.ticket) {
                self.stats.stale_discarded += 1;
                trace!(ticket = done.ticket, row = done.row, "Discarding stale load");
                continue;
            }

            let row = match done.result {
                Ok(row) => row,
                Err(error) => {
                    warn!(
                        row = done.row,
                        error_type = error.error_type(),
                        %error,
                        "Row load failed; caching error row"
                    );
                    self.stats.error_rows += 1;
                    provider.error_row_at(done.row, &error)
                }
            };
            *slot = Slot::Ready(row);
            self.stats.loads_completed += 1;
            applied += 1;
            provider.row_updated(done.row);
        }
        applied
    }
}

impl<R: Send + 'static> Drop for RowCache<R> {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Rows are `row * 10`; rows listed in `failing` error out.
    struct Provider {
        rows: usize,
        failing: Vec<usize>,
        calls: Arc<AtomicUsize>,
        updated: RefCell<Vec<usize>>,
    }

    impl Provider {
        fn new(rows: usize) -> Self {
            Self {
                rows,
                failing: Vec::new(),
                calls: Arc::new(AtomicUsize::new(0)),
                updated: RefCell::new(Vec::new()),
            }
        }

        fn loads(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn take_updated(&self) -> Vec<usize> {
            let mut rows = mem::take(&mut *self.updated.borrow_mut());
            rows.sort_unstable();
            rows
        }
    }

    impl RowProvider<i64> for Provider {
        fn row_count(&self) -> usize {
            self.rows
        }

        fn loader_at(&self, view_row: usize) -> LoadJob<i64> {
            let calls = Arc::clone(&self.calls);
            let fail = self.failing.contains(&view_row);
            Box::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                if fail {
                    Err(LoadError::failed(view_row, "boom"))
                } else {
                    Ok(view_row as i64 * 10)
                }
            })
        }

        fn error_row_at(&self, _view_row: usize, _error: &LoadError) -> i64 {
            -1
        }

        fn row_updated(&self, view_row: usize) {
            self.updated.borrow_mut().push(view_row);
        }
    }

    fn loaded(rows: usize, range: CacheRange) -> (RowCache<i64>, Provider) {
        let provider = Provider::new(rows);
        let mut cache = RowCache::inline();
        cache.set_range(range, &provider);
        cache.process_completions(&provider);
        provider.take_updated();
        (cache, provider)
    }

    #[test]
    fn set_range_loads_window() {
        let provider = Provider::new(100);
        let mut cache = RowCache::inline();
        cache.set_range(CacheRange::new(10, 5), &provider);

        assert_eq!(cache.window(), 10..15);
        assert_eq!(cache.pending_loads(), 5);
        assert_eq!(cache.get(10), None);

        assert_eq!(cache.process_completions(&provider), 5);
        assert_eq!(cache.get(12), Some(&120));
        assert_eq!(provider.take_updated(), vec![10, 11, 12, 13, 14]);
        assert_eq!(cache.pending_loads(), 0);
    }

    #[test]
    fn window_is_clamped() {
        let provider = Provider::new(20);
        let mut cache = RowCache::inline();
        cache.set_range(CacheRange::new(-5, 40), &provider);
        assert_eq!(cache.window(), 0..20);
        assert_eq!(provider.loads(), 20);
    }

    #[test]
    fn overlapping_move_keeps_loaded_rows() {
        let (mut cache, provider) = loaded(100, CacheRange::new(0, 10));
        assert_eq!(provider.loads(), 10);

        cache.set_range(CacheRange::new(5, 10), &provider);
        assert_eq!(cache.window(), 5..15);
        assert_eq!(cache.get(7), Some(&70));
        // Only rows 10..15 were new.
        assert_eq!(provider.loads(), 15);
    }

    #[test]
    fn same_range_issues_nothing_new() {
        let (mut cache, provider) = loaded(100, CacheRange::new(0, 10));
        cache.set_range(CacheRange::new(0, 10), &provider);
        assert_eq!(provider.loads(), 10);
        assert_eq!(cache.stats().loads_issued, 10);
    }

    #[test]
    fn rows_leaving_window_are_discarded_when_they_finish() {
        let provider = Provider::new(100);
        let mut cache = RowCache::inline();
        cache.set_range(CacheRange::new(0, 3), &provider);
        // Completions for 0..3 are queued but not applied yet.
        cache.set_range(CacheRange::new(50, 3), &provider);
        assert_eq!(cache.process_completions(&provider), 3);
        assert_eq!(cache.get(0), None);
        assert_eq!(cache.get(51), Some(&510));
        assert_eq!(cache.stats().stale_discarded, 3);
        assert_eq!(provider.take_updated(), vec![50, 51, 52]);
    }

    #[test]
    fn cleared_cache_discards_in_flight_loads() {
        let provider = Provider::new(10);
        let mut cache = RowCache::inline();
        cache.set_range(CacheRange::new(0, 4), &provider);
        cache.clear();
        assert_eq!(cache.process_completions(&provider), 0);
        assert_eq!(cache.stats().stale_discarded, 4);
        assert!(provider.take_updated().is_empty());
        assert_eq!(cache.window(), 0..0);
    }

    #[test]
    fn reloaded_slot_ignores_older_ticket() {
        let provider = Provider::new(10);
        let mut cache = RowCache::inline();
        cache.set_range(CacheRange::new(0, 1), &provider);
        // Reissue row 0 before the first completion is applied.
        cache.invalidate_range(MutationKind::Update, 0, 0, &provider);
        assert_eq!(provider.loads(), 2);
        assert_eq!(cache.process_completions(&provider), 1);
        assert_eq!(cache.stats().stale_discarded, 1);
        assert_eq!(cache.get(0), Some(&0));
    }

    #[test]
    fn failed_load_caches_error_row() {
        let mut provider = Provider::new(10);
        provider.failing = vec![3];
        let mut cache = RowCache::inline();
        cache.set_range(CacheRange::new(2, 3), &provider);
        cache.process_completions(&provider);

        assert_eq!(cache.get(3), Some(&-1));
        assert_eq!(cache.get(4), Some(&40));
        assert_eq!(cache.stats().error_rows, 1);

        // Not retried on the next paint.
        cache.set_range(CacheRange::new(2, 3), &provider);
        assert_eq!(provider.loads(), 3);
    }

    #[test]
    fn update_invalidates_exactly_the_span() {
        let (mut cache, provider) = loaded(100, CacheRange::new(0, 10));
        cache.invalidate_range(MutationKind::Update, 3, 4, &provider);
        assert_eq!(provider.loads(), 12);
        assert!(cache.is_loading(3));
        assert!(cache.is_loading(4));
        assert_eq!(cache.get(2), Some(&20));
        assert_eq!(cache.get(5), Some(&50));
    }

    #[test]
    fn insert_invalidates_to_end_of_window() {
        let (mut cache, mut provider) = loaded(100, CacheRange::new(0, 10));
        provider.rows = 101;
        cache.invalidate_range(MutationKind::Insert, 6, 6, &provider);
        assert_eq!(cache.get(5), Some(&50));
        for row in 6..10 {
            assert!(cache.is_loading(row), "row {row}");
        }
        assert_eq!(provider.loads(), 14);
    }

    #[test]
    fn delete_past_window_truncates() {
        let (mut cache, mut provider) = loaded(10, CacheRange::new(0, 10));
        provider.rows = 6;
        cache.invalidate_range(MutationKind::Delete, 6, 9, &provider);
        assert_eq!(cache.window(), 0..6);
        assert_eq!(cache.get(5), Some(&50));
        assert_eq!(provider.loads(), 10);
    }

    #[test]
    fn invalidation_outside_window_is_a_no_op() {
        let (mut cache, provider) = loaded(100, CacheRange::new(0, 10));
        cache.invalidate_range(MutationKind::Update, 50, 60, &provider);
        assert_eq!(provider.loads(), 10);
        assert_eq!(cache.pending_loads(), 0);
    }

    #[test]
    fn structure_change_clears() {
        let (mut cache, provider) = loaded(100, CacheRange::new(0, 10));
        cache.invalidate_range(MutationKind::StructureChange, 0, 0, &provider);
        assert_eq!(cache.window(), 0..0);
        assert_eq!(cache.get(0), None);
    }

    #[test]
    fn suspended_store_defers_until_flush() {
        let provider = Provider::new(100);
        let mut cache = RowCache::inline();
        cache.set_loads_suspended(true);
        assert!(cache.loads_suspended());

        cache.set_range(CacheRange::new(0, 5), &provider);
        cache.set_range(CacheRange::new(20, 5), &provider);
        assert_eq!(provider.loads(), 0);

        cache.flush_loads(&provider);
        assert_eq!(provider.loads(), 5);
        cache.process_completions(&provider);
        assert_eq!(cache.get(22), Some(&220));
    }

    #[test]
    fn resuming_does_not_issue_by_itself() {
        let provider = Provider::new(100);
        let mut cache = RowCache::inline();
        cache.set_loads_suspended(true);
        cache.set_range(CacheRange::new(0, 5), &provider);
        cache.set_loads_suspended(false);
        assert_eq!(provider.loads(), 0);
        cache.set_range(CacheRange::new(0, 5), &provider);
        assert_eq!(provider.loads(), 5);
    }

    #[test]
    fn clear_twice_matches_clear_once() {
        let (mut cache, _provider) = loaded(100, CacheRange::new(0, 10));
        cache.clear();
        let window = cache.window();
        let pending = cache.pending_loads();
        cache.clear();
        assert_eq!(cache.window(), window);
        assert_eq!(cache.pending_loads(), pending);
        assert_eq!(cache.get(0), None);
    }

    #[test]
    fn get_counts_hits_and_misses() {
        let (cache, _provider) = loaded(100, CacheRange::new(0, 2));
        cache.get(0);
        cache.get(1);
        cache.get(99);
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.loads_completed, 2);
    }

    #[test]
    fn threaded_store_completes() {
        let provider = Provider::new(50);
        let mut cache = RowCache::with_workers(2);
        assert_eq!(cache.executor().worker_count(), 2);
        cache.set_range(CacheRange::new(0, 8), &provider);

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        let mut applied = 0;
        while applied < 8 && std::time::Instant::now() < deadline {
            applied += cache.process_completions(&provider);
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert_eq!(applied, 8);
        assert_eq!(cache.get(7), Some(&70));
    }
}
