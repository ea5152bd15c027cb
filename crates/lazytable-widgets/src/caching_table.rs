#![forbid(unsafe_code)]

//! The caching table adapter.
//!
//! [`CachingTable`] binds a [`RowSource`], a [`RowIndexMap`], and a
//! [`CacheStore`] together and drives them from the host's events:
//!
//! | Host event | Adapter call | Effect |
//! |------------|--------------|--------|
//! | paint | [`paint_viewport`](CachingTable::paint_viewport) / [`prepare_paint`](CachingTable::prepare_paint) | recompute the cache range, hand it to the store |
//! | source mutation | [`on_model_event`](CachingTable::on_model_event) | remap to view runs, invalidate or clear |
//! | sort finished | [`set_index_map`](CachingTable::set_index_map) / [`on_sorted`](CachingTable::on_sorted) | clear |
//! | key event | [`on_key_event`](CachingTable::on_key_event) | drive deferred loading |
//! | tick | [`tick`](CachingTable::tick) | settle timer, apply finished loads, collect rows to repaint |
//! | attach / detach | [`on_attach`](CachingTable::on_attach) / [`on_detach`](CachingTable::on_detach) | start / stop deferred loading, clear on detach |
//!
//! Everything here runs on the host's UI thread. Loads run on the store's
//! executor; their results are applied only inside `tick`.

use std::cell::RefCell;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use lazytable_core::{ConfigError, KeyEvent, LoadError, Rect};
use lazytable_runtime::LoadJob;
use tracing::debug;
use web_time::Instant;

use crate::cache_range::{CacheRange, CacheRangeController, CacheThreshold, VisibleSpan};
use crate::config::{DEFAULT_LOAD_WORKERS, TableConfig, loading_delay_from_ms};
use crate::defer_loading::{DEFAULT_LOADING_DELAY, DeferLoading, DeferOutput, DeferPhase};
use crate::event_remap::{RemapOutcome, remap_event};
use crate::index_map::{IdentityMap, RowIndexMap};
use crate::row_cache::{CacheStore, RowCache, RowProvider};
use crate::row_source::{DefaultRowData, MutationEvent, RowSource, SharedRow};

/// Store used when none is supplied.
pub type DefaultStore<S> = RowCache<SharedRow<<S as RowSource>::Value>>;

/// The source, its view ordering, and the repaint queue, as seen by the store.
struct SourceBinding<S, M> {
    source: Arc<S>,
    index_map: M,
    repaint: RefCell<Vec<usize>>,
}

impl<S: RowSource, M: RowIndexMap> SourceBinding<S, M> {
    fn model_row(&self, view_row: usize) -> Option<usize> {
        self.index_map.to_model(view_row)
    }
}

impl<S: RowSource, M: RowIndexMap> RowProvider<SharedRow<S::Value>> for SourceBinding<S, M> {
    fn row_count(&self) -> usize {
        self.index_map.view_row_count(self.source.row_count())
    }

    fn loader_at(&self, view_row: usize) -> LoadJob<SharedRow<S::Value>> {
        match self.model_row(view_row) {
            Some(model_row) => self.source.loader(model_row),
            None => Box::new(move || {
                Err(LoadError::failed(view_row, "view row has no model row"))
            }),
        }
    }

    fn error_row_at(&self, view_row: usize, _error: &LoadError) -> SharedRow<S::Value> {
        let columns = 0..self.source.column_count();
        let values = match self.model_row(view_row) {
            Some(model_row) => columns
                .map(|column| self.source.error_value(model_row, column))
                .collect(),
            None => columns.map(|_| S::Value::default()).collect(),
        };
        Arc::new(DefaultRowData::new(values))
    }

    fn row_updated(&self, view_row: usize) {
        self.repaint.borrow_mut().push(view_row);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attachment {
    Detached,
    Attached { scrollable: bool },
}

/// A lazily loaded, viewport-cached table model.
pub struct CachingTable<S, M = IdentityMap, C = DefaultStore<S>>
where
    S: RowSource,
    M: RowIndexMap,
    C: CacheStore<SharedRow<S::Value>>,
{
    binding: SourceBinding<S, M>,
    store: C,
    ranges: CacheRangeController,
    loading_delay: Duration,
    defer: Option<DeferLoading>,
    attachment: Attachment,
}

impl<S, M> CachingTable<S, M, DefaultStore<S>>
where
    S: RowSource,
    M: RowIndexMap,
{
    /// Table with default settings and a threaded [`RowCache`].
    pub fn new(source: Arc<S>, index_map: M) -> Self {
        Self::with_store(
            source,
            index_map,
            RowCache::with_workers(DEFAULT_LOAD_WORKERS),
        )
    }

    /// Table built from a validated [`TableConfig`].
    ///
    /// # Errors
    ///
    /// The first invalid field of `config`; nothing is built in that case.
    pub fn with_config(
        source: Arc<S>,
        index_map: M,
        config: &TableConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let threshold = config.threshold()?;
        let delay = config.loading_delay()?;
        let store = RowCache::with_workers(config.load_workers);
        let mut table = Self::with_store(source, index_map, store);
        table.ranges = CacheRangeController::new(threshold);
        table.loading_delay = delay;
        Ok(table)
    }
}

impl<S, M, C> CachingTable<S, M, C>
where
    S: RowSource,
    M: RowIndexMap,
    C: CacheStore<SharedRow<S::Value>>,
{
    /// Table over an explicit store.
    pub fn with_store(source: Arc<S>, index_map: M, store: C) -> Self {
        Self {
            binding: SourceBinding {
                source,
                index_map,
                repaint: RefCell::new(Vec::new()),
            },
            store,
            ranges: CacheRangeController::new(CacheThreshold::DEFAULT),
            loading_delay: DEFAULT_LOADING_DELAY,
            defer: None,
            attachment: Attachment::Detached,
        }
    }

    // ── Configuration ───────────────────────────────────────────────────

    /// Set the margin multiplier; applies from the next paint.
    ///
    /// # Errors
    ///
    /// Negative or NaN thresholds; the previous threshold stays in effect.
    pub fn set_cache_threshold(&mut self, threshold: f32) -> Result<(), ConfigError> {
        self.ranges.set_threshold(threshold)
    }

    /// Current margin multiplier.
    pub fn cache_threshold(&self) -> CacheThreshold {
        self.ranges.threshold()
    }

    /// Set the settle delay. Zero turns deferred loading off.
    pub fn set_loading_delay(&mut self, delay: Duration) {
        self.loading_delay = delay;
        if delay.is_zero() {
            self.dispose_scheduler(true);
        } else if let Some(defer) = &mut self.defer {
            defer.set_delay(delay);
        } else {
            self.start_scheduler_if_eligible();
        }
    }

    /// Set the settle delay from signed milliseconds.
    ///
    /// # Errors
    ///
    /// Negative values; the previous delay stays in effect.
    pub fn set_loading_delay_ms(&mut self, ms: i64) -> Result<(), ConfigError> {
        let delay = loading_delay_from_ms(ms)?;
        self.set_loading_delay(delay);
        Ok(())
    }

    /// Current settle delay.
    pub fn loading_delay(&self) -> Duration {
        self.loading_delay
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// The widget now lives in the host. `scrollable` tells whether it sits in
    /// a scroll container; deferred loading needs one.
    pub fn on_attach(&mut self, scrollable: bool) {
        self.attachment = Attachment::Attached { scrollable };
        debug!(scrollable, "Table attached");
        self.start_scheduler_if_eligible();
    }

    /// The widget left the host: stop deferred loading and drop every cached
    /// row.
    pub fn on_detach(&mut self) {
        self.dispose_scheduler(false);
        self.attachment = Attachment::Detached;
        self.clear_with_reason("detached");
        debug!("Table detached");
    }

    /// Whether the table is attached.
    pub fn is_attached(&self) -> bool {
        matches!(self.attachment, Attachment::Attached { .. })
    }

    // ── Model changes ───────────────────────────────────────────────────

    /// Replace the data source. The cache is cleared before the new source
    /// is bound.
    pub fn set_source(&mut self, source: Arc<S>) {
        self.clear_with_reason("source replaced");
        self.binding.source = source;
        debug!(
            rows = self.binding.source.row_count(),
            columns = self.binding.source.column_count(),
            "Row source replaced"
        );
    }

    /// Install a new sort/filter ordering; cached rows are position-keyed
    /// so the cache is cleared.
    pub fn set_index_map(&mut self, index_map: M) {
        self.binding.index_map = index_map;
        self.clear_with_reason("sort changed");
    }

    /// The host re-sorted in place through interior state of the index map.
    pub fn on_sorted(&mut self) {
        self.clear_with_reason("sort changed");
    }

    /// Apply a mutation notification from the source.
    pub fn on_model_event(&mut self, event: &MutationEvent) {
        match remap_event(event, &self.binding.index_map) {
            RemapOutcome::ClearAll => self.clear_with_reason("all rows changed"),
            RemapOutcome::Ignore => {}
            RemapOutcome::Ranges(runs) => {
                for run in runs {
                    self.store
                        .invalidate_range(run.kind, run.first, run.last, &self.binding);
                }
            }
        }
    }

    // ── Paint & input ───────────────────────────────────────────────────

    /// Hand the store the window for `visible`. Call once per paint.
    pub fn prepare_paint(&mut self, visible: Option<VisibleSpan>, now: Instant) -> CacheRange {
        let total_rows = self.binding.row_count();
        let update = self.ranges.update(visible, total_rows);
        if update.changed
            && let Some(defer) = &mut self.defer
        {
            defer.viewport_changed(now);
        }
        self.store.set_range(update.range, &self.binding);
        update.range
    }

    /// Like [`prepare_paint`](Self::prepare_paint), deriving the visible
    /// rows from a content-space viewport.
    pub fn paint_viewport(&mut self, viewport: Rect, row_height: u32, now: Instant) -> CacheRange {
        let visible = viewport
            .visible_rows(row_height, self.binding.row_count())
            .map(VisibleSpan::from);
        self.prepare_paint(visible, now)
    }

    /// Feed a key event to the deferred-load scheduler.
    pub fn on_key_event(&mut self, event: &KeyEvent, now: Instant) -> DeferOutput {
        let Some(defer) = &mut self.defer else {
            return DeferOutput::PassThrough;
        };
        let output = defer.feed(event, now);
        match output {
            DeferOutput::Suspend => self.store.set_loads_suspended(true),
            DeferOutput::Resume => {
                self.store.set_loads_suspended(false);
                self.store.flush_loads(&self.binding);
            }
            _ => {}
        }
        output
    }

    /// Run the settle timer and apply finished loads. Returns the view rows
    /// to repaint, in completion order.
    pub fn tick(&mut self, now: Instant) -> Vec<usize> {
        if let Some(defer) = &mut self.defer
            && defer.check_timeout(now) == Some(DeferOutput::Settled)
        {
            debug!("Viewport settled; flushing loads");
            self.store.flush_loads(&self.binding);
        }
        self.store.process_completions(&self.binding);
        mem::take(&mut *self.binding.repaint.borrow_mut())
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// Value to paint at (`view_row`, `column`): the loaded row's value if
    /// cached, else the source's last known value.
    pub fn value_at(&self, view_row: usize, column: usize) -> S::Value {
        if let Some(row) = self.store.get(view_row) {
            return row.value_at(column);
        }
        match self.binding.model_row(view_row) {
            Some(model_row) => self.binding.source.last_known_value(model_row, column),
            None => S::Value::default(),
        }
    }

    /// Whether `view_row` holds loaded (or error) data.
    pub fn is_loaded(&self, view_row: usize) -> bool {
        self.store.get(view_row).is_some()
    }

    /// Drop every cached row.
    pub fn clear_cache(&mut self) {
        self.clear_with_reason("requested");
    }

    /// Number of view rows.
    pub fn row_count(&self) -> usize {
        self.binding.row_count()
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.binding.source.column_count()
    }

    /// Scheduler phase, or `None` while deferred loading is off.
    pub fn defer_phase(&self) -> Option<DeferPhase> {
        self.defer.as_ref().map(DeferLoading::phase)
    }

    /// Bound data source.
    pub fn source(&self) -> &Arc<S> {
        &self.binding.source
    }

    /// Active view ordering.
    pub fn index_map(&self) -> &M {
        &self.binding.index_map
    }

    /// The cache store.
    pub fn store(&self) -> &C {
        &self.store
    }

    /// Window most recently handed to the store.
    pub fn current_range(&self) -> Option<CacheRange> {
        self.ranges.current()
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn clear_with_reason(&mut self, reason: &'static str) {
        self.store.clear();
        self.ranges.reset();
        self.binding.repaint.borrow_mut().clear();
        debug!(reason, "Cache cleared");
    }

    fn start_scheduler_if_eligible(&mut self) {
        let eligible = matches!(self.attachment, Attachment::Attached { scrollable: true })
            && !self.loading_delay.is_zero();
        if eligible && self.defer.is_none() {
            self.defer = Some(DeferLoading::new(self.loading_delay));
            debug!(
                delay_ms = self.loading_delay.as_millis() as u64,
                "Deferred loading enabled"
            );
        }
    }

    /// Tear down the scheduler. Loads are resumed; `flush` also issues the
    /// loads held back so far.
    fn dispose_scheduler(&mut self, flush: bool) {
        if self.defer.take().is_none() {
            return;
        }
        if self.store.loads_suspended() {
            self.store.set_loads_suspended(false);
            if flush {
                self.store.flush_loads(&self.binding);
            }
        }
        debug!("Deferred loading disabled");
    }
}
