#![forbid(unsafe_code)]

//! Which view rows to keep resident, recomputed on every paint.
//!
//! The resident window is the visible span widened by a margin on each side.
//! The margin is the visible row count scaled by a [`CacheThreshold`]:
//!
//! | Threshold | Cached rows |
//! |-----------|-------------|
//! | `0.0` | exactly the visible rows |
//! | `1.0` | visible rows plus one page above and one below |
//! | `2.0` | visible rows plus two pages each way |
//! | `INFINITE` | every row, each loaded once |
//!
//! If the widened window would be at least as long as the table, the whole
//! table is cached instead of an asymmetric clamped window.
//!
//! The requested window may start before row 0 or end past the last row; the
//! cache store clamps when it allocates slots.

use std::ops::{Range, RangeInclusive};

use lazytable_core::ConfigError;
use tracing::debug;

/// Default margin multiplier: one page each way.
pub const DEFAULT_CACHE_THRESHOLD: f32 = 1.0;

/// Margin multiplier; finite and non-negative, or infinite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct CacheThreshold(f32);

impl CacheThreshold {
    /// Cache only the visible rows.
    pub const ZERO: Self = Self(0.0);
    /// One page of margin on each side.
    pub const DEFAULT: Self = Self(DEFAULT_CACHE_THRESHOLD);
    /// Cache the whole table.
    pub const INFINITE: Self = Self(f32::INFINITY);

    /// Validate a raw multiplier.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NanThreshold`] for NaN and
    /// [`ConfigError::NegativeThreshold`] for values below zero.
    pub fn new(value: f32) -> Result<Self, ConfigError> {
        if value.is_nan() {
            Err(ConfigError::NanThreshold)
        } else if value < 0.0 {
            Err(ConfigError::NegativeThreshold(value))
        } else {
            Ok(Self(value))
        }
    }

    /// The raw multiplier.
    #[inline]
    pub const fn get(self) -> f32 {
        self.0
    }

    /// True when every row is cached.
    #[inline]
    pub fn is_infinite(self) -> bool {
        self.0.is_infinite()
    }
}

impl Default for CacheThreshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Inclusive span of view rows currently on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleSpan {
    pub first: usize,
    pub last: usize,
}

impl VisibleSpan {
    /// Span `first..=last`; `first` must not exceed `last`.
    pub const fn new(first: usize, last: usize) -> Self {
        debug_assert!(first <= last);
        Self { first, last }
    }

    /// Number of visible rows.
    pub const fn row_count(&self) -> usize {
        self.last - self.first + 1
    }
}

impl From<RangeInclusive<usize>> for VisibleSpan {
    fn from(rows: RangeInclusive<usize>) -> Self {
        Self::new(*rows.start(), *rows.end())
    }
}

/// Requested resident window `[offset, offset + length)` in view rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheRange {
    /// First requested row; negative when the margin reaches above row 0.
    pub offset: isize,
    /// Number of requested rows.
    pub length: usize,
}

impl CacheRange {
    /// Nothing cached.
    pub const EMPTY: Self = Self {
        offset: 0,
        length: 0,
    };

    pub const fn new(offset: isize, length: usize) -> Self {
        Self { offset, length }
    }

    /// The whole table of `total_rows` rows.
    pub const fn whole(total_rows: usize) -> Self {
        Self {
            offset: 0,
            length: total_rows,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// One past the last requested row.
    pub fn end(&self) -> isize {
        self.offset.saturating_add_unsigned(self.length)
    }

    /// Whether `row` lies inside the requested window.
    pub fn contains(&self, row: usize) -> bool {
        let Ok(row) = isize::try_from(row) else {
            return false;
        };
        row >= self.offset && row < self.end()
    }

    /// Whether every row of `span` lies inside the requested window.
    pub fn covers(&self, span: VisibleSpan) -> bool {
        self.contains(span.first) && self.contains(span.last)
    }

    /// The requested window intersected with `0..row_count`.
    pub fn clamped(&self, row_count: usize) -> Range<usize> {
        let start = usize::try_from(self.offset.max(0)).unwrap_or(0).min(row_count);
        let end = usize::try_from(self.end().max(0))
            .unwrap_or(0)
            .min(row_count)
            .max(start);
        start..end
    }
}

/// Resident window for `visible` in a table of `total_rows` view rows.
///
/// `visible` is `None` when nothing is on screen, which caches nothing
/// unless the threshold is infinite.
pub fn compute_cache_range(
    visible: Option<VisibleSpan>,
    total_rows: usize,
    threshold: CacheThreshold,
) -> CacheRange {
    if threshold.is_infinite() {
        return CacheRange::whole(total_rows);
    }
    let Some(span) = visible else {
        return CacheRange::EMPTY;
    };

    let count = span.row_count();
    let margin = (count as f64 * f64::from(threshold.get())).round();
    let candidate_len = count as f64 + 2.0 * margin;
    if candidate_len >= total_rows as f64 {
        return CacheRange::whole(total_rows);
    }

    // candidate_len < total_rows, so both casts are exact.
    let margin = margin as usize;
    let offset = span.first as isize - margin as isize;
    CacheRange::new(offset, count + 2 * margin)
}

/// Outcome of one paint-time recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeUpdate {
    pub range: CacheRange,
    /// False when the window equals the previous paint's.
    pub changed: bool,
}

/// Holds the threshold and remembers the last window handed to the store.
#[derive(Debug, Clone, Default)]
pub struct CacheRangeController {
    threshold: CacheThreshold,
    current: Option<CacheRange>,
}

impl CacheRangeController {
    pub fn new(threshold: CacheThreshold) -> Self {
        Self {
            threshold,
            current: None,
        }
    }

    pub fn threshold(&self) -> CacheThreshold {
        self.threshold
    }

    /// Validate and apply a new threshold; on error nothing changes.
    ///
    /// # Errors
    ///
    /// See [`CacheThreshold::new`].
    pub fn set_threshold(&mut self, value: f32) -> Result<(), ConfigError> {
        self.threshold = CacheThreshold::new(value)?;
        Ok(())
    }

    /// Window applied by the most recent [`update`](Self::update).
    pub fn current(&self) -> Option<CacheRange> {
        self.current
    }

    /// Recompute for this paint.
    pub fn update(&mut self, visible: Option<VisibleSpan>, total_rows: usize) -> RangeUpdate {
        let range = compute_cache_range(visible, total_rows, self.threshold);
        let changed = self.current != Some(range);
        if changed {
            debug!(
                offset = range.offset,
                length = range.length,
                total_rows,
                "Cache range changed"
            );
        }
        self.current = Some(range);
        RangeUpdate { range, changed }
    }

    /// Forget the last window, e.g. after the cache was cleared.
    pub fn reset(&mut self) {
        self.current = None;
    }
}
