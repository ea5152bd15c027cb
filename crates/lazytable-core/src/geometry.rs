#![forbid(unsafe_code)]

//! Content-space geometry.
//!
//! A scrolled table reports its visible area as a rectangle in content
//! coordinates: `y` is the scroll offset into the full (virtual) height of all
//! rows, which for large tables easily exceeds `u16`, so the fields are `u32`.

use std::ops::RangeInclusive;

/// A viewport rectangle in content coordinates (origin at the top-left of the
/// first row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge (inclusive).
    pub x: u32,
    /// Top edge (inclusive).
    pub y: u32,
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge (exclusive).
    #[inline]
    pub const fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub const fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Check if the rectangle has zero area.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Row under content-space `y`, or `None` past the last row.
    #[inline]
    pub const fn row_at_y(y: u32, row_height: u32, row_count: usize) -> Option<usize> {
        if row_height == 0 {
            return None;
        }
        let row = (y / row_height) as usize;
        if row < row_count { Some(row) } else { None }
    }

    /// Inclusive span of rows intersecting this viewport.
    ///
    /// `None` when the viewport is empty, the table has no rows, or the
    /// viewport starts below the last row. A viewport that extends past the
    /// last row ends its span on the last row.
    #[must_use]
    pub fn visible_rows(&self, row_height: u32, row_count: usize) -> Option<RangeInclusive<usize>> {
        if self.is_empty() {
            return None;
        }
        let first = Self::row_at_y(self.y, row_height, row_count)?;
        let bottom = self.bottom().saturating_sub(1);
        let last = Self::row_at_y(bottom, row_height, row_count).unwrap_or(row_count - 1);
        Some(first..=last)
    }

    /// The full-width band occupied by `row`, used to request a repaint.
    #[must_use]
    pub fn row_band(&self, row: usize, row_height: u32) -> Rect {
        let top = u32::try_from(row)
            .unwrap_or(u32::MAX)
            .saturating_mul(row_height);
        Rect::new(self.x, top, self.width, row_height)
    }
}
