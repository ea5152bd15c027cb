//! Property-based invariant tests for viewport geometry.
//!
//! 1. The visible span lies inside `[0, row_count)`.
//! 2. Its first row is the row under the viewport's top edge.
//! 3. Every row whose band intersects the viewport is in the span.
//! 4. No row outside the span intersects the viewport.

use lazytable_core::Rect;
use proptest::prelude::*;

fn viewport() -> impl Strategy<Value = Rect> {
    (0u32..10_000, 1u32..500).prop_map(|(y, height)| Rect::new(0, y, 80, height))
}

fn intersects(viewport: Rect, row: usize, row_height: u32) -> bool {
    let top = row as u64 * u64::from(row_height);
    let bottom = top + u64::from(row_height);
    top < u64::from(viewport.bottom()) && bottom > u64::from(viewport.y)
}

proptest! {
    #[test]
    fn span_inside_table(v in viewport(), row_height in 1u32..8, rows in 0usize..3_000) {
        if let Some(span) = v.visible_rows(row_height, rows) {
            prop_assert!(span.start() <= span.end());
            prop_assert!(*span.end() < rows);
            prop_assert_eq!(Some(*span.start()), Rect::row_at_y(v.y, row_height, rows));
        } else {
            prop_assert!(rows == 0 || Rect::row_at_y(v.y, row_height, rows).is_none());
        }
    }

    #[test]
    fn span_is_exactly_the_intersecting_rows(
        v in viewport(),
        row_height in 1u32..8,
        rows in 1usize..3_000,
    ) {
        let span = v.visible_rows(row_height, rows);
        for row in 0..rows {
            let visible = span.as_ref().is_some_and(|s| s.contains(&row));
            prop_assert_eq!(visible, intersects(v, row, row_height), "row {}", row);
        }
    }
}
