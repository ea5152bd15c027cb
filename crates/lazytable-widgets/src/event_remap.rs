#![forbid(unsafe_code)]

//! Translating source mutations into view-row invalidations.
//!
//! A [`MutationEvent`] arrives in model numbering. Without a sort or filter
//! the span already is a view span. Under a sort, adjacent model rows may land
//! anywhere in the view, so each row is translated on its own, the view rows
//! are sorted, and consecutive rows are merged back into maximal runs. One
//! invalidation per run keeps the store's work proportional to the number of
//! discontinuities rather than the number of rows.
//!
//! # Example
//!
//! ```
//! use lazytable_widgets::event_remap::contiguous_runs;
//!
//! let mut rows = vec![50, 20, 21, 22];
//! assert_eq!(contiguous_runs(&mut rows), vec![(50, 50), (20, 22)]);
//! ```

use tracing::trace;

use crate::index_map::RowIndexMap;
use crate::row_source::{EventRows, MutationEvent, MutationKind};

/// One view-space run to invalidate, carrying the original event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemappedRange {
    pub kind: MutationKind,
    pub first: usize,
    pub last: usize,
}

/// What the cache must do for one source event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemapOutcome {
    /// Drop the whole cache; no partial invalidation.
    ClearAll,
    /// Header-only change; leave the cache alone.
    Ignore,
    /// Invalidate each run, highest run first.
    Ranges(Vec<RemappedRange>),
}

/// Decide how `event` affects a cache indexed by view rows.
pub fn remap_event<M>(event: &MutationEvent, map: &M) -> RemapOutcome
where
    M: RowIndexMap + ?Sized,
{
    if event.affects_all_rows() {
        return RemapOutcome::ClearAll;
    }
    match event.rows {
        EventRows::AllRows => RemapOutcome::ClearAll,
        EventRows::Header => RemapOutcome::Ignore,
        EventRows::Span { first, last } => {
            RemapOutcome::Ranges(remap_rows(event.kind, first, last, map))
        }
    }
}

/// Translate model rows `first..=last` into view runs.
///
/// Model rows hidden by a filter are skipped. Runs come out highest first and
/// together cover every translated row exactly once.
pub fn remap_rows<M>(kind: MutationKind, first: usize, last: usize, map: &M) -> Vec<RemappedRange>
where
    M: RowIndexMap + ?Sized,
{
    if map.is_identity() {
        return vec![RemappedRange { kind, first, last }];
    }

    if first == last {
        return match map.to_view(first) {
            Some(row) => vec![RemappedRange {
                kind,
                first: row,
                last: row,
            }],
            None => Vec::new(),
        };
    }

    let mut rows: Vec<usize> = (first..=last).filter_map(|row| map.to_view(row)).collect();
    let runs: Vec<RemappedRange> = contiguous_runs(&mut rows)
        .into_iter()
        .map(|(first, last)| RemappedRange { kind, first, last })
        .collect();
    trace!(
        model_first = first,
        model_last = last,
        runs = runs.len(),
        "Remapped multi-row event"
    );
    runs
}

/// Sort `rows` and merge them into maximal inclusive runs, highest first.
///
/// Duplicates collapse. `rows` is left sorted and deduplicated.
pub fn contiguous_runs(rows: &mut Vec<usize>) -> Vec<(usize, usize)> {
    rows.sort_unstable();
    rows.dedup();

    let mut runs = Vec::new();
    let mut descending = rows.iter().rev().copied();
    let Some(top) = descending.next() else {
        return runs;
    };

    let mut run_last = top;
    let mut run_first = top;
    for row in descending {
        if row + 1 != run_first {
            runs.push((run_first, run_last));
            run_last = row;
        }
        run_first = row;
    }
    runs.push((run_first, run_last));
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_map::{IdentityMap, PermutationMap};

    /// Arbitrary model -> view table for scatter tests.
    struct Scatter(Vec<Option<usize>>);

    impl RowIndexMap for Scatter {
        fn to_view(&self, model_row: usize) -> Option<usize> {
            self.0.get(model_row).copied().flatten()
        }

        fn to_model(&self, view_row: usize) -> Option<usize> {
            self.0.iter().position(|&v| v == Some(view_row))
        }

        fn is_identity(&self) -> bool {
            false
        }
    }

    fn scatter(pairs: &[(usize, usize)]) -> Scatter {
        let len = pairs.iter().map(|&(m, _)| m + 1).max().unwrap_or(0);
        let mut table = vec![None; len];
        for &(model, view) in pairs {
            table[model] = Some(view);
        }
        Scatter(table)
    }

    fn ranges(outcome: RemapOutcome) -> Vec<(usize, usize)> {
        match outcome {
            RemapOutcome::Ranges(r) => r.into_iter().map(|r| (r.first, r.last)).collect(),
            other => panic!("expected ranges, got {other:?}"),
        }
    }

    // --- contiguous_runs ---

    #[test]
    fn runs_of_empty_input() {
        assert!(contiguous_runs(&mut Vec::new()).is_empty());
    }

    #[test]
    fn runs_of_single_row() {
        assert_eq!(contiguous_runs(&mut vec![7]), vec![(7, 7)]);
    }

    #[test]
    fn runs_merge_regardless_of_input_order() {
        assert_eq!(
            contiguous_runs(&mut vec![22, 50, 21, 20]),
            vec![(50, 50), (20, 22)]
        );
    }

    #[test]
    fn runs_collapse_duplicates() {
        assert_eq!(contiguous_runs(&mut vec![3, 3, 4, 4]), vec![(3, 4)]);
    }

    #[test]
    fn runs_all_disjoint() {
        assert_eq!(
            contiguous_runs(&mut vec![1, 3, 5]),
            vec![(5, 5), (3, 3), (1, 1)]
        );
    }

    // --- remap ---

    #[test]
    fn identity_passes_span_through() {
        let out = remap_event(&MutationEvent::updated(4, 9), &IdentityMap);
        assert_eq!(
            out,
            RemapOutcome::Ranges(vec![RemappedRange {
                kind: MutationKind::Update,
                first: 4,
                last: 9
            }])
        );
    }

    #[test]
    fn identity_single_row_unchanged() {
        assert_eq!(
            ranges(remap_event(&MutationEvent::updated(12, 12), &IdentityMap)),
            vec![(12, 12)]
        );
    }

    #[test]
    fn unsorted_permutation_uses_fast_path() {
        let map = PermutationMap::sorted_by_key(10, |row| row);
        assert_eq!(
            ranges(remap_event(&MutationEvent::inserted(2, 8), &map)),
            vec![(2, 8)]
        );
    }

    #[test]
    fn single_row_is_translated() {
        let map = scatter(&[(3, 17)]);
        assert_eq!(
            ranges(remap_event(&MutationEvent::updated(3, 3), &map)),
            vec![(17, 17)]
        );
    }

    #[test]
    fn single_hidden_row_produces_nothing() {
        let map = scatter(&[(3, 17)]);
        assert_eq!(
            ranges(remap_event(&MutationEvent::updated(1, 1), &map)),
            Vec::<(usize, usize)>::new()
        );
    }

    #[test]
    fn scattered_rows_split_into_runs() {
        let map = scatter(&[(5, 50), (6, 20), (7, 21), (8, 22)]);
        let out = remap_event(&MutationEvent::deleted(5, 8), &map);
        let RemapOutcome::Ranges(runs) = out else {
            panic!("expected ranges");
        };
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|r| r.kind == MutationKind::Delete));
        let spans: Vec<_> = runs.iter().map(|r| (r.first, r.last)).collect();
        assert_eq!(spans, vec![(50, 50), (20, 22)]);
    }

    #[test]
    fn reversed_sort_keeps_one_run() {
        let map = PermutationMap::sorted_by_key(10, std::cmp::Reverse);
        // model 2..=4 -> view 7..=5
        assert_eq!(
            ranges(remap_event(&MutationEvent::updated(2, 4), &map)),
            vec![(5, 7)]
        );
    }

    #[test]
    fn filtered_rows_are_skipped() {
        let map = PermutationMap::filtered(10, |row| row != 5);
        // model 4..=6 -> view 4, (hidden), 5
        assert_eq!(
            ranges(remap_event(&MutationEvent::updated(4, 6), &map)),
            vec![(4, 5)]
        );
    }

    #[test]
    fn all_rows_clears() {
        assert_eq!(
            remap_event(&MutationEvent::data_changed(), &IdentityMap),
            RemapOutcome::ClearAll
        );
        assert_eq!(
            remap_event(&MutationEvent::structure_changed(), &scatter(&[])),
            RemapOutcome::ClearAll
        );
    }

    #[test]
    fn header_is_ignored() {
        assert_eq!(
            remap_event(&MutationEvent::header_changed(), &IdentityMap),
            RemapOutcome::Ignore
        );
    }
}
