#![forbid(unsafe_code)]

//! Translation between model rows and view rows.
//!
//! Sorting and filtering are the host's business; the caching table only
//! consumes the resulting permutation through [`RowIndexMap`].

/// Maps source (model) row numbers to displayed (view) row numbers and back.
pub trait RowIndexMap {
    /// View position of `model_row`, or `None` if a filter hides it.
    fn to_view(&self, model_row: usize) -> Option<usize>;

    /// Model row shown at `view_row`, or `None` past the end of the view.
    fn to_model(&self, view_row: usize) -> Option<usize>;

    /// True when no sort or filter is active, so view rows equal model rows.
    fn is_identity(&self) -> bool;

    /// Number of view rows given the model's row count.
    fn view_row_count(&self, model_row_count: usize) -> usize {
        model_row_count
    }
}

/// No sorting, no filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityMap;

impl RowIndexMap for IdentityMap {
    fn to_view(&self, model_row: usize) -> Option<usize> {
        Some(model_row)
    }

    fn to_model(&self, view_row: usize) -> Option<usize> {
        Some(view_row)
    }

    fn is_identity(&self) -> bool {
        true
    }
}

/// A sorted and/or filtered view described by its display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermutationMap {
    view_to_model: Vec<usize>,
    model_to_view: Vec<Option<usize>>,
    identity: bool,
}

impl PermutationMap {
    /// Build from the model row shown at each view position.
    ///
    /// Model rows that never appear in `view_order` are filtered out. Entries
    /// at or past `model_row_count` are dropped.
    pub fn from_view_order(view_order: Vec<usize>, model_row_count: usize) -> Self {
        let mut model_to_view = vec![None; model_row_count];
        let mut view_to_model = Vec::with_capacity(view_order.len());
        for model_row in view_order {
            if let Some(slot) = model_to_view.get_mut(model_row)
                && slot.is_none()
            {
                *slot = Some(view_to_model.len());
                view_to_model.push(model_row);
            }
        }
        let identity = view_to_model.len() == model_to_view.len()
            && view_to_model
                .iter()
                .enumerate()
                .all(|(view, &model)| view == model);
        Self {
            view_to_model,
            model_to_view,
            identity,
        }
    }

    /// Sort model rows `0..model_row_count` by `key` (stable).
    pub fn sorted_by_key<K: Ord>(model_row_count: usize, mut key: impl FnMut(usize) -> K) -> Self {
        let mut order: Vec<usize> = (0..model_row_count).collect();
        order.sort_by_key(|&row| key(row));
        Self::from_view_order(order, model_row_count)
    }

    /// Keep only model rows accepted by `keep`, in model order.
    pub fn filtered(model_row_count: usize, mut keep: impl FnMut(usize) -> bool) -> Self {
        let order = (0..model_row_count).filter(|&row| keep(row)).collect();
        Self::from_view_order(order, model_row_count)
    }

    /// Number of rows in the view.
    pub fn len(&self) -> usize {
        self.view_to_model.len()
    }

    /// True when the filter hides every row.
    pub fn is_empty(&self) -> bool {
        self.view_to_model.is_empty()
    }
}

impl Default for PermutationMap {
    fn default() -> Self {
        Self::from_view_order(Vec::new(), 0)
    }
}

impl RowIndexMap for PermutationMap {
    fn to_view(&self, model_row: usize) -> Option<usize> {
        self.model_to_view.get(model_row).copied().flatten()
    }

    fn to_model(&self, view_row: usize) -> Option<usize> {
        self.view_to_model.get(view_row).copied()
    }

    fn is_identity(&self) -> bool {
        self.identity
    }

    fn view_row_count(&self, _model_row_count: usize) -> usize {
        self.view_to_model.len()
    }
}
