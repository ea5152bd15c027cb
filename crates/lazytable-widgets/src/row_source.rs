#![forbid(unsafe_code)]

//! The data-source contract a caching table reads from.
//!
//! A [`RowSource`] numbers rows in its own (model) order. It offers a cheap
//! synchronous placeholder per cell, an expensive loader per row, and a
//! fallback value per cell for rows whose load failed. Mutations are reported
//! as [`MutationEvent`]s, also in model numbering.

use std::sync::Arc;

use lazytable_core::LoadError;

/// A fully loaded row. Immutable once produced.
pub trait RowData<V>: Send + Sync {
    /// Value of `column` (model column index).
    fn value_at(&self, column: usize) -> V;
}

/// Shared handle to a loaded row, as held by the cache.
pub type SharedRow<V> = Arc<dyn RowData<V>>;

/// Deferred load of one row, run off the UI thread.
pub type RowLoader<V> = Box<dyn FnOnce() -> Result<SharedRow<V>, LoadError> + Send + 'static>;

/// Row data backed by a plain vector of column values.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultRowData<V> {
    values: Vec<V>,
}

impl<V> DefaultRowData<V> {
    /// Wrap one value per column.
    pub fn new(values: Vec<V>) -> Self {
        Self { values }
    }

    /// Number of columns held.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the row holds no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<V: Clone + Default + Send + Sync> RowData<V> for DefaultRowData<V> {
    fn value_at(&self, column: usize) -> V {
        self.values.get(column).cloned().unwrap_or_default()
    }
}

/// A table model whose rows are expensive to materialize.
pub trait RowSource: Send + Sync + 'static {
    /// Cell value type.
    type Value: Clone + Default + Send + Sync + 'static;

    /// Number of rows in model numbering.
    fn row_count(&self) -> usize;

    /// Number of columns.
    fn column_count(&self) -> usize;

    /// Cheap, always-available placeholder shown while a row loads.
    fn last_known_value(&self, row: usize, column: usize) -> Self::Value;

    /// Loader producing the full data of `row`.
    fn loader(&self, row: usize) -> RowLoader<Self::Value>;

    /// Value shown in `column` of `row` when its load failed.
    fn error_value(&self, row: usize, column: usize) -> Self::Value;
}

/// What happened to the affected rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Insert,
    Delete,
    Update,
    /// Columns or the whole row set changed shape.
    StructureChange,
}

/// Which rows a mutation touches, in model numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventRows {
    /// Inclusive span `first..=last`.
    Span { first: usize, last: usize },
    /// Every row may have changed.
    AllRows,
    /// Only the header changed; no data row is affected.
    Header,
}

/// A change notification from a [`RowSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationEvent {
    pub kind: MutationKind,
    pub rows: EventRows,
}

impl MutationEvent {
    /// Rows `first..=last` were inserted.
    pub const fn inserted(first: usize, last: usize) -> Self {
        Self::span(MutationKind::Insert, first, last)
    }

    /// Rows `first..=last` were deleted.
    pub const fn deleted(first: usize, last: usize) -> Self {
        Self::span(MutationKind::Delete, first, last)
    }

    /// Rows `first..=last` changed in place.
    pub const fn updated(first: usize, last: usize) -> Self {
        Self::span(MutationKind::Update, first, last)
    }

    /// Any row may have changed; the row count may differ.
    pub const fn data_changed() -> Self {
        Self {
            kind: MutationKind::Update,
            rows: EventRows::AllRows,
        }
    }

    /// Columns changed; everything is stale.
    pub const fn structure_changed() -> Self {
        Self {
            kind: MutationKind::StructureChange,
            rows: EventRows::AllRows,
        }
    }

    /// Header-only change.
    pub const fn header_changed() -> Self {
        Self {
            kind: MutationKind::Update,
            rows: EventRows::Header,
        }
    }

    const fn span(kind: MutationKind, first: usize, last: usize) -> Self {
        Self {
            kind,
            rows: EventRows::Span { first, last },
        }
    }

    /// True when the whole cache must be dropped.
    pub const fn affects_all_rows(&self) -> bool {
        matches!(self.rows, EventRows::AllRows)
            || matches!(self.kind, MutationKind::StructureChange)
    }
}
