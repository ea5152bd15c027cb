#![forbid(unsafe_code)]

//! lazytable public facade crate.
//!
//! Re-exports the types an application needs to put a lazily loaded table on
//! screen, plus a prelude for day-to-day use.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lazytable::prelude::*;
//! use web_time::Instant;
//!
//! struct Squares;
//!
//! impl RowSource for Squares {
//!     type Value = u64;
//!     fn row_count(&self) -> usize { 1_000 }
//!     fn column_count(&self) -> usize { 1 }
//!     fn last_known_value(&self, _row: usize, _column: usize) -> u64 { 0 }
//!     fn loader(&self, row: usize) -> RowLoader<u64> {
//!         Box::new(move || {
//!             let data: SharedRow<u64> = Arc::new(DefaultRowData::new(vec![(row * row) as u64]));
//!             Ok(data)
//!         })
//!     }
//!     fn error_value(&self, _row: usize, _column: usize) -> u64 { u64::MAX }
//! }
//!
//! let mut table = CachingTable::with_store(Arc::new(Squares), IdentityMap, RowCache::inline());
//! let now = Instant::now();
//! table.prepare_paint(Some(VisibleSpan::new(10, 19)), now);
//! assert_eq!(table.value_at(12, 0), 0);
//! table.tick(now);
//! assert_eq!(table.value_at(12, 0), 144);
//! ```

mod error;

pub use error::{Error, Result};

// --- Core re-exports -------------------------------------------------------

pub use lazytable_core::{ConfigError, KeyCode, KeyEvent, KeyEventKind, LoadError, Rect};

// --- Runtime re-exports ----------------------------------------------------

pub use lazytable_runtime::{CancellationSource, CancellationToken, LoadExecutor};

// --- Widget re-exports -----------------------------------------------------

pub use lazytable_widgets::{
    CacheRange, CacheStats, CacheStore, CacheThreshold, CachingTable, ConfigLoadError,
    DeferOutput, DeferPhase, DefaultRowData, IdentityMap, MutationEvent, MutationKind,
    PermutationMap, RowCache, RowData, RowIndexMap, RowLoader, RowProvider, RowSource, SharedRow,
    TableConfig, VisibleSpan,
};

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        CachingTable, DefaultRowData, Error, IdentityMap, KeyCode, KeyEvent, LoadError,
        MutationEvent, PermutationMap, Rect, Result, RowCache, RowLoader, RowSource, SharedRow,
        TableConfig, VisibleSpan,
    };

    pub use crate::{core, runtime, widgets};
}

pub use lazytable_core as core;
pub use lazytable_runtime as runtime;
pub use lazytable_widgets as widgets;
