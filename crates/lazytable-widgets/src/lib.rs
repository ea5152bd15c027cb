#![forbid(unsafe_code)]

//! lazytable widgets
//!
//! A table model for data whose rows are expensive to produce. Only the rows
//! around the viewport are kept loaded; everything else shows the source's
//! cheap placeholder until it scrolls into range.
//!
//! # Key Components
//!
//! - [`CachingTable`] - the adapter a host drives from paint, input, and model events
//! - [`RowSource`] / [`RowIndexMap`] - what the host provides
//! - [`CacheRangeController`] - which view rows to keep resident
//! - [`remap_event`] - model-space mutations to view-space runs
//! - [`DeferLoading`] - load suspension during continuous key scrolling
//! - [`RowCache`] - the default [`CacheStore`]
//! - [`TableConfig`] - tunables from code, env, or file

pub mod cache_range;
pub mod caching_table;
pub mod config;
pub mod defer_loading;
pub mod event_remap;
pub mod index_map;
pub mod row_cache;
pub mod row_source;

pub use cache_range::{
    CacheRange, CacheRangeController, CacheThreshold, RangeUpdate, VisibleSpan,
    compute_cache_range,
};
pub use caching_table::{CachingTable, DefaultStore};
pub use config::{ConfigLoadError, DEFAULT_LOAD_WORKERS, TableConfig};
pub use defer_loading::{DEFAULT_LOADING_DELAY, DeferLoading, DeferOutput, DeferPhase};
pub use event_remap::{RemapOutcome, RemappedRange, contiguous_runs, remap_event};
pub use index_map::{IdentityMap, PermutationMap, RowIndexMap};
pub use row_cache::{CacheStats, CacheStore, RowCache, RowProvider};
pub use row_source::{
    DefaultRowData, EventRows, MutationEvent, MutationKind, RowData, RowLoader, RowSource,
    SharedRow,
};
