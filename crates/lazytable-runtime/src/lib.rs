#![forbid(unsafe_code)]

//! lazytable runtime
//!
//! Off-UI-thread machinery for the caching table.
//!
//! # Key Components
//!
//! - [`CancellationSource`] / [`CancellationToken`] - per-load cancellation
//! - [`LoadExecutor`] - worker pool whose completions are drained on the UI thread
//! - [`Completion`] - a finished load, tagged with the ticket it was issued under

pub mod cancellation;
pub mod load_executor;

pub use cancellation::{CancellationSource, CancellationToken};
pub use load_executor::{Completion, LoadExecutor, LoadJob, Ticket};
