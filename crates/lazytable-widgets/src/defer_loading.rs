#![forbid(unsafe_code)]

//! Deferred loading during continuous key-driven scrolling.
//!
//! A single navigation key press pages the viewport once and loads
//! immediately. Holding a key, or pressing again before releasing, produces a
//! stream of transient viewports; loading each of them would flood the
//! loader. [`DeferLoading`] watches press/release patterns and tells its owner
//! when to suspend load issuance and when to resume it.
//!
//! # State Machine
//!
//! ```text
//!                 nav press                nav press (no release)
//!     ┌──────┐ ─────────────▶ ┌───────┐ ───────────────────────▶ ┌────────┐
//!     │ Idle │                │ Armed │                          │ Active │
//!     └──────┘ ◀───────────── └───────┘                          └────────┘
//!        ▲         nav release                                        │
//!        └────────────────────────────────────────────────────────────┘
//!                        nav release  (Resume: flush now)
//! ```
//!
//! While `Active`, each press and each cache-range change pushes a settle
//! deadline `delay` into the future. Once the deadline passes,
//! [`check_timeout`](DeferLoading::check_timeout) reports
//! [`DeferOutput::Settled`] so the owner can load the current range; the
//! scheduler stays `Active` until the key is released.
//!
//! Time is supplied by the caller, so the scheduler owns no timer thread and
//! nothing can fire after it is dropped.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use web_time::Instant;
//! use lazytable_core::{KeyCode, KeyEvent};
//! use lazytable_widgets::defer_loading::{DeferLoading, DeferOutput};
//!
//! let mut defer = DeferLoading::new(Duration::from_millis(300));
//! let now = Instant::now();
//! let down = KeyEvent::new(KeyCode::Down);
//!
//! assert_eq!(defer.feed(&down, now), DeferOutput::Armed);
//! assert_eq!(defer.feed(&down, now), DeferOutput::Suspend);
//! assert_eq!(defer.feed(&KeyEvent::release(KeyCode::Down), now), DeferOutput::Resume);
//! ```

use std::time::Duration;

use lazytable_core::KeyEvent;
use tracing::debug;
use web_time::Instant;

/// Default settle delay in milliseconds.
pub const DEFAULT_LOADING_DELAY_MS: u64 = 300;

/// Default settle delay.
pub const DEFAULT_LOADING_DELAY: Duration = Duration::from_millis(DEFAULT_LOADING_DELAY_MS);

/// Externally visible scheduler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferPhase {
    /// No navigation key held.
    Idle,
    /// One navigation press seen; loads still immediate.
    Armed,
    /// Continuous scrolling detected; loads suspended.
    Active,
}

/// What the owner must do after feeding an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferOutput {
    /// Not relevant to the scheduler.
    PassThrough,
    /// First press; nothing changes yet.
    Armed,
    /// A release before any second press; back to idle.
    Disarmed,
    /// Continuous scrolling began: suspend load issuance.
    Suspend,
    /// Still scrolling: the settle deadline moved out.
    Extended,
    /// Scrolling stopped: resume load issuance and load the current range now.
    Resume,
    /// The viewport held still for the whole delay: load the current range.
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerState {
    Idle,
    Armed,
    /// `deadline` is `None` after a settle until the next press or range change.
    Active { deadline: Option<Instant> },
}

/// Press/release state machine gating load issuance.
#[derive(Debug, Clone)]
pub struct DeferLoading {
    delay: Duration,
    state: SchedulerState,
}

impl DeferLoading {
    /// Create an idle scheduler with the given settle delay.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: SchedulerState::Idle,
        }
    }

    /// Settle delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Change the settle delay.
    ///
    /// A pending deadline keeps its old value; the new delay applies from the
    /// next press or range change.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Process a key event.
    ///
    /// Non-navigation keys pass through without touching the state. `Repeat`
    /// counts as a press.
    pub fn feed(&mut self, event: &KeyEvent, now: Instant) -> DeferOutput {
        if !event.is_navigation() {
            return DeferOutput::PassThrough;
        }
        if event.is_release() {
            self.key_released()
        } else {
            self.key_pressed(now)
        }
    }

    /// A navigation key went down (or auto-repeated).
    pub fn key_pressed(&mut self, now: Instant) -> DeferOutput {
        match self.state {
            SchedulerState::Idle => {
                self.state = SchedulerState::Armed;
                DeferOutput::Armed
            }
            SchedulerState::Armed => {
                self.state = SchedulerState::Active {
                    deadline: self.deadline_from(now),
                };
                debug!(delay_ms = self.delay.as_millis() as u64, "Deferred loading active");
                DeferOutput::Suspend
            }
            SchedulerState::Active { .. } => {
                self.state = SchedulerState::Active {
                    deadline: self.deadline_from(now),
                };
                DeferOutput::Extended
            }
        }
    }

    /// `None` when the delay is too large to represent; loads then stay held
    /// until release.
    fn deadline_from(&self, now: Instant) -> Option<Instant> {
        now.checked_add(self.delay)
    }

    /// A navigation key came up.
    pub fn key_released(&mut self) -> DeferOutput {
        match self.state {
            SchedulerState::Idle => DeferOutput::PassThrough,
            SchedulerState::Armed => {
                self.state = SchedulerState::Idle;
                DeferOutput::Disarmed
            }
            SchedulerState::Active { .. } => {
                self.state = SchedulerState::Idle;
                debug!("Deferred loading released");
                DeferOutput::Resume
            }
        }
    }

    /// The cache range moved. Returns true if the settle deadline was pushed.
    pub fn viewport_changed(&mut self, now: Instant) -> bool {
        if let SchedulerState::Active { .. } = self.state {
            self.state = SchedulerState::Active {
                deadline: self.deadline_from(now),
            };
            true
        } else {
            false
        }
    }

    /// Report [`DeferOutput::Settled`] once the settle deadline has passed.
    ///
    /// Call on every tick. Each deadline settles at most once.
    pub fn check_timeout(&mut self, now: Instant) -> Option<DeferOutput> {
        if let SchedulerState::Active {
            deadline: Some(deadline),
        } = self.state
            && now >= deadline
        {
            self.state = SchedulerState::Active { deadline: None };
            return Some(DeferOutput::Settled);
        }
        None
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> DeferPhase {
        match self.state {
            SchedulerState::Idle => DeferPhase::Idle,
            SchedulerState::Armed => DeferPhase::Armed,
            SchedulerState::Active { .. } => DeferPhase::Active,
        }
    }

    /// Whether loads should currently be suspended.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.state, SchedulerState::Active { .. })
    }

    /// Pending settle deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            SchedulerState::Active { deadline } => deadline,
            _ => None,
        }
    }

    /// Drop back to idle, discarding any pending deadline.
    pub fn reset(&mut self) {
        self.state = SchedulerState::Idle;
    }
}

impl Default for DeferLoading {
    fn default() -> Self {
        Self::new(DEFAULT_LOADING_DELAY)
    }
}
