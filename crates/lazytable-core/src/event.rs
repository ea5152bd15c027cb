#![forbid(unsafe_code)]

//! Canonical key event types.
//!
//! Only keyboard input matters to a caching table: navigation keys drive the
//! deferred-load scheduler, everything else passes through untouched. All
//! types derive `Clone`, `PartialEq`, and `Eq` for use in tests and pattern
//! matching.
//!
//! # Design Notes
//!
//! - `KeyEventKind` defaults to `Press` when the host cannot tell presses
//!   from repeats.
//! - A `Repeat` is a press that arrived without an intervening release, so
//!   [`KeyEvent::is_press`] treats both kinds the same.

/// A keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// The key code that was pressed.
    pub code: KeyCode,

    /// The type of key event (press, repeat, or release).
    pub kind: KeyEventKind,
}

impl KeyEvent {
    /// Create a new key event with Press kind.
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            kind: KeyEventKind::Press,
        }
    }

    /// Create a key event with a specific kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: KeyEventKind) -> Self {
        self.kind = kind;
        self
    }

    /// Shorthand for a release event of `code`.
    #[must_use]
    pub const fn release(code: KeyCode) -> Self {
        Self::new(code).with_kind(KeyEventKind::Release)
    }

    /// True for `Press` and `Repeat` events.
    #[must_use]
    pub const fn is_press(&self) -> bool {
        matches!(self.kind, KeyEventKind::Press | KeyEventKind::Repeat)
    }

    /// True for `Release` events.
    #[must_use]
    pub const fn is_release(&self) -> bool {
        matches!(self.kind, KeyEventKind::Release)
    }

    /// True if the key moves the viewport without pointer interaction.
    #[must_use]
    pub const fn is_navigation(&self) -> bool {
        self.code.is_navigation()
    }
}

/// Key codes for keyboard events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A regular character key.
    Char(char),

    /// Enter/Return key.
    Enter,

    /// Escape key.
    Escape,

    /// Tab key.
    Tab,

    /// Home key.
    Home,

    /// End key.
    End,

    /// Page Up key.
    PageUp,

    /// Page Down key.
    PageDown,

    /// Up arrow key.
    Up,

    /// Down arrow key.
    Down,

    /// Left arrow key.
    Left,

    /// Right arrow key.
    Right,

    /// Function key (F1-F24).
    F(u8),
}

impl KeyCode {
    /// Page up/down and the four arrows.
    ///
    /// Home and End jump straight to a destination, so they never produce the
    /// run of transient viewports that deferred loading exists to skip.
    #[must_use]
    pub const fn is_navigation(self) -> bool {
        matches!(
            self,
            Self::PageUp | Self::PageDown | Self::Up | Self::Down | Self::Left | Self::Right
        )
    }
}

/// The type of key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyEventKind {
    /// Key was pressed (default when not distinguishable).
    #[default]
    Press,

    /// Key is being held (repeat event).
    Repeat,

    /// Key was released.
    Release,
}
