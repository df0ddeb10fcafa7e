//! Per-store configuration.
//!
//! Everything that would otherwise be a process-wide toggle (debug labels,
//! how subscriber panics are handled, whether a store starts out delivering)
//! is passed explicitly when a root [`Tracking`](crate::Tracking) or a
//! [`Writable`](crate::Writable) is built.
//!
//! ```ignore
//! let config = StoreConfig::new()
//!     .label("settings")
//!     .isolate_panics(false)
//!     .enabled(false);
//!
//! let settings = Rc::new_cyclic(|this| Settings {
//!     tracking: Tracking::with_config(this.clone(), config),
//!     ..
//! });
//! ```

/// Label used in log events when none is configured.
pub const DEFAULT_LABEL: &str = "store";

/// Builder for store behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    pub(crate) label: &'static str,
    pub(crate) isolate_panics: bool,
    pub(crate) enabled: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreConfig {
    /// Create a config with default settings.
    ///
    /// Defaults:
    /// - `label`: `"store"`
    /// - `isolate_panics`: `true`
    /// - `enabled`: `true`
    pub const fn new() -> Self {
        Self {
            label: DEFAULT_LABEL,
            isolate_panics: true,
            enabled: true,
        }
    }

    /// Name attached to every log event emitted for this store.
    pub const fn label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// Whether a panicking subscriber is contained.
    ///
    /// When `true`, the panic is caught and logged and the remaining
    /// subscribers still receive the value. When `false`, the panic unwinds
    /// out of the call that triggered delivery and any deliveries still
    /// queued for that round are dropped.
    ///
    /// Default: `true`
    pub const fn isolate_panics(mut self, isolate: bool) -> Self {
        self.isolate_panics = isolate;
        self
    }

    /// Whether the store delivers updates as soon as it is created.
    ///
    /// Default: `true`
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
