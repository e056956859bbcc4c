//! Configuration types for iterations and the event loop.

/// Per-iteration settings.
///
/// Every iteration started against a [`Scheduler`](crate::Scheduler) picks up
/// the scheduler's default; a bound collection can override it with
/// [`Nonblocking::with_config`](crate::Nonblocking::with_config).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterConfig {
    /// Indices visited per scheduler tick before yielding.
    /// Default: 1
    pub batch_size: usize,

    /// Trap panics raised by callbacks and deliver them as faults.
    /// When disabled a panicking callback unwinds through the event loop.
    /// Default: true
    pub catch_panics: bool,
}

impl Default for IterConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            catch_panics: true,
        }
    }
}

impl IterConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config visiting `size` indices per tick.
    pub fn batched(size: usize) -> Self {
        Self::default().batch_size(size)
    }

    /// Set the number of indices visited per tick. Zero is treated as one.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Enable or disable panic trapping.
    pub fn catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }

    /// Effective batch size, never below one.
    pub(crate) fn effective_batch(&self) -> usize {
        self.batch_size.max(1)
    }
}

/// Event loop settings.
#[derive(Debug, Clone, Default)]
pub struct LoopConfig {
    /// Stop `run_until_idle` after this many turns.
    /// Default: None (run until no tasks remain)
    pub max_turns: Option<u64>,

    /// Default settings for iterations scheduled on this loop.
    pub iteration: IterConfig,
}

impl LoopConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of turns a single run may take.
    pub fn max_turns(mut self, turns: u64) -> Self {
        self.max_turns = Some(turns);
        self
    }

    /// Set the default iteration settings.
    pub fn iteration(mut self, config: IterConfig) -> Self {
        self.iteration = config;
        self
    }
}
