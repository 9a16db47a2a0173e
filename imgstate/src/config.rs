/// What `ResourceManager::apply_transitions` does when part of a transition matches no ledger entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum ApplyMode {
    /// Check the whole call first, and fail it with `LedgerError::InvariantViolation` without
    /// changing the ledger.
    Strict,
    /// Log the violation, report it, and keep going.
    #[default]
    Lenient,
}

/// Tracker options, fixed for the lifetime of a `ResourceManager`.
#[derive(Copy, Clone, Debug)]
pub struct TrackerConfig {
    pub apply_mode: ApplyMode,
    /// Merge images split into single subresources back into one entry per aspect when all the
    /// subresources agree, before serialising them.
    pub compact_on_flatten: bool,
    /// Pass loaded states through `Backend::replay_state` (e.g. presentable layouts become
    /// general layouts on replay).
    pub replace_presentable_on_load: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            apply_mode: ApplyMode::default(),
            compact_on_flatten: true,
            replace_presentable_on_load: true,
        }
    }
}

impl TrackerConfig {
    pub fn with_apply_mode(mut self, apply_mode: ApplyMode) -> Self {
        self.apply_mode = apply_mode;
        self
    }

    pub fn with_compact_on_flatten(mut self, compact: bool) -> Self {
        self.compact_on_flatten = compact;
        self
    }

    pub fn with_replace_presentable_on_load(mut self, replace: bool) -> Self {
        self.replace_presentable_on_load = replace;
        self
    }
}
