//! Store configuration.

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to sync the log on every commit (safer but slower).
    pub sync_on_commit: bool,

    /// Minimum id length accepted by prefix removal.
    pub min_id_prefix_len: usize,
}

/// Length of the shortest id prefix removal accepts by default.
pub const DEFAULT_MIN_ID_PREFIX_LEN: usize = 32;

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
            min_id_prefix_len: DEFAULT_MIN_ID_PREFIX_LEN,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync the log on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the minimum id length for prefix removal.
    #[must_use]
    pub const fn min_id_prefix_len(mut self, len: usize) -> Self {
        self.min_id_prefix_len = len;
        self
    }
}
