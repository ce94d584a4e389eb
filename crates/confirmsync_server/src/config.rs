//! Server configuration.

/// Configuration for the annotation server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum annotations accepted in one bulk update.
    pub max_bulk_size: u32,
    /// Whether a write may clear a stored `is_pre_filled` flag.
    pub allow_pre_filled_reset: bool,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new() -> Self {
        Self {
            max_bulk_size: 500,
            allow_pre_filled_reset: false,
        }
    }

    /// Sets the maximum bulk update size.
    pub fn with_max_bulk_size(mut self, size: u32) -> Self {
        self.max_bulk_size = size;
        self
    }

    /// Lets writes clear a stored `is_pre_filled` flag (administrative imports).
    pub fn with_pre_filled_reset(mut self, allow: bool) -> Self {
        self.allow_pre_filled_reset = allow;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
