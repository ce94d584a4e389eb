//! Configuration for the sync engine.

use std::time::Duration;

/// Default quiet period before pending changes are flushed.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Configuration for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Site whose annotations the engine mirrors.
    pub site_id: String,
    /// Quiet period after the last mutation before a flush starts.
    pub debounce: Duration,
    /// Upper bound for a single remote store call.
    pub request_timeout: Duration,
}

impl EngineConfig {
    /// Creates a new engine configuration for a site.
    pub fn new(site_id: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            debounce: DEFAULT_DEBOUNCE,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the debounce delay.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_builder() {
        let config = EngineConfig::new("site-42")
            .with_debounce(Duration::from_millis(250))
            .with_request_timeout(Duration::from_secs(5));

        assert_eq!(config.site_id, "site-42");
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn engine_config_defaults() {
        let config = EngineConfig::default();
        assert!(config.site_id.is_empty());
        assert_eq!(config.debounce, DEFAULT_DEBOUNCE);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
