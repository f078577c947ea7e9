//! Pipeline tuning parameters.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the rendering pipeline.
///
/// All timing and throttling behavior is driven from here: the frame
/// interval the pacer coalesces onto, the attach backlog ceiling, the
/// detach churn window, and the bounded wait deadlines used around
/// surface attach/detach.
///
/// # Example
///
/// ```
/// use docframe_core::RenderConfig;
/// use std::time::Duration;
///
/// let config = RenderConfig::default()
///     .with_frame_interval(Duration::from_millis(33))
///     .with_image_cache_capacity(128);
/// assert_eq!(config.frame_interval, Duration::from_millis(33));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Frame interval repaint requests are coalesced onto.
    /// Default: 1/60th of a second.
    pub frame_interval: Duration,

    /// Attach actions allowed in flight across all surfaces before new
    /// attaches wait. Default: 8.
    pub max_pending_attaches: usize,

    /// How long one backlog wait round lasts. Default: 4ms.
    pub attach_poll_interval: Duration,

    /// Detaches inside one churn window before attach/detach throttling
    /// kicks in. Default: 10.
    pub max_detaches_per_window: u32,

    /// Length of the detach churn window. Default: 1.5s.
    pub churn_window: Duration,

    /// Throttle delay unit once the churn threshold is exceeded; each
    /// excess detach adds one unit. Default: 4ms.
    pub churn_base_delay: Duration,

    /// Deadline for the churn-gated wait on surface attach. Default: 300ms.
    pub attach_wait_timeout: Duration,

    /// Deadline for the synchronous wait on surface detach. Default: 300ms.
    pub detach_wait_timeout: Duration,

    /// Paused documents whose image results are retained. Default: 512.
    pub image_cache_capacity: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_micros(16_667),
            max_pending_attaches: 8,
            attach_poll_interval: Duration::from_millis(4),
            max_detaches_per_window: 10,
            churn_window: Duration::from_millis(1500),
            churn_base_delay: Duration::from_millis(4),
            attach_wait_timeout: Duration::from_millis(300),
            detach_wait_timeout: Duration::from_millis(300),
            image_cache_capacity: 512,
        }
    }
}

impl RenderConfig {
    /// Set the frame interval.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Set the attach backlog ceiling.
    pub fn with_max_pending_attaches(mut self, max: usize) -> Self {
        self.max_pending_attaches = max;
        self
    }

    /// Set the detach churn threshold.
    pub fn with_max_detaches_per_window(mut self, max: u32) -> Self {
        self.max_detaches_per_window = max;
        self
    }

    /// Set the churn window length.
    pub fn with_churn_window(mut self, window: Duration) -> Self {
        self.churn_window = window;
        self
    }

    /// Set the paused-document image cache capacity.
    pub fn with_image_cache_capacity(mut self, capacity: usize) -> Self {
        self.image_cache_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = RenderConfig::default();
        assert_eq!(config.frame_interval, Duration::from_micros(16_667));
        assert_eq!(config.max_pending_attaches, 8);
        assert_eq!(config.max_detaches_per_window, 10);
        assert_eq!(config.churn_window, Duration::from_millis(1500));
        assert_eq!(config.churn_base_delay, Duration::from_millis(4));
        assert_eq!(config.attach_wait_timeout, Duration::from_millis(300));
        assert_eq!(config.detach_wait_timeout, Duration::from_millis(300));
        assert_eq!(config.image_cache_capacity, 512);
    }

    #[test]
    fn test_builder_methods() {
        let config = RenderConfig::default()
            .with_max_pending_attaches(2)
            .with_max_detaches_per_window(3)
            .with_churn_window(Duration::from_millis(100))
            .with_image_cache_capacity(16);
        assert_eq!(config.max_pending_attaches, 2);
        assert_eq!(config.max_detaches_per_window, 3);
        assert_eq!(config.churn_window, Duration::from_millis(100));
        assert_eq!(config.image_cache_capacity, 16);
    }

    #[test]
    fn test_serde_round_trip() {
        let config = RenderConfig::default().with_image_cache_capacity(64);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: RenderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.image_cache_capacity, 64);
        assert_eq!(parsed.frame_interval, config.frame_interval);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: RenderConfig = serde_json::from_str(r#"{"max_pending_attaches": 4}"#).unwrap();
        assert_eq!(parsed.max_pending_attaches, 4);
        assert_eq!(parsed.image_cache_capacity, 512);
    }
}
