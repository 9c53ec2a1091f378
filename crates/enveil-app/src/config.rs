//! Runtime configuration.

use std::time::Duration;

use enveil_frame::{BodyFormat, FrameConfig};

/// Settings shared by the frame and background runtimes.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Delay between hiding the overlay and tearing it down.
    pub close_delay: Duration,
    /// Keypresses in the compose element after which the frame goes away.
    pub keypress_threshold: u32,
    /// How long an auto-hiding notification stays on screen.
    pub notification_auto_hide: Duration,
    /// Bound of the runtime's internal event queues.
    pub channel_capacity: usize,
}

impl RuntimeConfig {
    /// Default notification lifetime.
    pub const DEFAULT_NOTIFICATION_AUTO_HIDE: Duration = Duration::from_secs(5);
    /// Default event queue bound.
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

    /// Frame configuration for a compose element taking `body_format`.
    pub fn frame_config(&self, body_format: BodyFormat) -> FrameConfig {
        FrameConfig {
            keypress_threshold: self.keypress_threshold,
            close_delay: self.close_delay,
            body_format,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            close_delay: FrameConfig::DEFAULT_CLOSE_DELAY,
            keypress_threshold: FrameConfig::DEFAULT_KEYPRESS_THRESHOLD,
            notification_auto_hide: Self::DEFAULT_NOTIFICATION_AUTO_HIDE,
            channel_capacity: Self::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.close_delay, Duration::from_millis(300));
        assert_eq!(config.keypress_threshold, 13);
        assert_eq!(config.notification_auto_hide, Duration::from_secs(5));
        assert_eq!(config.channel_capacity, 32);
    }

    #[test]
    fn frame_config_carries_overrides() {
        let config = RuntimeConfig { keypress_threshold: 3, ..RuntimeConfig::default() };
        let frame = config.frame_config(BodyFormat::Html);
        assert_eq!(frame.keypress_threshold, 3);
        assert_eq!(frame.body_format, BodyFormat::Html);
    }
}
