//! Client configuration shared by the live links and the REST poller.

use std::time::Duration;

/// Default delay between a lost connection and the reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(2000);

/// Default timeout for a graceful link shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for Arena live stores and the REST polling client.
///
/// Only the two base URLs are required; everything else has defaults that
/// match the deployed backend.
///
/// # Example
///
/// ```
/// use arena_live_client::config::ArenaLiveConfig;
/// use std::time::Duration;
///
/// let config = ArenaLiveConfig::new("wss://arena.example", "https://arena.example")
///     .with_reconnect_delay(Duration::from_secs(5));
/// assert_eq!(config.socket_base_url, "wss://arena.example");
/// ```
#[derive(Debug, Clone)]
pub struct ArenaLiveConfig {
    /// Base address for live connections (`ws://` or `wss://`), without a
    /// trailing slash. Domain routes are appended to this.
    pub socket_base_url: String,
    /// Base address for the REST polling endpoints (`http://` or `https://`),
    /// without a trailing slash.
    pub api_base_url: String,
    /// Delay between an unexpected close and the next connection attempt.
    ///
    /// Fixed — there is no backoff and no retry cap. Reconnection repeats
    /// at this interval until [`disconnect`](crate::store::LiveStore::disconnect)
    /// is called. Defaults to **2000 ms**.
    pub reconnect_delay: Duration,
    /// Timeout for the graceful link shutdown.
    ///
    /// When a link is disconnected, its background read loop is given this
    /// much time to close the transport before the task is aborted.
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl ArenaLiveConfig {
    /// Create a new configuration with the given base URLs and defaults.
    pub fn new(socket_base_url: impl Into<String>, api_base_url: impl Into<String>) -> Self {
        Self {
            socket_base_url: socket_base_url.into(),
            api_base_url: api_base_url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the delay between an unexpected close and the reconnect attempt.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the timeout for the graceful link shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = ArenaLiveConfig::new("ws://localhost:8000", "http://localhost:8000");
        assert_eq!(config.reconnect_delay, Duration::from_millis(2000));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[test]
    fn builder_methods() {
        let config = ArenaLiveConfig::new("ws://h", "http://h")
            .with_reconnect_delay(Duration::from_secs(5))
            .with_shutdown_timeout(Duration::from_secs(3));
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(3));
    }
}
