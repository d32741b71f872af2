use std::env;
use std::path::PathBuf;
use std::time::Duration;

use termsync_core::WindowId;

const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_QUERY_TIMEOUT_MS: u64 = 1500;
const DEFAULT_DISCOVERY_DELAY_MS: u64 = 500;
const DEFAULT_BACKEND_URL: &str = "http://localhost:8129";
const DEFAULT_MAX_MESSAGE_BYTES: usize = 1_048_576; // 1MB
const DEFAULT_SESSION_PREFIX: &str = "ctt-";
const DEFAULT_CHANNEL_CAPACITY: usize = 128;

/// Settings for one window process.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub window_id: WindowId,
    pub socket_path: PathBuf,
    pub poll_interval: Duration,
    pub query_timeout: Duration,
    /// How long a fresh window waits for peer state before adopting orphans.
    pub discovery_delay: Duration,
    pub backend_url: String,
    pub max_message_bytes: usize,
    pub session_prefix: String,
    pub channel_capacity: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

impl WindowConfig {
    pub fn from_env() -> Self {
        Self {
            window_id: env::var("TERMSYNC_WINDOW_ID")
                .ok()
                .and_then(|v| WindowId::try_new(v).ok())
                .unwrap_or_default(),
            socket_path: termsync_ipc::socket_path(),
            poll_interval: Duration::from_millis(
                env_parse("TERMSYNC_POLL_INTERVAL_MS").unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            query_timeout: Duration::from_millis(
                env_parse("TERMSYNC_QUERY_TIMEOUT_MS").unwrap_or(DEFAULT_QUERY_TIMEOUT_MS),
            ),
            discovery_delay: Duration::from_millis(
                env_parse("TERMSYNC_DISCOVERY_DELAY_MS").unwrap_or(DEFAULT_DISCOVERY_DELAY_MS),
            ),
            backend_url: env::var("TERMSYNC_BACKEND_URL")
                .unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string()),
            max_message_bytes: env_parse("TERMSYNC_MAX_MESSAGE_BYTES")
                .unwrap_or(DEFAULT_MAX_MESSAGE_BYTES),
            session_prefix: env::var("TERMSYNC_SESSION_PREFIX")
                .unwrap_or_else(|_| DEFAULT_SESSION_PREFIX.to_string()),
            channel_capacity: env_parse("TERMSYNC_CHANNEL_CAPACITY")
                .filter(|c: &usize| *c > 0)
                .unwrap_or(DEFAULT_CHANNEL_CAPACITY),
        }
    }

    pub fn with_window_id(mut self, window_id: WindowId) -> Self {
        self.window_id = window_id;
        self
    }

    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_discovery_delay(mut self, delay: Duration) -> Self {
        self.discovery_delay = delay;
        self
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    pub fn with_max_message_bytes(mut self, max: usize) -> Self {
        self.max_message_bytes = max;
        self
    }

    pub fn with_session_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.session_prefix = prefix.into();
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}
