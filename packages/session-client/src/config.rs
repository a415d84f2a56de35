//! Session client configuration

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use crate::error::{ClientError, ClientResult};

/// How long the connection may sit idle before it is proactively closed
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_millis(30_000);

/// How often idleness is checked
pub const DEFAULT_INACTIVITY_CHECK_INTERVAL: Duration = Duration::from_millis(5_000);

/// Maximum time for the transport handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Fixed delay before reconnecting after an abnormal close
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_millis(5_000);

/// Base delay for exponential send-retry backoff
pub const DEFAULT_SEND_RETRY_BASE_DELAY: Duration = Duration::from_millis(1_000);

/// Maximum delivery attempts for a single message
pub const DEFAULT_SEND_RETRY_MAX: u32 = 3;

/// Configuration for the session synchronization client
///
/// All timing constants are overridable; the defaults match the
/// protocol's expected server-side timeouts.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// API base address the listen endpoint is derived from
    pub api_base: Url,

    /// Idle time after which the transport is closed (default 30 s)
    pub inactivity_timeout: Duration,

    /// Idle check cadence (default 5 s)
    pub inactivity_check_interval: Duration,

    /// Transport handshake timeout (default 10 s)
    pub connect_timeout: Duration,

    /// Delay before reconnecting after an abnormal close (default 5 s)
    pub reconnect_backoff: Duration,

    /// Outbound event queue capacity (default 100)
    pub queue_capacity: usize,

    /// Minimum position delta before a progress report is sent
    /// (default 1.0)
    pub progress_threshold: f64,

    /// Delivery attempts per message before giving up (default 3)
    pub send_retry_max: u32,

    /// Base delay for exponential send-retry backoff (default 1 s)
    pub send_retry_base_delay: Duration,
}

impl SyncConfig {
    /// Configuration with defaults for the given API base
    pub fn new(api_base: Url) -> Self {
        Self {
            api_base,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            inactivity_check_interval: DEFAULT_INACTIVITY_CHECK_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
            queue_capacity: listenalong_session_protocol::DEFAULT_QUEUE_CAPACITY,
            progress_threshold: listenalong_session_protocol::DEFAULT_PROGRESS_THRESHOLD,
            send_retry_max: DEFAULT_SEND_RETRY_MAX,
            send_retry_base_delay: DEFAULT_SEND_RETRY_BASE_DELAY,
        }
    }

    /// Load configuration from environment variables
    ///
    /// `LISTENALONG_API_URL` is required; the timing constants accept
    /// millisecond overrides (`LISTENALONG_INACTIVITY_TIMEOUT_MS`,
    /// `LISTENALONG_CONNECT_TIMEOUT_MS`, `LISTENALONG_RECONNECT_BACKOFF_MS`).
    pub fn from_env() -> Result<Self> {
        let api_base = env::var("LISTENALONG_API_URL")
            .context("LISTENALONG_API_URL must be set")?
            .parse::<Url>()
            .context("Invalid LISTENALONG_API_URL value")?;

        let mut config = Self::new(api_base);

        if let Some(ms) = read_ms_var("LISTENALONG_INACTIVITY_TIMEOUT_MS")? {
            config.inactivity_timeout = ms;
        }
        if let Some(ms) = read_ms_var("LISTENALONG_CONNECT_TIMEOUT_MS")? {
            config.connect_timeout = ms;
        }
        if let Some(ms) = read_ms_var("LISTENALONG_RECONNECT_BACKOFF_MS")? {
            config.reconnect_backoff = ms;
        }

        Ok(config)
    }

    /// Derive the listen endpoint from the API base
    ///
    /// The socket always uses the secure scheme regardless of the API
    /// base's scheme; the token travels as a query credential.
    pub fn listen_url(&self, token: &str) -> ClientResult<Url> {
        let mut url = self.api_base.clone();
        url.set_scheme("wss")
            .map_err(|()| ClientError::InvalidUrl(self.api_base.to_string()))?;
        url.set_path("/ws/listen");
        url.query_pairs_mut().clear().append_pair("token", token);
        Ok(url)
    }
}

fn read_ms_var(name: &str) -> Result<Option<Duration>> {
    match env::var(name) {
        Ok(value) => {
            let ms: u64 = value
                .parse()
                .with_context(|| format!("Invalid {} value", name))?;
            Ok(Some(Duration::from_millis(ms)))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SyncConfig {
        SyncConfig::new("https://music.example.com".parse().unwrap())
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert_eq!(config.inactivity_timeout, Duration::from_secs(30));
        assert_eq!(config.inactivity_check_interval, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.reconnect_backoff, Duration::from_secs(5));
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.progress_threshold, 1.0);
        assert_eq!(config.send_retry_max, 3);
    }

    #[test]
    fn test_listen_url() {
        let url = config().listen_url("tok-123").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://music.example.com/ws/listen?token=tok-123"
        );
    }

    #[test]
    fn test_listen_url_upgrades_plain_http_base() {
        let config = SyncConfig::new("http://localhost:8080".parse().unwrap());
        let url = config.listen_url("t").unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.port(), Some(8080));
    }
}
