//! Observer-side reconnect handling.
//!
//! The engine never replays events emitted while an observer was
//! disconnected. The observer's responsibility is to reconnect with
//! capped exponential backoff and recover state from the full resync the
//! transport hands back on attach.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::{Event, ProjectSnapshot};

/// Backoff policy for observer reconnect attempts.
///
/// Exposed as configuration rather than constants so deployments can
/// tune responsiveness vs. load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Maximum number of retry attempts after the initial failure.
    pub max_attempts: u32,

    /// Initial delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,

    /// Maximum delay between retries, in milliseconds.
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff (e.g., 2.0 = double each time).
    pub backoff_multiplier: f64,

    /// Whether to add jitter to delays (prevents thundering herd).
    pub jitter: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl ReconnectConfig {
    /// Calculate the delay for the given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32 - 1);
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        let final_delay = if self.jitter {
            // Add up to 25% jitter
            capped_delay * (1.0 + pseudo_jitter() * 0.25)
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }
}

/// Simple pseudo-random jitter (0.0 to 1.0) without external deps.
fn pseudo_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as f64 / 1000.0
}

/// An attached observer: the resync snapshot plus the live stream.
pub struct ObserverConnection {
    /// Authoritative state of every visible project at attach time
    pub resync: Vec<ProjectSnapshot>,

    /// Live event stream from attach time onward
    pub events: broadcast::Receiver<Event>,
}

impl std::fmt::Debug for ObserverConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverConnection").field("resync_len", &self.resync.len()).finish()
    }
}

/// Transport an observer attaches through.
///
/// In production this wraps a websocket or similar; tests use an
/// in-process transport pointed at an engine instance.
#[async_trait::async_trait]
pub trait ObserverTransport: Send + Sync {
    /// Open a connection and perform the full resync.
    async fn connect(&self) -> anyhow::Result<ObserverConnection>;
}

/// Reconnecting observer session.
pub struct ObserverSession<T> {
    transport: T,
    config: ReconnectConfig,
}

impl<T: ObserverTransport> ObserverSession<T> {
    /// Create a session over a transport.
    pub fn new(transport: T, config: ReconnectConfig) -> Self {
        Self { transport, config }
    }

    /// Connect, retrying with capped exponential backoff.
    ///
    /// Gives up after the configured attempt count and returns the last
    /// connection error.
    pub async fn connect_with_retry(&self) -> anyhow::Result<ObserverConnection> {
        let max_attempts = self.config.max_attempts + 1; // +1 for initial attempt
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.transport.connect().await {
                Ok(connection) => {
                    tracing::debug!(attempt, "observer attached");
                    return Ok(connection);
                }
                Err(e) if attempt >= max_attempts => {
                    tracing::warn!(attempt, error = %e, "observer giving up");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.config.delay_for_attempt(attempt);
                    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e,
                        "observer reconnect failed, backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_calculation() {
        let config = ReconnectConfig {
            max_attempts: 5,
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter: false,
        };

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = ReconnectConfig {
            max_attempts: 10,
            initial_delay_ms: 1000,
            max_delay_ms: 5000,
            backoff_multiplier: 10.0,
            jitter: false,
        };

        assert!(config.delay_for_attempt(6) <= Duration::from_millis(5000));
    }

    struct FlakyTransport {
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl ObserverTransport for FlakyTransport {
        async fn connect(&self) -> anyhow::Result<ObserverConnection> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                anyhow::bail!("transport down");
            }
            let (_, rx) = broadcast::channel(8);
            Ok(ObserverConnection { resync: Vec::new(), events: rx })
        }
    }

    fn fast_config(max_attempts: u32) -> ReconnectConfig {
        ReconnectConfig {
            max_attempts,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_session_recovers_after_failures() {
        let transport =
            FlakyTransport { failures_before_success: 2, calls: AtomicU32::new(0) };
        let session = ObserverSession::new(transport, fast_config(3));

        let connection = session.connect_with_retry().await.unwrap();
        assert!(connection.resync.is_empty());
    }

    #[tokio::test]
    async fn test_session_gives_up_after_attempt_cap() {
        let transport =
            FlakyTransport { failures_before_success: u32::MAX, calls: AtomicU32::new(0) };
        let session = ObserverSession::new(transport, fast_config(2));

        let result = session.connect_with_retry().await;
        assert!(result.is_err());
        // 1 initial + 2 retries
        assert_eq!(session.transport.calls.load(Ordering::SeqCst), 3);
    }
}
