//! Service readiness probing
//!
//! A service is ready once its listening socket accepts a TCP connection.
//! Refused connections are expected while the process starts and are simply
//! retried on a fixed interval until the deadline.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};

/// Default delay between connection attempts
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Outcome of a readiness wait
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// A connection succeeded
    Ready {
        /// Time from the start of the wait to the first accepted connection
        elapsed: Duration,
        /// Connection attempts made
        attempts: u32,
    },
    /// The deadline passed without an accepted connection
    TimedOut {
        /// Connection attempts made
        attempts: u32,
    },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Readiness::Ready { attempts, .. } | Readiness::TimedOut { attempts } => *attempts,
        }
    }
}

/// Polls an address until it accepts connections or a deadline expires
#[derive(Clone, Copy, Debug)]
pub struct ReadinessWaiter {
    poll_interval: Duration,
}

impl Default for ReadinessWaiter {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl ReadinessWaiter {
    /// Create a waiter with a fixed poll interval
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wait for `addr` to accept a connection, for at most `max_wait`.
    ///
    /// Returns no later than `max_wait` plus one poll interval. Never fails:
    /// every connection error counts as "not ready yet".
    pub async fn wait(&self, addr: SocketAddr, max_wait: Duration) -> Readiness {
        let start = Instant::now();
        let deadline = start + max_wait;
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            // Bound each attempt so a blackholed SYN cannot stall past the deadline
            let budget = deadline
                .saturating_duration_since(Instant::now())
                .min(self.poll_interval)
                .max(Duration::from_millis(1));

            match timeout(budget, TcpStream::connect(addr)).await {
                Ok(Ok(_stream)) => {
                    let elapsed = start.elapsed();
                    tracing::debug!(%addr, attempts, ?elapsed, "service accepted connection");
                    return Readiness::Ready { elapsed, attempts };
                }
                Ok(Err(e)) => {
                    tracing::trace!(%addr, attempts, error = %e, "service not ready");
                }
                Err(_) => {
                    tracing::trace!(%addr, attempts, "connection attempt timed out");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(%addr, attempts, ?max_wait, "service did not become ready");
                return Readiness::TimedOut { attempts };
            }

            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// An address nothing listens on (bound then dropped)
    fn closed_addr() -> SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    #[tokio::test]
    async fn test_ready_immediately() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let waiter = ReadinessWaiter::new(Duration::from_millis(20));
        let result = waiter.wait(addr, Duration::from_secs(2)).await;

        assert!(result.is_ready());
        assert_eq!(result.attempts(), 1);
    }

    #[tokio::test]
    async fn test_closed_port_times_out_within_bound() {
        let addr = closed_addr();
        let interval = Duration::from_millis(50);
        let max_wait = Duration::from_millis(300);

        let waiter = ReadinessWaiter::new(interval);
        let start = std::time::Instant::now();
        let result = waiter.wait(addr, max_wait).await;
        let elapsed = start.elapsed();

        assert!(!result.is_ready());
        assert!(result.attempts() > 1, "refused attempts should be retried");
        assert!(elapsed >= max_wait);
        // Generous slack for loaded CI machines
        assert!(
            elapsed <= max_wait + interval + Duration::from_millis(200),
            "took {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_listener_appearing_mid_wait() {
        let addr = closed_addr();
        let waiter = ReadinessWaiter::new(Duration::from_millis(20));

        let opener = tokio::spawn(async move {
            sleep(Duration::from_millis(150)).await;
            let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
            // Keep it open long enough to be probed
            sleep(Duration::from_secs(2)).await;
            drop(listener);
        });

        let result = waiter.wait(addr, Duration::from_secs(2)).await;
        match result {
            Readiness::Ready { elapsed, attempts } => {
                assert!(elapsed >= Duration::from_millis(150));
                assert!(elapsed < Duration::from_secs(1));
                assert!(attempts > 1);
            }
            Readiness::TimedOut { .. } => panic!("listener opened mid-wait was not detected"),
        }

        opener.abort();
    }

    #[tokio::test]
    async fn test_zero_wait_probes_once() {
        let addr = closed_addr();
        let result = ReadinessWaiter::default().wait(addr, Duration::ZERO).await;
        assert_eq!(result, Readiness::TimedOut { attempts: 1 });
    }
}
