//! Bounded polling of a long-running operation.
//!
//! The loop is generic over how a status is fetched and what counts as
//! terminal, so resource-path polling and `Location`-header polling share it.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

const DEPLOYMENT_TIMEOUT: Duration = Duration::from_secs(1800);
const DEPLOYMENT_INTERVAL: Duration = Duration::from_secs(10);
const FOLLOW_UP_TIMEOUT: Duration = Duration::from_secs(300);
const FOLLOW_UP_INTERVAL: Duration = Duration::from_secs(5);
/// Shortest wait between two fetches.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    timeout: Duration,
    interval: Duration,
}

impl PollPolicy {
    /// Intervals below `MIN_POLL_INTERVAL` are raised to it.
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        let interval = if interval.as_nanos() < MIN_POLL_INTERVAL.as_nanos() {
            MIN_POLL_INTERVAL
        } else {
            interval
        };
        Self { timeout, interval }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Deployment resource status: 30 minutes, every 10 seconds.
    pub const fn deployment() -> Self {
        Self::new(DEPLOYMENT_TIMEOUT, DEPLOYMENT_INTERVAL)
    }

    /// What-if follow-up URL: 5 minutes, every 5 seconds.
    pub const fn follow_up() -> Self {
        Self::new(FOLLOW_UP_TIMEOUT, FOLLOW_UP_INTERVAL)
    }

    /// `ceil(timeout / interval)`, at least one.
    pub fn max_attempts(&self) -> u32 {
        let attempts = self
            .timeout
            .as_nanos()
            .div_ceil(self.interval.as_nanos())
            .max(1);
        u32::try_from(attempts).unwrap_or(u32::MAX)
    }
}

#[derive(Debug)]
pub enum PollError<E> {
    /// A single fetch failed. Never retried.
    Fetch(E),
    TimedOut { elapsed: Duration, attempts: u32 },
    Cancelled { attempts: u32 },
}

pub struct Poller {
    policy: PollPolicy,
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Fetch until `is_terminal` holds, the attempt budget or deadline runs
    /// out, or the token is cancelled. `observe` sees every fetched value,
    /// terminal or not.
    pub async fn run<T, E, F, Fut, P, O>(
        &self,
        mut fetch: F,
        is_terminal: P,
        mut observe: O,
    ) -> Result<T, PollError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&T) -> bool,
        O: FnMut(&T),
    {
        let started = Instant::now();
        let deadline = started + self.policy.timeout;
        let max_attempts = self.policy.max_attempts();
        let mut attempts: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(PollError::Cancelled { attempts });
            }
            if attempts >= max_attempts || Instant::now() >= deadline {
                debug!(attempts, max_attempts, "Polling deadline reached");
                return Err(PollError::TimedOut {
                    elapsed: started.elapsed(),
                    attempts,
                });
            }

            attempts += 1;
            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(PollError::Cancelled { attempts });
                }
                fetched = tokio::time::timeout_at(deadline, fetch()) => fetched,
            };

            let value = match fetched {
                Ok(result) => result.map_err(PollError::Fetch)?,
                Err(_) => {
                    debug!(attempts, "Status fetch outlived the polling deadline");
                    return Err(PollError::TimedOut {
                        elapsed: started.elapsed(),
                        attempts,
                    });
                }
            };

            observe(&value);
            if is_terminal(&value) {
                debug!(attempts, elapsed_ms = started.elapsed().as_millis() as u64, "Terminal status reached");
                return Ok(value);
            }

            trace!(attempts, interval_ms = self.policy.interval.as_millis() as u64, "Not terminal yet");
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(PollError::Cancelled { attempts });
                }
                _ = tokio::time::sleep(self.policy.interval) => {}
            }
        }
    }
}
