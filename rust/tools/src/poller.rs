//! Resilient tool list poller.
//!
//! Fetches immediately on `start`, then keeps polling on the base interval.
//! While the backend is failing the delay grows as `base * 2^errors`, capped
//! at two minutes. Past `THROTTLE_THRESHOLD` consecutive errors a tick skips
//! the network call and decrements the count instead, so the poller keeps
//! probing at a bounded rate and eventually recovers.
//!
//! Failures never reach the caller. Readers only see the latest-known-good
//! list, published through a `watch` channel.

use chrono::{DateTime, Utc};
use common::ToolRecord;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backoff::{BackoffPolicy, FETCH_TIMEOUT};
use crate::fetch::{FetchError, FetchOutcome, ToolFetcher};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollerError {
    #[error("poll interval must be greater than zero")]
    InvalidInterval,
}

/// Published poll state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSnapshot {
    pub tools: Vec<ToolRecord>,
    pub error_count: u32,
    pub last_success_at: Option<DateTime<Utc>>,
}

/// Result of one tick, as seen by the state machine.
#[derive(Debug)]
enum TickResult {
    Fetched(FetchOutcome),
    Failed(FetchError),
    TimedOut,
}

impl PollSnapshot {
    fn apply(&mut self, result: &TickResult) {
        match result {
            TickResult::Fetched(FetchOutcome::Tools(tools)) => {
                self.tools = tools.clone();
                self.error_count = 0;
                self.last_success_at = Some(Utc::now());
            }
            TickResult::Failed(_) => {
                self.error_count = self.error_count.saturating_add(1);
            }
            TickResult::Fetched(FetchOutcome::NotAList) | TickResult::TimedOut => {}
        }
    }

    fn skip_tick(&mut self) {
        self.error_count = self.error_count.saturating_sub(1);
    }
}

/// Cleared by `stop`. Every state update happens while holding the lock and
/// only if still set, so nothing is published once `stop` has returned.
#[derive(Debug, Clone)]
struct Liveness(Arc<Mutex<bool>>);

impl Liveness {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(true)))
    }

    fn kill(&self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    /// Run `f` only if still alive. Returns `false` if dead.
    fn if_alive(&self, f: impl FnOnce()) -> bool {
        let alive = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if *alive {
            f();
        }
        *alive
    }
}

struct Activation {
    url: String,
    interval: Duration,
    liveness: Liveness,
    handle: Option<JoinHandle<()>>,
}

impl Activation {
    fn cancel(self) {
        self.liveness.kill();
        if let Some(handle) = self.handle {
            handle.abort();
        }
    }
}

pub struct ToolPoller {
    fetcher: Arc<dyn ToolFetcher>,
    state: Arc<watch::Sender<PollSnapshot>>,
    active: Mutex<Option<Activation>>,
}

impl ToolPoller {
    pub fn new(fetcher: Arc<dyn ToolFetcher>) -> Self {
        let (tx, _rx) = watch::channel(PollSnapshot::default());
        Self {
            fetcher,
            state: Arc::new(tx),
            active: Mutex::new(None),
        }
    }

    /// Start polling `url` every `interval_ms`.
    ///
    /// Restarting with the same target is a no-op. Any other change stops the
    /// current activation and resets state to (empty, 0) before the first
    /// fetch. An empty `url` disables polling.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, url: &str, interval_ms: u64) -> Result<(), PollerError> {
        if interval_ms == 0 {
            return Err(PollerError::InvalidInterval);
        }
        let interval = Duration::from_millis(interval_ms);

        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = active.as_ref() {
            if current.url == url && current.interval == interval {
                return Ok(());
            }
        }
        if let Some(previous) = active.take() {
            previous.cancel();
        }
        self.state.send_replace(PollSnapshot::default());

        let liveness = Liveness::new();
        let handle = if url.is_empty() {
            debug!("Tool poller disabled (empty url)");
            None
        } else {
            info!(url = %url, interval_ms, "Starting tool poller");
            Some(tokio::spawn(run(
                Arc::clone(&self.fetcher),
                url.to_string(),
                BackoffPolicy::new(interval),
                liveness.clone(),
                Arc::clone(&self.state),
            )))
        };

        *active = Some(Activation {
            url: url.to_string(),
            interval,
            liveness,
            handle,
        });
        Ok(())
    }

    /// Stop polling and discard poll state. No in-flight fetch can update
    /// state after this returns.
    pub fn stop(&self) {
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            debug!(url = %previous.url, "Stopping tool poller");
            previous.cancel();
            self.state.send_replace(PollSnapshot::default());
        }
    }

    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|a| a.handle.as_ref())
            .map_or(false, |h| !h.is_finished())
    }

    /// Latest-known-good tool list.
    pub fn tools(&self) -> Vec<ToolRecord> {
        self.state.borrow().tools.clone()
    }

    pub fn error_count(&self) -> u32 {
        self.state.borrow().error_count
    }

    pub fn snapshot(&self) -> PollSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.state.subscribe()
    }
}

impl Drop for ToolPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    fetcher: Arc<dyn ToolFetcher>,
    url: String,
    policy: BackoffPolicy,
    liveness: Liveness,
    state: Arc<watch::Sender<PollSnapshot>>,
) {
    let mut error_count = 0;

    loop {
        if policy.should_skip(error_count) {
            debug!(url = %url, error_count, "Too many consecutive errors, skipping this poll");
            let alive = liveness.if_alive(|| {
                state.send_modify(|snap| {
                    snap.skip_tick();
                    error_count = snap.error_count;
                })
            });
            if !alive {
                return;
            }
        } else {
            let result = match tokio::time::timeout(FETCH_TIMEOUT, fetcher.fetch(&url)).await {
                Ok(Ok(outcome)) => TickResult::Fetched(outcome),
                Ok(Err(e)) => TickResult::Failed(e),
                Err(_) => TickResult::TimedOut,
            };

            let alive = liveness.if_alive(|| {
                state.send_modify(|snap| {
                    snap.apply(&result);
                    error_count = snap.error_count;
                })
            });
            if !alive {
                return;
            }

            match &result {
                TickResult::Failed(e) => {
                    warn!(url = %url, error_count, error = %e, "Error fetching backend tools");
                }
                TickResult::TimedOut => {
                    debug!(url = %url, timeout_ms = FETCH_TIMEOUT.as_millis() as u64, "Tool fetch timed out");
                }
                TickResult::Fetched(FetchOutcome::NotAList) => {
                    debug!(url = %url, "Tool response was not a list, keeping previous tools");
                }
                TickResult::Fetched(FetchOutcome::Tools(tools)) => {
                    debug!(url = %url, count = tools.len(), "Fetched backend tools");
                }
            }
        }

        let delay = policy.delay_for(error_count);
        if error_count > 0 {
            debug!(url = %url, error_count, delay_ms = delay.as_millis() as u64, "Backing off");
        }
        tokio::time::sleep(delay).await;
    }
}
