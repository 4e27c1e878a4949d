//! Backend tool list polling.
//!
//! A `ToolPoller` keeps the latest-known-good tool list from the realtime
//! backend, backing off exponentially while the backend is failing.

pub mod backoff;
pub mod fetch;
pub mod poller;

pub use backoff::{BackoffPolicy, FETCH_TIMEOUT, MAX_BACKOFF, THROTTLE_THRESHOLD};
pub use fetch::{FetchError, FetchOutcome, HttpToolFetcher, ToolFetcher};
pub use poller::{PollSnapshot, PollerError, ToolPoller};
