//! Fixed-window rate limiting keyed by client identity.
//!
//! All counters share one window boundary: every `window` the whole map is
//! swept back to zero at once, no matter when inside the window a client's
//! requests arrived. A client can therefore spend its full allowance just
//! before a reset and again right after it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { count: u32, remaining: u32 },
    Rejected { count: u32, retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

/// Requests seen from one client in the current window.
#[derive(Debug)]
struct ClientCounter {
    count: u32,
    /// Milliseconds since the limiter epoch when this counter was last reset.
    window_start: u64,
}

/// Per-client fixed-window counter.
///
/// Each counter lives in a `DashMap` shard, so an increment and a sweep
/// touching the same client are serialized by the shard lock and one of
/// them wins outright.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    counters: DashMap<String, ClientCounter>,
    max_requests: u32,
    window: Duration,
    epoch: Instant,
    window_start: AtomicU64,
}

impl FixedWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            counters: DashMap::new(),
            max_requests,
            window,
            epoch: Instant::now(),
            window_start: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count a request from `client_id` and decide whether it may proceed.
    ///
    /// The counter is incremented before the comparison, so rejected
    /// requests are counted too.
    pub fn admit(&self, client_id: &str) -> Admission {
        let count = match self.counters.get_mut(client_id) {
            Some(mut counter) => {
                counter.count = counter.count.saturating_add(1);
                counter.count
            }
            None => {
                let window_start = self.window_start.load(Ordering::Acquire);
                let mut counter = self
                    .counters
                    .entry(client_id.to_owned())
                    .or_insert(ClientCounter { count: 0, window_start });
                counter.count = counter.count.saturating_add(1);
                counter.count
            }
        };

        if count <= self.max_requests {
            Admission::Allowed {
                count,
                remaining: self.max_requests - count,
            }
        } else {
            Admission::Rejected {
                count,
                retry_after: self.time_until_reset(),
            }
        }
    }

    /// Current count for a client; absent clients count as zero.
    pub fn count(&self, client_id: &str) -> u32 {
        self.counters.get(client_id).map(|c| c.count).unwrap_or(0)
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.counters.len()
    }

    /// Start a new window: every counter goes back to zero.
    ///
    /// Counters that stayed at zero for the whole window that just ended
    /// are dropped; a missing counter reads as zero so this is not
    /// observable through [`admit`](Self::admit).
    pub fn reset_window(&self) {
        let now = self.elapsed_ms();
        self.window_start.store(now, Ordering::Release);

        let before = self.counters.len();
        self.counters.retain(|_, counter| {
            let active = counter.count > 0;
            counter.count = 0;
            counter.window_start = now;
            active
        });

        tracing::debug!(
            tracked = self.counters.len(),
            evicted = before.saturating_sub(self.counters.len()),
            "Rate limit window reset"
        );
    }

    /// Start the current window now. Called when the sweep timer starts so
    /// that [`time_until_reset`](Self::time_until_reset) and the timer
    /// share one boundary.
    pub fn start_window(&self) {
        self.window_start.store(self.elapsed_ms(), Ordering::Release);
    }

    /// Time left before the next sweep, as seen from the last one.
    pub fn time_until_reset(&self) -> Duration {
        let started = Duration::from_millis(self.window_start.load(Ordering::Acquire));
        let elapsed = Duration::from_millis(self.elapsed_ms()).saturating_sub(started);
        self.window.saturating_sub(elapsed)
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Sweep the counters every `window` until shutdown is signalled.
    pub async fn run_resets(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        self.start_window();
        let start = tokio::time::Instant::now() + self.window;
        let mut ticker = tokio::time::interval_at(start, self.window);

        tracing::info!(
            max_requests = self.max_requests,
            window_ms = self.window.as_millis() as u64,
            "Rate limit window timer started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.reset_window();
                    metrics::record_window_reset(self.tracked_clients());
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limit window timer received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
