//! Timeout enforcement.
//!
//! # Responsibilities
//! - Arm a per-request deadline before the backend call starts
//! - Cancel the in-flight backend call when the deadline fires
//! - Decide exactly once whether the request completed or timed out
//!
//! # Design Decisions
//! - Uses Tokio's timer facilities and a `CancellationToken` the outbound
//!   call observes
//! - Each request owns its own timer; nothing is shared between requests
//! - Whichever of completion and expiry happens first wins, the other is
//!   suppressed

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const PENDING: u8 = 0;
const COMPLETED: u8 = 1;
const TIMED_OUT: u8 = 2;

/// How a deadline was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The work finished first; the timer was disarmed.
    Completed,
    /// The timer fired first; the token was cancelled.
    TimedOut,
}

/// Hands out deadlines of a fixed duration.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutGuard {
    duration: Duration,
}

impl TimeoutGuard {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Start the clock for one request. `token` is cancelled if the
    /// deadline elapses before [`Deadline::cancel`] is called.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm(&self, token: CancellationToken) -> Deadline {
        let state = Arc::new(AtomicU8::new(PENDING));
        let duration = self.duration;

        let timer = tokio::spawn({
            let state = state.clone();
            let token = token.clone();
            async move {
                tokio::time::sleep(duration).await;
                if state
                    .compare_exchange(PENDING, TIMED_OUT, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    tracing::debug!(timeout_ms = duration.as_millis() as u64, "Request deadline fired");
                    token.cancel();
                }
            }
        });

        Deadline {
            state,
            token,
            timer,
            duration,
        }
    }
}

/// A single armed deadline. Dropping it disarms the timer.
#[derive(Debug)]
pub struct Deadline {
    state: Arc<AtomicU8>,
    token: CancellationToken,
    timer: JoinHandle<()>,
    duration: Duration,
}

impl Deadline {
    /// Token cancelled on expiry; pass it to the guarded work.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Disarm the deadline because the work finished.
    ///
    /// Returns [`Settlement::TimedOut`] if the timer already won, in which
    /// case the caller must discard its result.
    pub fn cancel(&self) -> Settlement {
        match self
            .state
            .compare_exchange(PENDING, COMPLETED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.timer.abort();
                Settlement::Completed
            }
            Err(TIMED_OUT) => Settlement::TimedOut,
            Err(_) => Settlement::Completed,
        }
    }

    pub fn has_fired(&self) -> bool {
        self.state.load(Ordering::Acquire) == TIMED_OUT
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.timer.abort();
    }
}
