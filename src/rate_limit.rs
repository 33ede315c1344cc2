use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{Instant, sleep};

use super::error::{FilingKitError, Result};

/// Rolling-window limiter shared by every request to the registry.
///
/// The limiter remembers when each of the last `limit` requests started. A new
/// request may start only if fewer than `limit` starts fall inside the trailing
/// `window`; otherwise the caller sleeps until the oldest start ages out.
///
/// ```text
///   window (1s)
/// ├─────────────────────────┤
///  x  x x   x  x x x  x x x │ ← 10 starts: next caller waits
///  ↑ oldest                 now
/// ```
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    limit: usize,
    window: Duration,
    starts: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Result<Self> {
        if limit == 0 {
            return Err(FilingKitError::ConfigError(
                "Rate limit must be greater than zero".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(FilingKitError::ConfigError(
                "Rate-limit window must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            limit: limit as usize,
            window,
            starts: Mutex::new(VecDeque::with_capacity(limit as usize)),
        })
    }

    /// Waits for a free slot and claims it. Returns the recorded start time.
    pub async fn until_ready(&self) -> Instant {
        loop {
            let wait = {
                // A poisoned lock only means another caller panicked mid-update;
                // the deque itself is still consistent.
                let mut starts = self
                    .starts
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                let now = Instant::now();
                while let Some(&oldest) = starts.front() {
                    if now.duration_since(oldest) >= self.window {
                        starts.pop_front();
                    } else {
                        break;
                    }
                }
                if starts.len() < self.limit {
                    starts.push_back(now);
                    return now;
                }
                match starts.front() {
                    Some(&oldest) => self.window - now.duration_since(oldest),
                    None => Duration::ZERO,
                }
            };
            tracing::debug!("Rate limit window full, waiting {:?}", wait);
            sleep(wait).await;
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
