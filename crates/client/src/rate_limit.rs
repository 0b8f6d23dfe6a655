// crates/client/src/rate_limit.rs
//! Sliding-window rate limiter gating outbound requests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Admits at most `max_requests` per sliding `window`. Denied requests are
/// not recorded, so a caller hammering a full limiter does not push its
/// own recovery further out.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    /// Try to admit one request now. Returns false when the window is full.
    pub fn try_acquire(&self) -> bool {
        self.admit_at(Instant::now())
    }

    /// Requests still admissible in the current window.
    pub fn remaining(&self) -> usize {
        self.remaining_at(Instant::now())
    }

    /// How long until the next slot frees up. Zero when a request would be
    /// admitted immediately, and zero for a zero-capacity limiter, which
    /// has no slot that could ever free up.
    pub fn retry_after(&self) -> Duration {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock().unwrap_or_else(|e| e.into_inner());
        Self::expire(&mut timestamps, now, self.window);
        if timestamps.len() < self.max_requests {
            return Duration::ZERO;
        }
        // Front is the oldest admitted request still inside the window.
        match timestamps.front() {
            Some(&oldest) => (oldest + self.window).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    fn admit_at(&self, now: Instant) -> bool {
        let mut timestamps = self.timestamps.lock().unwrap_or_else(|e| e.into_inner());
        Self::expire(&mut timestamps, now, self.window);
        if timestamps.len() >= self.max_requests {
            return false;
        }
        timestamps.push_back(now);
        true
    }

    fn remaining_at(&self, now: Instant) -> usize {
        let mut timestamps = self.timestamps.lock().unwrap_or_else(|e| e.into_inner());
        Self::expire(&mut timestamps, now, self.window);
        self.max_requests.saturating_sub(timestamps.len())
    }

    fn expire(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(&front) = timestamps.front() {
            if now.saturating_duration_since(front) >= window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}
