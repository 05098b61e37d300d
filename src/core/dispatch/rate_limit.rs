use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn per_minute(max_requests: usize) -> Self {
        Self {
            max_requests,
            ..Self::default()
        }
    }
}

/// Sliding-log limiter keyed by model id.
#[derive(Debug, Default)]
pub struct RateLimiter {
    config: RateLimitConfig,
    attempts: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Records an attempt at `now` unless the window is already full.
    /// Rejected attempts are not recorded.
    pub fn try_acquire(&self, model: &str, now: Instant) -> bool {
        let window = self.config.window;
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        // Models with nothing left in the window are forgotten.
        attempts.retain(|_, log| {
            log.back()
                .is_some_and(|last| now.saturating_duration_since(*last) < window)
        });
        let log = attempts.entry(model.to_string()).or_default();

        while let Some(oldest) = log.front() {
            if now.saturating_duration_since(*oldest) >= window {
                log.pop_front();
            } else {
                break;
            }
        }

        if log.len() >= self.config.max_requests {
            return false;
        }
        log.push_back(now);
        true
    }

    #[cfg(test)]
    fn in_window(&self, model: &str, now: Instant) -> usize {
        let attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        attempts.get(model).map_or(0, |log| {
            log.iter()
                .filter(|at| now.saturating_duration_since(**at) < self.config.window)
                .count()
        })
    }

    #[cfg(test)]
    fn tracked_models(&self) -> usize {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
