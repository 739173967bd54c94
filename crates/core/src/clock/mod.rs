use std::{
    fmt,
    sync::{Arc, Mutex},
    time::Instant,
};

/// Source of monotonic time in seconds. Injected wherever the engine needs
/// "now" so that timing-dependent behaviour is deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall clock measured from the moment the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Manually driven clock. Clones share the same underlying time.
#[derive(Clone, Default)]
pub struct ManualClock {
    time_seconds: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(seconds: f64) -> Self {
        let clock = Self::new();
        clock.set(seconds);
        clock
    }

    pub fn set(&self, seconds: f64) {
        if let Ok(mut time) = self.time_seconds.lock() {
            *time = seconds.max(0.0);
        }
    }

    pub fn advance(&self, delta: f64) {
        if let Ok(mut time) = self.time_seconds.lock() {
            *time = (*time + delta).max(0.0);
        }
    }

    pub fn reset(&self) {
        self.set(0.0);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.time_seconds.lock().map(|time| *time).unwrap_or(0.0)
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("time_seconds", &self.now())
            .finish()
    }
}
