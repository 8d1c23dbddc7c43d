use std::sync::atomic::{AtomicU64, Ordering};

/// Source of "now" for eligibility checks (cooldowns, harvest intervals, deadlines).
pub trait Clock: Send + Sync {
    /// Unix timestamp, seconds.
    fn now(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// Externally driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Simulation clock that walks evenly spaced ticks.
pub struct SimClock {
    timestamps: Vec<u64>,
    current_idx: usize,
}

impl SimClock {
    /// `start` and `end` are unix timestamps, `step` is seconds between ticks.
    pub fn uniform(start: u64, end: u64, step: u64) -> Self {
        let timestamps: Vec<u64> = (start..=end).step_by(step.max(1) as usize).collect();
        Self {
            timestamps,
            current_idx: 0,
        }
    }

    pub fn current_timestamp(&self) -> u64 {
        self.timestamps
            .get(self.current_idx)
            .copied()
            .unwrap_or(0)
    }

    /// Advance to the next tick. Returns false when exhausted.
    pub fn advance(&mut self) -> bool {
        if self.current_idx + 1 < self.timestamps.len() {
            self.current_idx += 1;
            true
        } else {
            false
        }
    }

    pub fn tick_index(&self) -> usize {
        self.current_idx
    }

    pub fn total_ticks(&self) -> usize {
        self.timestamps.len()
    }

    /// Seconds elapsed since the previous tick (0 for the first tick).
    pub fn dt_seconds(&self) -> u64 {
        if self.current_idx == 0 {
            return 0;
        }
        self.timestamps[self.current_idx] - self.timestamps[self.current_idx - 1]
    }
}
