use std::time::{Duration, Instant};

use crate::agent_engine::state::{LoopConfig, StopReason};

/// Iteration, wall-clock and failure bookkeeping for the control loop.
pub struct LoopController {
    config: LoopConfig,
    start_time: Instant,
    completed: u32,
    consecutive_failures: u32,
}

impl LoopController {
    pub fn new(config: LoopConfig) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            completed: 0,
            consecutive_failures: 0,
        }
    }

    pub fn record_iteration(&mut self, failed: bool) {
        self.completed += 1;
        if failed {
            self.consecutive_failures += 1;
        } else {
            self.consecutive_failures = 0;
        }
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// `Some(reason)` once any limit is reached.
    pub fn should_stop(&self) -> Option<StopReason> {
        if self.completed >= self.config.iterations {
            return Some(StopReason::IterationsCompleted);
        }
        if let Some(max_fail) = self.config.max_consecutive_failures {
            if self.consecutive_failures >= max_fail {
                return Some(StopReason::FailureLimit);
            }
        }
        if let Some(max_min) = self.config.max_duration_minutes {
            if self.elapsed().as_secs() / 60 >= max_min as u64 {
                return Some(StopReason::TimeLimit);
            }
        }
        None
    }
}
