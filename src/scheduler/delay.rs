use rand::Rng;
use std::time::Duration;

use crate::config::DelayWindow;
use crate::scheduler::backoff::backoff_delay;

/// Decides how long the scheduler pauses. Injected so tests can run a full
/// schedule without wall-clock waits.
pub trait DelayPolicy: Send + Sync {
    /// Pause after a target finishes, whatever its outcome.
    fn between_targets(&self) -> Duration;

    /// Pause before retry `attempt` (1-based) of the same target.
    fn before_retry(&self, attempt: u32) -> Duration;
}

/// Uniformly sampled pause inside a configured window.
#[derive(Debug, Clone)]
pub struct UniformDelay {
    window: DelayWindow,
}

impl UniformDelay {
    pub fn new(window: DelayWindow) -> Self {
        Self { window }
    }
}

impl DelayPolicy for UniformDelay {
    fn between_targets(&self) -> Duration {
        let (min, max) = (self.window.min.as_secs_f64(), self.window.max.as_secs_f64());
        if max <= min {
            return self.window.min;
        }
        Duration::from_secs_f64(rand::thread_rng().gen_range(min..=max))
    }

    /// Never shorter than the window minimum, whatever the jitter.
    fn before_retry(&self, attempt: u32) -> Duration {
        backoff_delay(attempt, self.window.min).max(self.window.min)
    }
}

/// Constant pause; `FixedDelay(Duration::ZERO)` disables pacing entirely.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl DelayPolicy for FixedDelay {
    fn between_targets(&self) -> Duration {
        self.0
    }

    fn before_retry(&self, _attempt: u32) -> Duration {
        self.0
    }
}
