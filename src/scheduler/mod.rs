pub mod backoff;
pub mod delay;
pub mod runner;

pub use backoff::backoff_delay;
pub use delay::{DelayPolicy, FixedDelay, UniformDelay};
pub use runner::{Scheduler, SchedulerConfig, TargetOutcome, TargetReport};
