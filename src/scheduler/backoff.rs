use rand::Rng;
use std::time::Duration;

/// Exponent cap: with the default 2s base the longest wait is about two minutes.
const MAX_EXPONENT: u32 = 6;

/// Exponential backoff with jitter before retry `attempt` (1-based).
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_EXPONENT);
    let scaled = base.saturating_mul(2_u32.pow(exponent));

    // ±30% so that retries against the same host do not line up
    let jitter_factor = rand::thread_rng().gen_range(0.7..1.3);
    scaled.mul_f64(jitter_factor)
}
