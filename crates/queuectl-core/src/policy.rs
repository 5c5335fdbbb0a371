//! Pure backoff and dead-letter policy. No I/O, no randomness, no clock
//! reads — every function here is deterministic in its inputs so it can
//! be property-tested directly.

use std::time::Duration;

use crate::config::DEFAULT_BACKOFF_BASE;

/// Non-normative but documented ceiling on backoff delay. An uncapped
/// `base ** attempts` is a latent denial-of-service against long-lived
/// jobs with a large `max_retries`; this engine caps at one hour.
pub const BACKOFF_CEILING: Duration = Duration::from_secs(3600);

/// Parse the `backoff_base` config value, falling back to
/// [`DEFAULT_BACKOFF_BASE`] when it cannot be parsed to a positive real.
pub fn parse_backoff_base(raw: &str) -> f64 {
    match raw.parse::<f64>() {
        Ok(v) if v > 0.0 && v.is_finite() => v,
        _ => DEFAULT_BACKOFF_BASE,
    }
}

/// `base ** attempts` seconds, capped at [`BACKOFF_CEILING`].
///
/// `attempts` is the post-increment count: the first retry waits
/// `base^1`, the second `base^2`, and so on.
pub fn backoff_delay(base: f64, attempts: u32) -> Duration {
    let secs = base.powi(attempts as i32);
    if !secs.is_finite() || secs < 0.0 {
        return BACKOFF_CEILING;
    }
    Duration::from_secs_f64(secs).min(BACKOFF_CEILING)
}

/// `attempts >= max_retries`: the job has exhausted its retry budget and
/// the next failure finalization writes it to `dead` rather than
/// `failed`. Tie-break at equality is dead, yielding exactly
/// `max_retries` execution attempts per job.
pub fn is_dead(attempts: u32, max_retries: u32) -> bool {
    attempts >= max_retries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_with_attempts() {
        assert_eq!(backoff_delay(2.0, 1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2.0, 3), Duration::from_secs(8));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff_delay(2.0, 20), BACKOFF_CEILING);
    }

    #[test]
    fn invalid_base_falls_back_to_default() {
        assert_eq!(parse_backoff_base("not-a-number"), DEFAULT_BACKOFF_BASE);
        assert_eq!(parse_backoff_base("-3"), DEFAULT_BACKOFF_BASE);
        assert_eq!(parse_backoff_base("0"), DEFAULT_BACKOFF_BASE);
        assert_eq!(parse_backoff_base("1.5"), 1.5);
    }

    #[test]
    fn dead_tie_break_is_inclusive() {
        assert!(!is_dead(2, 3));
        assert!(is_dead(3, 3));
        assert!(is_dead(4, 3));
    }
}
