use std::time::{Duration, Instant};

/// How many poll intervals may pass between checks before the gap is
/// considered a suspension (background tab, sleeping laptop) and discarded.
pub const SUSPENSION_FACTOR: u32 = 10;

/// Seconds elapsed since the last time check.
///
/// - Returns `0.0` when there is no previous check.
/// - Returns `0.0` when the gap exceeds `SUSPENSION_FACTOR` poll intervals,
///   so a resumed process does not report hours of phantom activity.
#[must_use]
pub fn elapsed_seconds(last_check: Option<Instant>, now: Instant, poll_interval: Duration) -> f64 {
    let Some(last) = last_check else {
        return 0.0;
    };
    let elapsed = now.saturating_duration_since(last);
    if elapsed > poll_interval * SUSPENSION_FACTOR {
        return 0.0;
    }
    elapsed.as_secs_f64()
}
