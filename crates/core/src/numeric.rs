//! Progress arithmetic shared by the session container.

/// Clamp a progress value into `[0, 1]`.
///
/// `NaN` is treated as zero.
#[must_use]
pub fn clamp01(value: f64) -> f64 {
    // f64::clamp propagates NaN; max/min drop it.
    value.max(0.0).min(1.0)
}

/// Round up to three decimal places.
///
/// Accumulated progress and time always round away from zero so that many
/// tiny increments still add up to a full unit instead of stalling just
/// short of it. Zero and `NaN` pass through unchanged.
#[must_use]
pub fn round_up_3(value: f64) -> f64 {
    if value == 0.0 || value.is_nan() {
        return value;
    }
    (value * 1000.0).ceil() / 1000.0
}
