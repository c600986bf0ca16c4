/// Number of decimal places kept for every stored metric value.
pub const STORED_DECIMALS: i32 = 8;

/// Rounds a metric to [`STORED_DECIMALS`] places, half away from zero.
///
/// Only call this when a value is written into a result structure; intermediate
/// aggregation must work on unrounded values.
pub fn round8(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = 10f64.powi(STORED_DECIMALS);
    let rounded = (value * scale).round() / scale;
    // Normalise negative zero so serialization is stable.
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
