//! Pulse count to volumetric flow conversion

use crate::units::MICROS_PER_MINUTE;

/// Gallons represented by `pulses` for a meter with the given K-factor
///
/// Returns 0.0 for a zero, negative or non-finite K-factor.
pub fn gallons(pulses: u32, pulses_per_gallon: f32) -> f32 {
    if !valid_k_factor(pulses_per_gallon) {
        return 0.0;
    }
    pulses as f32 / pulses_per_gallon
}

/// Flow rate in gallons per minute
///
/// `(pulses / pulses_per_gallon) * (60 s / elapsed)`. Fails safe to 0.0 when
/// `elapsed_us` is zero or the K-factor is unusable.
pub fn flow_rate_gpm(pulses: u32, pulses_per_gallon: f32, elapsed_us: u64) -> f32 {
    if elapsed_us == 0 || !valid_k_factor(pulses_per_gallon) {
        return 0.0;
    }
    let elapsed_minutes = elapsed_us as f32 / MICROS_PER_MINUTE;
    gallons(pulses, pulses_per_gallon) / elapsed_minutes
}

fn valid_k_factor(pulses_per_gallon: f32) -> bool {
    pulses_per_gallon.is_finite() && pulses_per_gallon > 0.0
}
