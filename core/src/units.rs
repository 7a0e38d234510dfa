//! Unit conversions used by the meter

/// Minutes per hour, for GPM to gallons-per-hour
pub const MINUTES_PER_HOUR: f32 = 60.0;

/// Microseconds per minute
pub const MICROS_PER_MINUTE: f32 = 60_000_000.0;

/// Microseconds per hour
pub const MICROS_PER_HOUR: f64 = 3_600_000_000.0;

/// Liters per US gallon
pub const LITERS_PER_GALLON: f32 = 3.785_411_8;

/// Convert degrees Celsius to degrees Fahrenheit
pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_points() {
        assert_eq!(celsius_to_fahrenheit(0.0), 32.0);
        assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
        assert_eq!(celsius_to_fahrenheit(-40.0), -40.0);
    }
}
