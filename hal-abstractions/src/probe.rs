//! Temperature probe trait

use btu_core::error::SensorError;

/// A temperature probe sampled once per metering period
///
/// Implementors return an error rather than a default value when the
/// hardware does not answer; the caller decides whether a stale value is
/// acceptable.
///
/// # Example Implementation
/// ```ignore
/// struct FixedProbe(f32);
///
/// impl TemperatureProbe for FixedProbe {
///     async fn read_fahrenheit(&mut self) -> Result<f32, SensorError> {
///         Ok(self.0)
///     }
/// }
/// ```
pub trait TemperatureProbe {
    /// Perform one conversion and return degrees Fahrenheit
    fn read_fahrenheit(&mut self) -> impl core::future::Future<Output = Result<f32, SensorError>>;
}
