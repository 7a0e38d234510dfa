//! Meter configuration structures

use crate::energy::FluidProperties;
use crate::error::ConfigError;
use crate::link::LinkConfig;
use crate::units::LITERS_PER_GALLON;

/// Flow meter calibration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlowMeterConfig {
    /// K-factor: pulses emitted per US gallon
    pub pulses_per_gallon: f32,
    /// Minimum spacing between accepted edges in microseconds (0 = off)
    pub debounce_us: u32,
}

impl FlowMeterConfig {
    /// Build from a K-factor given per liter, as most hall sensors are rated
    pub fn from_pulses_per_liter(pulses_per_liter: f32, debounce_us: u32) -> Self {
        Self {
            pulses_per_gallon: pulses_per_liter * LITERS_PER_GALLON,
            debounce_us,
        }
    }
}

impl Default for FlowMeterConfig {
    fn default() -> Self {
        // YF-S201 class hall sensor: 450 pulses per liter, < 1 kHz at full scale
        Self::from_pulses_per_liter(450.0, 500)
    }
}

/// Complete meter configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MeterConfig {
    /// Sampling period in milliseconds
    pub sample_period_ms: u32,
    /// Flow meter calibration
    pub flow: FlowMeterConfig,
    /// Loop fluid
    pub fluid: FluidProperties,
    /// Periods a failed probe may reuse its last good value
    pub max_stale_samples: u8,
    /// Connectivity retry policy
    pub link: LinkConfig,
}

impl MeterConfig {
    /// Check the configuration for values that would make readings meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_period_ms == 0 {
            return Err(ConfigError::ZeroSamplePeriod);
        }
        let k = self.flow.pulses_per_gallon;
        if !k.is_finite() || k <= 0.0 {
            return Err(ConfigError::InvalidCalibration);
        }
        if !self.fluid.is_valid() {
            return Err(ConfigError::InvalidFluid);
        }
        self.link.validate()
    }

    /// Return this configuration if valid, otherwise the defaults
    pub fn or_default(self) -> (Self, Option<ConfigError>) {
        match self.validate() {
            Ok(()) => (self, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            sample_period_ms: 5000,
            flow: FlowMeterConfig::default(),
            fluid: FluidProperties::WATER,
            max_stale_samples: 3,
            link: LinkConfig::default(),
        }
    }
}
