//! Meter error types

/// Temperature probe read errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// No presence pulse, or the line reads all ones
    NotPresent,
    /// Scratchpad CRC-8 did not match
    CrcMismatch,
    /// Scratchpad still holds the power-on reset value
    ConversionPending,
    /// Pin-level error on the sensor bus
    BusFault,
}

impl core::fmt::Display for SensorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotPresent => write!(f, "Sensor not present"),
            Self::CrcMismatch => write!(f, "Scratchpad CRC mismatch"),
            Self::ConversionPending => write!(f, "Conversion not complete"),
            Self::BusFault => write!(f, "Sensor bus fault"),
        }
    }
}

impl core::error::Error for SensorError {}

/// Meter configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Sample period must be non-zero
    ZeroSamplePeriod,
    /// Pulses-per-gallon must be positive and finite
    InvalidCalibration,
    /// Fluid density and specific heat must be positive and finite
    InvalidFluid,
    /// Link retry limits must be non-zero
    InvalidLinkConfig,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ZeroSamplePeriod => write!(f, "Sample period is zero"),
            Self::InvalidCalibration => write!(f, "Invalid pulses-per-gallon"),
            Self::InvalidFluid => write!(f, "Invalid fluid properties"),
            Self::InvalidLinkConfig => write!(f, "Invalid link retry configuration"),
        }
    }
}

impl core::error::Error for ConfigError {}
