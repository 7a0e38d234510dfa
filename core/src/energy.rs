//! Heat-transfer rate from flow and temperature differential
//!
//! `BTU/hr = GPM * 60 * density (lb/gal) * specific heat (BTU/lb/F) * |dT|`.
//! For water this is the familiar `500 * GPM * dT` rule of thumb.

use crate::units::MINUTES_PER_HOUR;

/// Temperature differential below which the loop is considered idle (F)
pub const IDLE_DEAD_BAND_F: f32 = 0.1;

/// Heat-carrying properties of the loop fluid
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FluidProperties {
    /// Density in pounds per US gallon
    pub density_lb_per_gal: f32,
    /// Specific heat in BTU per pound per degree F
    pub specific_heat_btu_per_lb_f: f32,
}

impl FluidProperties {
    /// Plain water near room temperature
    pub const WATER: Self = Self {
        density_lb_per_gal: 8.33,
        specific_heat_btu_per_lb_f: 1.0,
    };

    /// BTU/hr carried per GPM per degree F of differential
    pub fn btu_factor(&self) -> f32 {
        MINUTES_PER_HOUR * self.density_lb_per_gal * self.specific_heat_btu_per_lb_f
    }

    /// Both properties positive and finite
    pub fn is_valid(&self) -> bool {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        positive(self.density_lb_per_gal) && positive(self.specific_heat_btu_per_lb_f)
    }
}

impl Default for FluidProperties {
    fn default() -> Self {
        Self::WATER
    }
}

/// Heat-transfer rate in BTU per hour
///
/// Depends only on `|supply - return|`: a return warmer than the supply is a
/// cooling load, not an error.
pub fn btu_per_hour(flow_gpm: f32, supply_f: f32, return_f: f32, fluid: &FluidProperties) -> f32 {
    let delta_t = (supply_f - return_f).abs();
    flow_gpm * fluid.btu_factor() * delta_t
}

/// Direction of heat transfer in the metered loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeatFlow {
    /// Supply warmer than return: heat delivered to the load
    Heating,
    /// Return warmer than supply: heat removed from the load
    Cooling,
    /// No flow, or differential inside the dead band
    Idle,
}

impl HeatFlow {
    /// Classify a sample by flow and signed differential (supply - return)
    pub fn classify(flow_gpm: f32, delta_t: f32) -> Self {
        if flow_gpm <= 0.0 || delta_t.abs() < IDLE_DEAD_BAND_F {
            Self::Idle
        } else if delta_t > 0.0 {
            Self::Heating
        } else {
            Self::Cooling
        }
    }

    /// Lowercase label for the status line
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Heating => "heating",
            Self::Cooling => "cooling",
            Self::Idle => "idle",
        }
    }
}
