//! Sample and reading types produced once per sampling period

use core::fmt::Write;

use heapless::String;

use crate::clock::Timestamp;
use crate::energy::HeatFlow;

/// Maximum length of a formatted status line
pub const STATUS_LINE_LEN: usize = 128;

/// Raw temperatures captured in one sampling period
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorSample {
    /// Supply line temperature, degrees F
    pub supply_temp_f: f32,
    /// Return line temperature, degrees F
    pub return_temp_f: f32,
    /// Wall-clock time ([`Timestamp::UNSET`] until calibrated)
    pub timestamp: Timestamp,
    /// Monotonic time since boot in microseconds
    pub uptime_us: u64,
}

impl SensorSample {
    /// Signed differential, supply minus return
    pub fn delta_t(&self) -> f32 {
        self.supply_temp_f - self.return_temp_f
    }
}

/// Derived meter reading for one sampling period
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading {
    /// The sample this reading was derived from
    pub sample: SensorSample,
    /// Pulses counted during the period
    pub pulses: u32,
    /// Volumetric flow, US gallons per minute
    pub flow_rate_gpm: f32,
    /// Absolute temperature differential, degrees F
    pub delta_t: f32,
    /// Heat-transfer rate
    pub btu_per_hour: f32,
    /// Direction of heat transfer
    pub heat_flow: HeatFlow,
}

impl Reading {
    /// Render the human-readable status line
    ///
    /// Values in any plausible range fit in [`STATUS_LINE_LEN`]. If the
    /// buffer fills, the line simply stops after the last formatting
    /// fragment that fit, which may be in the middle of a number.
    pub fn status_line(&self) -> String<STATUS_LINE_LEN> {
        let mut line = String::new();
        // A full buffer only truncates the line
        let _ = write!(line, "{}", self);
        line
    }
}

impl core::fmt::Display for Reading {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "supply={:.2}F return={:.2}F dT={:.2}F flow={:.2}GPM rate={:.0}BTU/h {}",
            self.sample.supply_temp_f,
            self.sample.return_temp_f,
            self.delta_t,
            self.flow_rate_gpm,
            self.btu_per_hour,
            self.heat_flow.as_str(),
        )
    }
}

/// Energy and volume registers accumulated since boot
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Totals {
    /// US gallons passed through the meter
    pub gallons: f64,
    /// Heat transferred, BTU
    pub btu: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading() -> Reading {
        Reading {
            sample: SensorSample {
                supply_temp_f: 120.5,
                return_temp_f: 110.25,
                timestamp: Timestamp::UNSET,
                uptime_us: 5_000_000,
            },
            pulses: 255,
            flow_rate_gpm: 3.0,
            delta_t: 10.25,
            btu_per_hour: 15_368.85,
            heat_flow: HeatFlow::Heating,
        }
    }

    #[test]
    fn test_status_line_format() {
        let line = reading().status_line();
        assert_eq!(
            line.as_str(),
            "supply=120.50F return=110.25F dT=10.25F flow=3.00GPM rate=15369BTU/h heating"
        );
    }

    #[test]
    fn test_status_line_fits_extreme_values() {
        let mut r = reading();
        r.btu_per_hour = f32::MAX;
        let line = r.status_line();
        assert!(line.len() <= STATUS_LINE_LEN);
        assert!(line.starts_with("supply=120.50F"));
    }

    #[test]
    fn test_overflowing_line_is_cut_not_dropped() {
        let mut r = reading();
        r.sample.supply_temp_f = f32::MAX;
        r.sample.return_temp_f = f32::MAX;
        r.delta_t = f32::MAX;
        r.flow_rate_gpm = f32::MAX;
        r.btu_per_hour = f32::MAX;

        let line = r.status_line();
        assert!(line.len() <= STATUS_LINE_LEN);
        assert!(line.starts_with("supply=340282"));
        assert!(!line.ends_with("heating"));
    }

    #[test]
    fn test_signed_delta() {
        let mut sample = reading().sample;
        sample.return_temp_f = 130.0;
        assert_eq!(sample.delta_t(), -9.5);
    }
}
