//! Per-period conversion of raw meter state into a [`Reading`]

use crate::clock::Timestamp;
use crate::config::MeterConfig;
use crate::energy::{btu_per_hour, HeatFlow};
use crate::error::SensorError;
use crate::flow::{flow_rate_gpm, gallons};
use crate::reading::{Reading, SensorSample, Totals};
use crate::units::MICROS_PER_HOUR;

/// Sampler state owned by the sampling task
pub struct Sampler {
    config: MeterConfig,
    last_sample_us: u64,
    totals: Totals,
}

impl Sampler {
    /// Create a sampler whose first period starts at `now_us`
    pub fn new(config: MeterConfig, now_us: u64) -> Self {
        Self {
            config,
            last_sample_us: now_us,
            totals: Totals::default(),
        }
    }

    /// Volume and energy accumulated since construction
    pub fn totals(&self) -> Totals {
        self.totals
    }

    /// Close the current period and derive its reading
    ///
    /// `pulses` must be the accumulator snapshot taken at `now_us`.
    pub fn sample(
        &mut self,
        pulses: u32,
        now_us: u64,
        supply_temp_f: f32,
        return_temp_f: f32,
        timestamp: Timestamp,
    ) -> Reading {
        let elapsed_us = self.close_period(now_us);
        let k = self.config.flow.pulses_per_gallon;

        let sample = SensorSample {
            supply_temp_f,
            return_temp_f,
            timestamp,
            uptime_us: now_us,
        };
        let flow_rate_gpm = flow_rate_gpm(pulses, k, elapsed_us);
        let btu_per_hour = btu_per_hour(
            flow_rate_gpm,
            supply_temp_f,
            return_temp_f,
            &self.config.fluid,
        );

        self.totals.gallons += gallons(pulses, k) as f64;
        self.totals.btu += btu_per_hour as f64 * elapsed_us as f64 / MICROS_PER_HOUR;

        Reading {
            sample,
            pulses,
            flow_rate_gpm,
            delta_t: sample.delta_t().abs(),
            btu_per_hour,
            heat_flow: HeatFlow::classify(flow_rate_gpm, sample.delta_t()),
        }
    }

    /// Close a period for which no temperatures are available
    ///
    /// The volume still counts; energy for the period is unknown and not added.
    pub fn skip(&mut self, pulses: u32, now_us: u64) {
        self.close_period(now_us);
        self.totals.gallons += gallons(pulses, self.config.flow.pulses_per_gallon) as f64;
    }

    fn close_period(&mut self, now_us: u64) -> u64 {
        let elapsed_us = now_us.saturating_sub(self.last_sample_us);
        self.last_sample_us = now_us;
        elapsed_us
    }
}

/// Holds a probe's last good value across a bounded number of failed reads
#[derive(Debug, Clone, Copy)]
pub struct StaleHold {
    last_good: Option<f32>,
    misses: u8,
    max_misses: u8,
}

impl StaleHold {
    /// Allow up to `max_misses` consecutive failures to reuse the last value
    pub const fn new(max_misses: u8) -> Self {
        Self {
            last_good: None,
            misses: 0,
            max_misses,
        }
    }

    /// Feed one read result; returns the value to use this period
    ///
    /// A fresh value resets the miss count. A failure yields the last good
    /// value while misses stay within the limit, then the error itself.
    pub fn update(&mut self, result: Result<f32, SensorError>) -> Result<f32, SensorError> {
        match result {
            Ok(value) => {
                self.last_good = Some(value);
                self.misses = 0;
                Ok(value)
            }
            Err(e) => {
                self.misses = self.misses.saturating_add(1);
                match self.last_good {
                    Some(value) if self.misses <= self.max_misses => Ok(value),
                    _ => Err(e),
                }
            }
        }
    }

    /// Consecutive failed reads
    pub fn misses(&self) -> u8 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlowMeterConfig;

    fn config() -> MeterConfig {
        MeterConfig {
            flow: FlowMeterConfig {
                pulses_per_gallon: 100.0,
                debounce_us: 0,
            },
            ..MeterConfig::default()
        }
    }

    #[test]
    fn test_reading_from_period() {
        let mut sampler = Sampler::new(config(), 1_000_000);
        // 25 gal in 5 s = 300 GPM
        let reading = sampler.sample(2_500, 6_000_000, 120.0, 110.0, Timestamp::UNSET);

        assert_eq!(reading.pulses, 2_500);
        assert!((reading.flow_rate_gpm - 300.0).abs() < 1e-3);
        assert_eq!(reading.delta_t, 10.0);
        assert!((reading.btu_per_hour - 300.0 * 499.8 * 10.0).abs() < 2.0);
        assert_eq!(reading.heat_flow, HeatFlow::Heating);
        assert_eq!(reading.sample.uptime_us, 6_000_000);
    }

    #[test]
    fn test_cooling_reading_has_positive_delta() {
        let mut sampler = Sampler::new(config(), 0);
        let reading = sampler.sample(100, 60_000_000, 45.0, 55.0, Timestamp::UNSET);
        assert_eq!(reading.delta_t, 10.0);
        assert!(reading.btu_per_hour > 0.0);
        assert_eq!(reading.heat_flow, HeatFlow::Cooling);
    }

    #[test]
    fn test_zero_elapsed_period_reports_zero_flow() {
        let mut sampler = Sampler::new(config(), 5_000);
        let reading = sampler.sample(50, 5_000, 120.0, 100.0, Timestamp::UNSET);
        assert_eq!(reading.flow_rate_gpm, 0.0);
        assert_eq!(reading.btu_per_hour, 0.0);
        assert_eq!(reading.heat_flow, HeatFlow::Idle);
    }

    #[test]
    fn test_totals_accumulate() {
        let mut sampler = Sampler::new(config(), 0);
        // 1 GPM for one hour at 10 F = 4998 BTU
        sampler.sample(6_000, 3_600_000_000, 130.0, 120.0, Timestamp::UNSET);
        sampler.skip(100, 3_700_000_000);

        let totals = sampler.totals();
        assert!((totals.gallons - 61.0).abs() < 1e-6);
        assert!((totals.btu - 499.8 * 10.0).abs() < 1.0);
    }

    #[test]
    fn test_period_restarts_after_skip() {
        let mut sampler = Sampler::new(config(), 0);
        sampler.skip(0, 10_000_000);
        let reading = sampler.sample(100, 70_000_000, 120.0, 110.0, Timestamp::UNSET);
        // 1 gal over 60 s, not 70 s
        assert!((reading.flow_rate_gpm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_stale_hold_bounded() {
        let mut hold = StaleHold::new(2);
        assert_eq!(
            hold.update(Err(SensorError::NotPresent)),
            Err(SensorError::NotPresent)
        );
        assert_eq!(hold.update(Ok(70.0)), Ok(70.0));
        assert_eq!(hold.update(Err(SensorError::CrcMismatch)), Ok(70.0));
        assert_eq!(hold.update(Err(SensorError::CrcMismatch)), Ok(70.0));
        assert_eq!(hold.misses(), 2);
        assert_eq!(
            hold.update(Err(SensorError::CrcMismatch)),
            Err(SensorError::CrcMismatch)
        );
        assert_eq!(hold.update(Ok(71.5)), Ok(71.5));
        assert_eq!(hold.misses(), 0);
    }
}
