//! DS18B20 digital thermometer on a dedicated 1-Wire bus
//!
//! Each probe sits alone on its own pin, so ROM addressing is skipped
//! (`SKIP ROM`) and no search is performed. The probe must be externally
//! powered; parasite power is not supported.

use btu_core::ds18b20::{decode_scratchpad, Resolution, SCRATCHPAD_LEN};
use btu_core::error::SensorError;
use btu_core::units::celsius_to_fahrenheit;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::onewire::OneWire;
use crate::probe::TemperatureProbe;

const CMD_SKIP_ROM: u8 = 0xCC;
const CMD_CONVERT_T: u8 = 0x44;
const CMD_WRITE_SCRATCHPAD: u8 = 0x4E;
const CMD_READ_SCRATCHPAD: u8 = 0xBE;

/// Alarm thresholds written with the configuration byte (power-on values)
const ALARM_HIGH: u8 = 0x4B;
const ALARM_LOW: u8 = 0x46;

/// A single DS18B20 on its own bus
///
/// `D` times the individual bit slots and must be accurate to about a
/// microsecond. `A` is awaited during the conversion so other tasks can run.
pub struct Ds18b20<P, D, A> {
    bus: OneWire<P, D>,
    conversion_delay: A,
    resolution: Resolution,
}

impl<P, D, A> Ds18b20<P, D, A>
where
    P: InputPin + OutputPin,
    D: DelayNs,
    A: embedded_hal_async::delay::DelayNs,
{
    pub fn new(bus: OneWire<P, D>, conversion_delay: A, resolution: Resolution) -> Self {
        Self {
            bus,
            conversion_delay,
            resolution,
        }
    }

    /// Write the configured resolution into the probe's scratchpad
    ///
    /// The setting is volatile; call again after the probe loses power.
    pub fn configure(&mut self) -> Result<(), SensorError> {
        self.select()?;
        self.bus.write_bytes(&[
            CMD_WRITE_SCRATCHPAD,
            ALARM_HIGH,
            ALARM_LOW,
            self.resolution.config_byte(),
        ])
    }

    /// Start a conversion, wait for it, and return degrees Celsius
    pub async fn read_celsius(&mut self) -> Result<f32, SensorError> {
        self.select()?;
        self.bus.write_byte(CMD_CONVERT_T)?;

        embedded_hal_async::delay::DelayNs::delay_us(
            &mut self.conversion_delay,
            self.resolution.conversion_time_us(),
        )
        .await;

        self.select()?;
        self.bus.write_byte(CMD_READ_SCRATCHPAD)?;
        let mut scratchpad = [0u8; SCRATCHPAD_LEN];
        self.bus.read_bytes(&mut scratchpad)?;

        #[cfg(feature = "defmt")]
        defmt::debug!("DS18B20 scratchpad: {:02x}", scratchpad);

        decode_scratchpad(&scratchpad)
    }

    /// Reset the bus and address the only device on it
    fn select(&mut self) -> Result<(), SensorError> {
        if !self.bus.reset()? {
            return Err(SensorError::NotPresent);
        }
        self.bus.write_byte(CMD_SKIP_ROM)
    }
}

impl<P, D, A> TemperatureProbe for Ds18b20<P, D, A>
where
    P: InputPin + OutputPin,
    D: DelayNs,
    A: embedded_hal_async::delay::DelayNs,
{
    async fn read_fahrenheit(&mut self) -> Result<f32, SensorError> {
        self.read_celsius().await.map(celsius_to_fahrenheit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onewire::mock::*;
    use btu_core::ds18b20::crc8;
    use embassy_futures::block_on;

    type TestProbe = Ds18b20<ScriptedPin, RecordingDelay, RecordingDelay>;

    fn probe(levels: Vec<bool>, resolution: Resolution) -> (TestProbe, Log) {
        let log = Log::default();
        let pin = ScriptedPin::new(log.clone(), levels);
        let bus = OneWire::new(pin, RecordingDelay { log: log.clone() });
        let probe = Ds18b20::new(bus, RecordingDelay { log: log.clone() }, resolution);
        (probe, log)
    }

    fn scratchpad(raw: i16) -> [u8; SCRATCHPAD_LEN] {
        let [lsb, msb] = raw.to_le_bytes();
        let mut pad = [lsb, msb, ALARM_HIGH, ALARM_LOW, 0x7F, 0xFF, 0x0C, 0x10, 0];
        pad[8] = crc8(&pad[..8]);
        pad
    }

    /// Presence on both resets, then the scratchpad bits
    fn answering(pad: &[u8]) -> Vec<bool> {
        let mut levels = vec![false, false];
        levels.extend(levels_for(pad));
        levels
    }

    #[test]
    fn test_read_celsius_command_sequence() {
        let (mut probe, log) = probe(answering(&scratchpad(0x0191)), Resolution::Bits12);

        let celsius = block_on(probe.read_celsius()).unwrap();
        assert_eq!(celsius, 25.0625);

        let log = log.borrow();
        assert_eq!(
            written_bytes(&log),
            [CMD_SKIP_ROM, CMD_CONVERT_T, CMD_SKIP_ROM, CMD_READ_SCRATCHPAD]
        );
        assert!(log.contains(&Event::AsyncDelay(750_000)));
    }

    #[test]
    fn test_read_fahrenheit_converts() {
        let (mut probe, _) = probe(answering(&scratchpad(0x0320)), Resolution::Bits12);
        // 50 °C
        let fahrenheit = block_on(probe.read_fahrenheit()).unwrap();
        assert!((fahrenheit - 122.0).abs() < 1e-4);
    }

    #[test]
    fn test_missing_probe_reports_not_present() {
        let (mut probe, log) = probe(vec![], Resolution::Bits12);
        assert_eq!(
            block_on(probe.read_celsius()),
            Err(SensorError::NotPresent)
        );
        // Nothing is written after a failed presence check
        assert!(written_bytes(&log.borrow()).is_empty());
    }

    #[test]
    fn test_corrupt_scratchpad_rejected() {
        let mut pad = scratchpad(0x0191);
        pad[0] ^= 0x01;
        let (mut probe, _) = probe(answering(&pad), Resolution::Bits12);
        assert_eq!(
            block_on(probe.read_celsius()),
            Err(SensorError::CrcMismatch)
        );
    }

    #[test]
    fn test_conversion_wait_tracks_resolution() {
        let (mut probe, log) = probe(answering(&scratchpad(0x0190)), Resolution::Bits9);
        block_on(probe.read_celsius()).unwrap();
        assert!(log.borrow().contains(&Event::AsyncDelay(93_750)));
    }

    #[test]
    fn test_configure_writes_resolution() {
        let (mut probe, log) = probe(vec![false], Resolution::Bits10);
        probe.configure().unwrap();
        assert_eq!(
            written_bytes(&log.borrow()),
            [CMD_SKIP_ROM, CMD_WRITE_SCRATCHPAD, ALARM_HIGH, ALARM_LOW, 0x3F]
        );
    }
}
