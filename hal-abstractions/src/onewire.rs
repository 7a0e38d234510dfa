//! Bit-banged 1-Wire bus master (standard speed)
//!
//! Slot timings follow Maxim application note 126. The data pin must be
//! open drain with an external pull-up (4.7 kΩ typical): `set_low` drives the
//! line, `set_high` releases it.
//!
//! Each time slot runs inside a critical section. A slot is at most ~70 µs,
//! and the sample point must land within 15 µs of the falling edge, so an
//! interrupt in the middle would corrupt the bit. Reset masks interrupts
//! only around the presence sample.

use btu_core::error::SensorError;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

/// Reset pulse low time (µs)
const RESET_LOW_US: u32 = 480;
/// Wait after releasing the bus before sampling presence (µs)
const PRESENCE_SAMPLE_US: u32 = 70;
/// Remainder of the reset recovery window (µs)
const RESET_RECOVERY_US: u32 = 410;
/// Short low pulse starting a write-1 or read slot (µs)
const SLOT_START_US: u32 = 6;
/// Low time of a write-0 slot (µs)
const WRITE_ZERO_LOW_US: u32 = 60;
/// Release time finishing a write-1 slot (µs)
const WRITE_ONE_RELEASE_US: u32 = 64;
/// Release time finishing a write-0 slot (µs)
const WRITE_ZERO_RELEASE_US: u32 = 10;
/// Wait after releasing before sampling a read slot (µs)
const READ_SAMPLE_US: u32 = 9;
/// Remainder of a read slot (µs)
const READ_RECOVERY_US: u32 = 55;

/// 1-Wire bus on a single open-drain pin
pub struct OneWire<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> OneWire<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    /// Take ownership of the data pin and a microsecond-capable delay
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }

    /// Send a reset pulse; returns `true` if a device answered with presence
    ///
    /// Only the release-to-sample window masks interrupts. The low pulse is
    /// a minimum and the recovery time has no upper bound, so an interrupt
    /// stretching either is harmless.
    pub fn reset(&mut self) -> Result<bool, SensorError> {
        self.pin.set_low().map_err(|_| SensorError::BusFault)?;
        self.delay.delay_us(RESET_LOW_US);
        let present = critical_section::with(|_| {
            self.pin.set_high().map_err(|_| SensorError::BusFault)?;
            self.delay.delay_us(PRESENCE_SAMPLE_US);
            self.pin.is_low().map_err(|_| SensorError::BusFault)
        })?;
        self.delay.delay_us(RESET_RECOVERY_US);
        Ok(present)
    }

    /// Write a single bit
    pub fn write_bit(&mut self, bit: bool) -> Result<(), SensorError> {
        let (low_us, release_us) = if bit {
            (SLOT_START_US, WRITE_ONE_RELEASE_US)
        } else {
            (WRITE_ZERO_LOW_US, WRITE_ZERO_RELEASE_US)
        };
        critical_section::with(|_| {
            self.pin.set_low().map_err(|_| SensorError::BusFault)?;
            self.delay.delay_us(low_us);
            self.pin.set_high().map_err(|_| SensorError::BusFault)?;
            self.delay.delay_us(release_us);
            Ok(())
        })
    }

    /// Read a single bit
    pub fn read_bit(&mut self) -> Result<bool, SensorError> {
        critical_section::with(|_| {
            self.pin.set_low().map_err(|_| SensorError::BusFault)?;
            self.delay.delay_us(SLOT_START_US);
            self.pin.set_high().map_err(|_| SensorError::BusFault)?;
            self.delay.delay_us(READ_SAMPLE_US);
            let bit = self.pin.is_high().map_err(|_| SensorError::BusFault)?;
            self.delay.delay_us(READ_RECOVERY_US);
            Ok(bit)
        })
    }

    /// Write a byte, least significant bit first
    pub fn write_byte(&mut self, byte: u8) -> Result<(), SensorError> {
        for i in 0..8 {
            self.write_bit(byte & (1 << i) != 0)?;
        }
        Ok(())
    }

    /// Read a byte, least significant bit first
    pub fn read_byte(&mut self) -> Result<u8, SensorError> {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    /// Write a sequence of bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), SensorError> {
        bytes.iter().try_for_each(|&b| self.write_byte(b))
    }

    /// Fill `buf` with bytes read from the bus
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), SensorError> {
        for slot in buf.iter_mut() {
            *slot = self.read_byte()?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted open-drain pin and recording delay for driver tests

    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

    /// Bus activity as seen by the mocks
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Event {
        Low,
        Release,
        Delay(u32),
        Sample,
        AsyncDelay(u32),
    }

    /// Shared event log
    pub type Log = Rc<RefCell<Vec<Event>>>;

    pub struct ScriptedPin {
        pub log: Log,
        /// Levels returned by successive samples (true = high)
        pub levels: VecDeque<bool>,
    }

    impl ScriptedPin {
        pub fn new(log: Log, levels: impl IntoIterator<Item = bool>) -> Self {
            Self {
                log,
                levels: levels.into_iter().collect(),
            }
        }

        fn sample(&mut self) -> bool {
            self.log.borrow_mut().push(Event::Sample);
            // Released bus with nobody driving it floats high
            self.levels.pop_front().unwrap_or(true)
        }
    }

    impl ErrorType for ScriptedPin {
        type Error = core::convert::Infallible;
    }

    impl OutputPin for ScriptedPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.log.borrow_mut().push(Event::Low);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.log.borrow_mut().push(Event::Release);
            Ok(())
        }
    }

    impl InputPin for ScriptedPin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(self.sample())
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(!self.sample())
        }
    }

    pub struct RecordingDelay {
        pub log: Log,
    }

    impl embedded_hal::delay::DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.log.borrow_mut().push(Event::Delay(ns / 1000));
        }

        fn delay_us(&mut self, us: u32) {
            self.log.borrow_mut().push(Event::Delay(us));
        }
    }

    impl embedded_hal_async::delay::DelayNs for RecordingDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.log.borrow_mut().push(Event::AsyncDelay(ns / 1000));
        }

        async fn delay_us(&mut self, us: u32) {
            self.log.borrow_mut().push(Event::AsyncDelay(us));
        }
    }

    /// Reconstruct the bytes the master wrote from the event log
    pub fn written_bytes(log: &[Event]) -> Vec<u8> {
        let mut bits = Vec::new();
        for (i, event) in log.iter().enumerate() {
            if *event != Event::Low {
                continue;
            }
            match (log.get(i + 1), log.get(i + 3)) {
                (Some(Event::Delay(60)), _) => bits.push(false),
                (Some(Event::Delay(6)), Some(Event::Delay(64))) => bits.push(true),
                _ => {}
            }
        }
        bits.chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |byte, (n, &bit)| byte | ((bit as u8) << n))
            })
            .collect()
    }

    /// Sample levels that make the slave answer `bytes`, LSB first
    pub fn levels_for(bytes: &[u8]) -> Vec<bool> {
        bytes
            .iter()
            .flat_map(|&b| (0..8).map(move |n| b & (1 << n) != 0))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;

    fn bus(levels: Vec<bool>) -> (OneWire<ScriptedPin, RecordingDelay>, Log) {
        let log = Log::default();
        let pin = ScriptedPin::new(log.clone(), levels);
        let delay = RecordingDelay { log: log.clone() };
        (OneWire::new(pin, delay), log)
    }

    #[test]
    fn test_reset_detects_presence() {
        let (mut ow, log) = bus(vec![false]);
        assert_eq!(ow.reset(), Ok(true));
        assert_eq!(
            *log.borrow(),
            [
                Event::Low,
                Event::Delay(480),
                Event::Release,
                Event::Delay(70),
                Event::Sample,
                Event::Delay(410),
            ]
        );
    }

    /// Delay that records whether another thread could enter a critical
    /// section while it ran, i.e. whether interrupts would have been masked
    struct MaskCheckingDelay {
        waits: Vec<(u32, bool)>,
    }

    fn interrupts_masked() -> bool {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            critical_section::with(|_| {
                let _ = tx.send(());
            })
        });
        rx.recv_timeout(std::time::Duration::from_millis(200)).is_err()
    }

    impl embedded_hal::delay::DelayNs for MaskCheckingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.delay_us(ns / 1000);
        }

        fn delay_us(&mut self, us: u32) {
            self.waits.push((us, interrupts_masked()));
        }
    }

    #[test]
    fn test_reset_masks_interrupts_only_around_presence_sample() {
        let pin = ScriptedPin::new(Log::default(), vec![false]);
        let mut ow = OneWire::new(pin, MaskCheckingDelay { waits: Vec::new() });
        assert_eq!(ow.reset(), Ok(true));

        let OneWire { delay, .. } = ow;
        assert_eq!(delay.waits, [(480, false), (70, true), (410, false)]);
    }

    #[test]
    fn test_reset_without_device() {
        let (mut ow, _) = bus(vec![]);
        assert_eq!(ow.reset(), Ok(false));
    }

    #[test]
    fn test_read_byte_lsb_first() {
        let (mut ow, _) = bus(levels_for(&[0xA5]));
        assert_eq!(ow.read_byte(), Ok(0xA5));
    }

    #[test]
    fn test_write_bytes_lsb_first() {
        let (mut ow, log) = bus(vec![]);
        ow.write_bytes(&[0xCC, 0x44]).unwrap();
        assert_eq!(written_bytes(&log.borrow()), [0xCC, 0x44]);
        // Writes never sample the bus
        assert!(!log.borrow().contains(&Event::Sample));
    }

    #[test]
    fn test_read_bytes_fills_buffer() {
        let (mut ow, _) = bus(levels_for(&[0x01, 0x80, 0xFF]));
        let mut buf = [0u8; 3];
        ow.read_bytes(&mut buf).unwrap();
        assert_eq!(buf, [0x01, 0x80, 0xFF]);
    }
}
