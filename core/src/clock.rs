//! Wall-clock time derived from a monotonic timer
//!
//! Works like `CLOCK_REALTIME` on Linux: after an NTP exchange the clock is
//! calibrated with the Unix time and the monotonic timer value captured at
//! the same instant. Afterwards `now = base_unix + (mono - base_mono)`.
//!
//! The monotonic base is the full 64-bit microsecond count, so the clock
//! keeps running between resyncs however long the link stays down.
//! Uncalibrated reads return [`Timestamp::UNSET`].

use core::cell::Cell;
use critical_section::Mutex;

/// NTP epoch offset (1900-01-01 to 1970-01-01 in seconds)
pub const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// Timestamp with microsecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp {
    /// Unix timestamp in seconds since epoch (1970-01-01 00:00:00 UTC)
    pub unix_secs: u64,
    /// Microseconds component (0-999,999)
    pub micros: u32,
}

impl Timestamp {
    /// Wall clock not yet calibrated
    pub const UNSET: Self = Self::new(0, 0);

    /// Create a new timestamp
    pub const fn new(unix_secs: u64, micros: u32) -> Self {
        Self { unix_secs, micros }
    }

    /// Convert from NTP timestamp (seconds since 1900-01-01)
    pub fn from_ntp(ntp_secs: u64, ntp_frac: u32) -> Self {
        let unix_secs = ntp_secs.saturating_sub(NTP_UNIX_OFFSET);
        // NTP fraction is in units of 2^-32 seconds
        let micros = ((ntp_frac as u64 * 1_000_000) >> 32) as u32;
        Self::new(unix_secs, micros)
    }

    /// Add microseconds, carrying into seconds
    pub fn add_micros(self, micros: u64) -> Self {
        let total = self.micros as u64 + micros;
        Self::new(
            self.unix_secs.saturating_add(total / 1_000_000),
            (total % 1_000_000) as u32,
        )
    }

    /// True once the wall clock has been calibrated
    pub const fn is_set(&self) -> bool {
        self.unix_secs != 0
    }
}

#[derive(Clone, Copy)]
struct Calibration {
    base: Timestamp,
    base_mono_us: u64,
}

/// SNTP-calibrated wall clock
pub struct WallClock {
    calibration: Mutex<Cell<Option<Calibration>>>,
}

impl WallClock {
    /// Create an uncalibrated clock
    pub const fn new() -> Self {
        Self {
            calibration: Mutex::new(Cell::new(None)),
        }
    }

    /// Calibrate with `unix` time observed at monotonic time `mono_us`
    pub fn calibrate(&self, unix: Timestamp, mono_us: u64) {
        let calibration = Calibration {
            base: unix,
            base_mono_us: mono_us,
        };
        critical_section::with(|cs| self.calibration.borrow(cs).set(Some(calibration)));
    }

    /// Has at least one calibration happened
    pub fn is_calibrated(&self) -> bool {
        critical_section::with(|cs| self.calibration.borrow(cs).get().is_some())
    }

    /// Current wall-clock time for monotonic time `mono_us`
    pub fn now(&self, mono_us: u64) -> Timestamp {
        let Some(cal) = critical_section::with(|cs| self.calibration.borrow(cs).get()) else {
            return Timestamp::UNSET;
        };
        cal.base.add_micros(mono_us.saturating_sub(cal.base_mono_us))
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}
