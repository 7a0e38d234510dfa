#![deny(unsafe_code)]
#![deny(warnings)]
//! Board time sources
//!
//! The TIM2 monotonic (1 MHz, 64-bit extended) is the only time base. The
//! wall clock is derived from it after SNTP calibration and also stamps
//! every defmt log frame: milliseconds since the Unix epoch, or uptime
//! counted from 1970-01-01 before the first sync.

use btu_core::clock::WallClock;
use rtic_monotonics::Monotonic;

use crate::Mono;

static WALL_CLOCK: WallClock = WallClock::new();

/// The board's wall clock
pub fn wall_clock() -> &'static WallClock {
    &WALL_CLOCK
}

/// Monotonic time in microseconds since boot
pub fn uptime_us() -> u64 {
    Mono::now().ticks()
}

defmt::timestamp!("{=u64:iso8601ms}", {
    let now_us = uptime_us();
    let ts = WALL_CLOCK.now(now_us);
    if ts.is_set() {
        ts.unix_secs * 1000 + (ts.micros / 1000) as u64
    } else {
        now_us / 1000
    }
});
