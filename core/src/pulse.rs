//! Flow meter pulse accumulator
//!
//! The edge handler is the only writer of the counters. Every other context
//! reads through [`PulseAccumulator::take`], an atomic exchange with zero, so
//! a pulse recorded concurrently with a take lands in exactly one snapshot.
//!
//! Cortex-M3 and above have native 32-bit read-modify-write atomics, so no
//! critical section is needed on the hot path.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Interrupt-safe flow pulse counter with optional debounce
pub struct PulseAccumulator {
    count: AtomicU32,
    rejected: AtomicU32,
    last_edge: AtomicU32,
    seen_edge: AtomicBool,
    debounce_ticks: u32,
}

impl PulseAccumulator {
    /// Create an accumulator
    ///
    /// Edges arriving less than `debounce_ticks` after the previously accepted
    /// edge are treated as contact bounce or noise. Zero disables debouncing.
    pub const fn new(debounce_ticks: u32) -> Self {
        Self {
            count: AtomicU32::new(0),
            rejected: AtomicU32::new(0),
            last_edge: AtomicU32::new(0),
            seen_edge: AtomicBool::new(false),
            debounce_ticks,
        }
    }

    /// Record one edge seen at `now_ticks` (free-running timer, may wrap)
    ///
    /// O(1), never blocks. Call only from the edge handler.
    #[inline]
    pub fn record_edge(&self, now_ticks: u32) {
        if self.debounce_ticks > 0 && self.seen_edge.load(Ordering::Relaxed) {
            let since_last = now_ticks.wrapping_sub(self.last_edge.load(Ordering::Relaxed));
            if since_last < self.debounce_ticks {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        self.last_edge.store(now_ticks, Ordering::Relaxed);
        self.seen_edge.store(true, Ordering::Relaxed);
        // NOTE: wraps on overflow; the sampler takes the count every period
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Return the pulses accepted since the last take and reset to zero
    pub fn take(&self) -> u32 {
        self.count.swap(0, Ordering::AcqRel)
    }

    /// Return the edges rejected by debounce since the last call and reset
    pub fn take_rejected(&self) -> u32 {
        self.rejected.swap(0, Ordering::AcqRel)
    }

    /// Debounce window in timer ticks
    pub const fn debounce_ticks(&self) -> u32 {
        self.debounce_ticks
    }
}

impl Default for PulseAccumulator {
    fn default() -> Self {
        Self::new(0)
    }
}
