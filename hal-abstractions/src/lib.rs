//! Hardware abstraction traits and drivers for BTU meter sensors
//!
//! This crate defines the probe traits the firmware samples through, plus
//! drivers written against `embedded-hal` 1.0 so any BSP pin and delay
//! implementation can back them.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![deny(warnings)]

pub mod ds18b20;
pub mod onewire;
pub mod probe;

pub use ds18b20::Ds18b20;
pub use onewire::OneWire;
pub use probe::TemperatureProbe;
