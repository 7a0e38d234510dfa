//! Platform-agnostic core logic for the BTU meter firmware
//!
//! This crate contains the metering logic shared by every supported board.
//! It has NO hardware dependencies and builds on the host for testing.
//!
//! - **`pulse`**: interrupt-safe flow pulse accumulator
//! - **`flow`**: pulse count to volumetric flow rate
//! - **`energy`**: heat-transfer rate from flow and temperature differential
//! - **`sampler`**: per-period conversion of raw state into a [`Reading`]
//! - **`ds18b20`**: DS18B20 scratchpad decoding and CRC-8
//! - **`link`**: bounded-retry connectivity state machine
//! - **`clock`**: wall-clock time calibrated against a monotonic timer

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![deny(warnings)]

pub mod clock;
pub mod config;
pub mod ds18b20;
pub mod energy;
pub mod error;
pub mod flow;
pub mod link;
pub mod pulse;
pub mod reading;
pub mod sampler;
pub mod units;

pub use clock::{Timestamp, WallClock};
pub use config::{FlowMeterConfig, MeterConfig};
pub use energy::{FluidProperties, HeatFlow};
pub use error::{ConfigError, SensorError};
pub use link::{LinkAction, LinkConfig, LinkManager, LinkState, SharedLinkState};
pub use pulse::PulseAccumulator;
pub use reading::{Reading, SensorSample, Totals};
pub use sampler::{Sampler, StaleHold};
