#![deny(warnings)]
//! Network side of the meter
//!
//! The network exists only to calibrate the wall clock; metering never waits
//! on it.
//!
//! - **`client`**: `NetworkClient` trait for protocol implementations
//! - **`config`**: Configuration structs with `Default` implementations
//! - **`error`**: Simple error enum for network operations
//! - **`manager`**: link driver executing the bounded-retry state machine
//! - **`sntp`**: SNTP client implementing `NetworkClient`

pub mod client;
pub mod config;
pub mod error;
pub mod manager;
pub mod sntp;

pub use config::{NetworkConfig, SntpConfig};
pub use sntp::SntpClient;
