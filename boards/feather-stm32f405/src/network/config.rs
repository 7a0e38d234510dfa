#![deny(unsafe_code)]
#![deny(warnings)]
//! Network configuration structures

/// SNTP client configuration
#[derive(Debug, Clone)]
pub struct SntpConfig {
    /// NTP servers to try (in order)
    pub servers: &'static [&'static str],
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Requests per server before moving to the next
    pub retry_count: usize,
    /// Pause between failed requests in milliseconds
    pub retry_delay_ms: u64,
    /// Maximum accepted stratum level (1-15)
    pub max_stratum: u8,
    /// Resync interval once the wall clock is calibrated
    pub resync_interval_ms: u64,
    /// Retry interval while the wall clock has never been calibrated
    pub unsynced_retry_ms: u64,
}

impl Default for SntpConfig {
    fn default() -> Self {
        Self {
            servers: &["pool.ntp.org", "time.google.com", "time.cloudflare.com"],
            timeout_ms: 5000,
            retry_count: 2,
            retry_delay_ms: 2000,
            max_stratum: 3,
            resync_interval_ms: 15 * 60 * 1000,
            unsynced_retry_ms: 60 * 1000,
        }
    }
}

/// Network stack configuration
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Locally administered MAC address for the W5500
    pub mac_addr: [u8; 6],
    /// Seed for the embassy-net stack (TCP sequence numbers, DHCP xid)
    pub seed: u64,
    /// W5500 SPI clock in Hz
    pub spi_hz: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mac_addr: [0x02, 0x00, 0x00, 0x42, 0x54, 0x55],
            seed: 0x4254_5530_u64,
            spi_hz: 10_000_000,
        }
    }
}
