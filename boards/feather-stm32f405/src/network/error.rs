#![deny(unsafe_code)]
#![deny(warnings)]
//! Network client error types

use defmt::Format;

/// Network client operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum NetworkError {
    /// DNS resolution failed
    DnsError,
    /// Socket bind or send error
    SocketError,
    /// No response before the request timeout
    Timeout,
    /// Short packet, wrong source, or wrong mode
    InvalidResponse,
    /// Server unsynchronized or stratum above the configured limit
    ServerError,
    /// Every configured server failed
    AllServersFailed,
}

impl core::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DnsError => write!(f, "DNS resolution failed"),
            Self::SocketError => write!(f, "Socket error"),
            Self::Timeout => write!(f, "Request timeout"),
            Self::InvalidResponse => write!(f, "Invalid response"),
            Self::ServerError => write!(f, "Server error"),
            Self::AllServersFailed => write!(f, "All servers failed"),
        }
    }
}

impl core::error::Error for NetworkError {}
