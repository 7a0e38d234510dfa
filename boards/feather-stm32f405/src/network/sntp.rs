#![deny(unsafe_code)]
#![deny(warnings)]
//! SNTP client calibrating the wall clock

use btu_core::clock::{Timestamp, WallClock};
use defmt::{error, info, warn, Debug2Format};
use embassy_futures::select::{select, Either};
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpEndpoint, Stack};
use rtic_monotonics::fugit::ExtU64;
use rtic_monotonics::Monotonic;

use crate::Mono;

use super::client::NetworkClient;
use super::config::SntpConfig;
use super::error::NetworkError;

const NTP_PORT: u16 = 123;
const NTP_PACKET_LEN: usize = 48;
/// LI = 0, VN = 3, Mode = 3 (client)
const NTP_CLIENT_REQUEST: u8 = 0x1B;
const NTP_MODE_SERVER: u8 = 4;
/// Leap indicator value for an unsynchronized server
const NTP_LI_ALARM: u8 = 3;

/// SNTP client for wall-clock calibration
pub struct SntpClient {
    config: SntpConfig,
    clock: &'static WallClock,
}

impl SntpClient {
    pub fn new(config: SntpConfig, clock: &'static WallClock) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &SntpConfig {
        &self.config
    }

    /// Has any sync succeeded since boot
    pub fn is_calibrated(&self) -> bool {
        self.clock.is_calibrated()
    }

    /// Try each server in turn until one answers with a usable time
    async fn sync(&self, stack: &Stack<'static>) -> Result<Timestamp, NetworkError> {
        info!("Starting SNTP synchronization");
        for server in self.config.servers {
            for attempt in 0..self.config.retry_count {
                info!("SNTP request to {} (attempt {})", server, attempt + 1);
                match self.request(stack, server).await {
                    Ok(timestamp) => return Ok(timestamp),
                    Err(e) => {
                        warn!("SNTP request to {} failed: {}", server, e);
                        Mono::delay(self.config.retry_delay_ms.millis()).await;
                    }
                }
            }
        }
        error!("All SNTP servers failed");
        Err(NetworkError::AllServersFailed)
    }

    async fn request(&self, stack: &Stack<'static>, server: &str) -> Result<Timestamp, NetworkError> {
        let server_ip = stack
            .dns_query(server, DnsQueryType::A)
            .await
            .map_err(|_| NetworkError::DnsError)?
            .first()
            .copied()
            .ok_or(NetworkError::DnsError)?;
        let server_endpoint = IpEndpoint::new(server_ip, NTP_PORT);

        let mut rx_meta = [PacketMetadata::EMPTY; 2];
        let mut rx_buffer = [0u8; 64];
        let mut tx_meta = [PacketMetadata::EMPTY; 2];
        let mut tx_buffer = [0u8; 64];
        let mut socket = UdpSocket::new(
            *stack,
            &mut rx_meta,
            &mut rx_buffer,
            &mut tx_meta,
            &mut tx_buffer,
        );
        socket.bind(0).map_err(|_| NetworkError::SocketError)?;

        let mut packet = [0u8; NTP_PACKET_LEN];
        packet[0] = NTP_CLIENT_REQUEST;
        let sent_at = Mono::now();
        socket
            .send_to(&packet, server_endpoint)
            .await
            .map_err(|_| NetworkError::SocketError)?;

        let mut response = [0u8; NTP_PACKET_LEN];
        let (len, from) = match select(
            Mono::delay(self.config.timeout_ms.millis()),
            socket.recv_from(&mut response),
        )
        .await
        {
            Either::First(()) => return Err(NetworkError::Timeout),
            Either::Second(result) => result.map_err(|_| NetworkError::SocketError)?,
        };
        let received_at = Mono::now();

        if len < NTP_PACKET_LEN || from.endpoint.addr != server_ip {
            warn!(
                "Discarding {} byte reply from {}",
                len,
                Debug2Format(&from.endpoint)
            );
            return Err(NetworkError::InvalidResponse);
        }

        let transmit = parse_response(&response, self.config.max_stratum)?;

        // Assume a symmetric path: the server stamped its reply half an RTT ago
        let rtt_us = (received_at - sent_at).to_micros();
        let now = transmit.add_micros(rtt_us / 2);
        self.clock.calibrate(now, received_at.ticks());

        info!(
            "Wall clock calibrated: {}.{:06} UTC (stratum {}, RTT {} us)",
            now.unix_secs, now.micros, response[1], rtt_us
        );
        Ok(now)
    }
}

impl NetworkClient for SntpClient {
    type Output = Timestamp;

    async fn run(&mut self, stack: &Stack<'static>) -> Result<Self::Output, NetworkError> {
        self.sync(stack).await
    }
}

/// Validate a server reply and extract its transmit timestamp
fn parse_response(
    response: &[u8; NTP_PACKET_LEN],
    max_stratum: u8,
) -> Result<Timestamp, NetworkError> {
    let leap = response[0] >> 6;
    let mode = response[0] & 0x07;
    let stratum = response[1];

    if mode != NTP_MODE_SERVER {
        return Err(NetworkError::InvalidResponse);
    }
    if leap == NTP_LI_ALARM || stratum == 0 || stratum > max_stratum {
        warn!("Rejecting server: LI {} stratum {} (max {})", leap, stratum, max_stratum);
        return Err(NetworkError::ServerError);
    }

    let secs = u32::from_be_bytes([response[40], response[41], response[42], response[43]]);
    let frac = u32::from_be_bytes([response[44], response[45], response[46], response[47]]);
    if secs == 0 && frac == 0 {
        return Err(NetworkError::InvalidResponse);
    }

    Ok(Timestamp::from_ntp(secs as u64, frac))
}
