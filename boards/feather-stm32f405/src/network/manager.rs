#![deny(unsafe_code)]
#![deny(warnings)]
//! Link driver
//!
//! Executes the actions chosen by [`LinkManager`] against the embassy-net
//! stack: waiting for DHCP with a deadline, backing off, and watching an
//! established link. While the link is up it keeps the wall clock calibrated
//! over SNTP. Nothing here blocks sampling; this task only ever awaits.

use btu_core::link::{LinkAction, LinkConfig, LinkManager, LinkState, SharedLinkState};
use defmt::{info, warn};
use embassy_futures::select::{select, Either};
use embassy_net::Stack;
use rtic_monotonics::fugit::ExtU64;
use rtic_monotonics::Monotonic;

use crate::Mono;

use super::client::NetworkClient;
use super::sntp::SntpClient;

fn now_ms() -> u64 {
    Mono::now().ticks() / 1000
}

async fn sleep_until_ms(at_ms: u64) {
    Mono::delay(at_ms.saturating_sub(now_ms()).millis()).await;
}

/// Drive the link state machine forever
pub async fn run_link(
    stack: Stack<'static>,
    config: LinkConfig,
    shared: &'static SharedLinkState,
    mut sntp: SntpClient,
) -> ! {
    let mut link = LinkManager::new(config);
    shared.set(link.state());

    loop {
        match link.poll(now_ms()) {
            LinkAction::StartAttempt => {
                link.begin_attempt(now_ms());
                info!("Waiting for DHCP (attempt {})...", link.attempt());
            }
            LinkAction::AwaitLink { deadline_ms } => {
                match select(stack.wait_config_up(), sleep_until_ms(deadline_ms)).await {
                    Either::First(()) => {
                        link.on_link_up(now_ms());
                        shared.set(link.state());
                        log_config(&stack);
                        if !sync_clock(&stack, &mut sntp).await {
                            link.on_link_lost(now_ms());
                        }
                    }
                    // Expired by the next poll
                    Either::Second(()) => {}
                }
            }
            LinkAction::WaitUntil(at_ms) => {
                if link.state() == LinkState::Degraded {
                    warn!(
                        "Link degraded, running offline; next probe in {} ms",
                        at_ms.saturating_sub(now_ms())
                    );
                }
                sleep_until_ms(at_ms).await;
            }
            LinkAction::Monitor => {
                let interval_ms = if sntp.is_calibrated() {
                    sntp.config().resync_interval_ms
                } else {
                    sntp.config().unsynced_retry_ms
                };
                match select(stack.wait_config_down(), Mono::delay(interval_ms.millis())).await {
                    Either::First(()) => {
                        warn!("Network is DOWN");
                        link.on_link_lost(now_ms());
                    }
                    Either::Second(()) => {
                        if !sync_clock(&stack, &mut sntp).await {
                            link.on_link_lost(now_ms());
                        }
                    }
                }
            }
        }
        shared.set(link.state());
    }
}

/// Run one SNTP sync, abandoning it if the link drops
///
/// Returns `false` if the link went down before the sync finished.
async fn sync_clock(stack: &Stack<'static>, sntp: &mut SntpClient) -> bool {
    match select(stack.wait_config_down(), sntp.run(stack)).await {
        Either::First(()) => {
            warn!("Network is DOWN during SNTP sync");
            false
        }
        Either::Second(Err(e)) => {
            warn!("Wall clock not updated: {}", e);
            true
        }
        Either::Second(Ok(_)) => true,
    }
}

/// Log the DHCP lease
fn log_config(stack: &Stack<'_>) {
    info!("Network is UP!");

    if let Some(config) = stack.config_v4() {
        let ip = config.address.address().octets();
        info!("IP: {}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3]);

        if let Some(gateway) = config.gateway {
            let gw = gateway.octets();
            info!("Gateway: {}.{}.{}.{}", gw[0], gw[1], gw[2], gw[3]);
        }
    }
}
