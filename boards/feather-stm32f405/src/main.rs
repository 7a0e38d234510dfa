#![deny(unsafe_code)]
#![deny(warnings)]
#![no_main]
#![no_std]

//! Hydronic BTU meter on the Adafruit Feather STM32F405
//!
//! Pin assignment:
//!
//! | Feather | MCU  | Function |
//! |---------|------|----------|
//! | D9      | PB8  | Supply DS18B20 (1-Wire, 4.7 kΩ pull-up to 3V3) |
//! | D5      | PC7  | Return DS18B20 (1-Wire, 4.7 kΩ pull-up to 3V3) |
//! | D10     | PB9  | Flow meter pulse output (internal pull-up) |
//! | D13     | PC1  | Red LED heartbeat |
//! | SCK/MO/MI | PB13/PB15/PB14 | W5500 SPI2 |
//! | D6/D11/D12 | PC6/PC3/PC2 | W5500 CS / RESET / INT |

use defmt_rtt as _; // global logger
use panic_probe as _;
use rtic::app;
use rtic_monotonics::stm32::prelude::*;

mod eth;
mod network;
mod time;

stm32_tim2_monotonic!(Mono, 1_000_000);

#[app(device = embassy_stm32, peripherals = true, dispatchers = [USART1, USART2, USART3])]
mod app {
    use super::*;
    use btu_core::ds18b20::Resolution;
    use btu_core::{
        LinkConfig, LinkState, MeterConfig, PulseAccumulator, Sampler, SharedLinkState,
        StaleHold, WallClock,
    };
    use btu_hal::{Ds18b20, OneWire, TemperatureProbe};
    use defmt::{debug, error, info, warn};
    use embassy_futures::join::{join, join3};
    use embassy_stm32::exti::ExtiInput;
    use embassy_stm32::gpio::{Level, Output, OutputOpenDrain, Pull, Speed};
    use embassy_stm32::peripherals;
    use embassy_stm32::rcc::{Hse, HseMode};
    use embassy_stm32::spi::{self, Spi};
    use embassy_stm32::time::Hertz;
    use embassy_time::Delay;
    use static_cell::StaticCell;

    use network::{manager, NetworkConfig, SntpClient, SntpConfig};

    type Pin<P> = embassy_stm32::Peri<'static, P>;
    type Probe = Ds18b20<OutputOpenDrain<'static>, Delay, Delay>;

    struct FlowPins {
        input: Pin<peripherals::PB9>,
        exti: Pin<peripherals::EXTI9>,
    }

    struct ProbePins {
        supply: Pin<peripherals::PB8>,
        ret: Pin<peripherals::PC7>,
    }

    struct NetworkPeripherals {
        spi: Pin<peripherals::SPI2>,
        sck: Pin<peripherals::PB13>,
        mosi: Pin<peripherals::PB15>,
        miso: Pin<peripherals::PB14>,
        cs: Pin<peripherals::PC6>,
        reset: Pin<peripherals::PC3>,
        int: Pin<peripherals::PC2>,
        exti: Pin<peripherals::EXTI2>,
        dma_tx: Pin<peripherals::DMA1_CH4>,
        dma_rx: Pin<peripherals::DMA1_CH3>,
    }

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        led: Output<'static>,
    }

    #[init]
    fn init(_cx: init::Context) -> (Shared, Local) {
        info!("BTU meter starting...");

        // Adafruit Feather STM32F405: 12 MHz HSE
        // HSE (12 MHz) / PREDIV(6) = 2 MHz (PLL input)
        // 2 MHz * MUL(168) = 336 MHz (VCO)
        // VCO / DIVP(4) = 84 MHz (SYSCLK)
        // VCO / DIVQ(7) = 48 MHz (USB)
        let mut config = embassy_stm32::Config::default();
        config.rcc.hse = Some(Hse {
            freq: Hertz(12_000_000),
            mode: HseMode::Oscillator,
        });
        config.rcc.pll_src = embassy_stm32::rcc::PllSource::HSE;
        config.rcc.pll = Some(embassy_stm32::rcc::Pll {
            prediv: embassy_stm32::rcc::PllPreDiv::DIV6,
            mul: embassy_stm32::rcc::PllMul::MUL168,
            divp: Some(embassy_stm32::rcc::PllPDiv::DIV4),
            divq: Some(embassy_stm32::rcc::PllQDiv::DIV7),
            divr: None,
        });
        config.rcc.sys = embassy_stm32::rcc::Sysclk::PLL1_P;
        config.rcc.ahb_pre = embassy_stm32::rcc::AHBPrescaler::DIV1; // 84 MHz
        config.rcc.apb1_pre = embassy_stm32::rcc::APBPrescaler::DIV2; // 42 MHz
        config.rcc.apb2_pre = embassy_stm32::rcc::APBPrescaler::DIV1; // 84 MHz

        let p = embassy_stm32::init(config);

        // TIM2 on APB1: timer clock = 2*APB1 when prescaler != 1
        Mono::start(84_000_000);
        info!("TIM2 monotonic timer initialized at 1 MHz");

        let (meter_config, fallback) = MeterConfig::default().or_default();
        if let Some(e) = fallback {
            warn!("Invalid meter configuration ({}), using defaults", e);
        }
        info!("Meter configuration: {}", meter_config);

        // Monotonic ticks are microseconds, so the debounce window maps 1:1
        static PULSES: StaticCell<PulseAccumulator> = StaticCell::new();
        let pulses: &'static PulseAccumulator =
            PULSES.init(PulseAccumulator::new(meter_config.flow.debounce_us));

        static LINK_STATE: StaticCell<SharedLinkState> = StaticCell::new();
        let link_state: &'static SharedLinkState = LINK_STATE.init(SharedLinkState::new());

        let clock = time::wall_clock();

        let led = Output::new(p.PC1, Level::High, Speed::Low);

        let flow_pins = FlowPins {
            input: p.PB9,
            exti: p.EXTI9,
        };
        let probe_pins = ProbePins {
            supply: p.PB8,
            ret: p.PC7,
        };
        let net_periph = NetworkPeripherals {
            spi: p.SPI2,
            sck: p.PB13,
            mosi: p.PB15,
            miso: p.PB14,
            cs: p.PC6,
            reset: p.PC3,
            int: p.PC2,
            exti: p.EXTI2,
            dma_tx: p.DMA1_CH4,
            dma_rx: p.DMA1_CH3,
        };

        flow_pulse::spawn(flow_pins, pulses).ok();
        sampler::spawn(probe_pins, meter_config, pulses, clock).ok();
        heartbeat::spawn(link_state).ok();
        network_task::spawn(net_periph, meter_config.link, link_state, clock).ok();

        (Shared {}, Local { led })
    }

    /// Flow pulse edge handler
    ///
    /// Highest priority so an edge is stamped as soon as the EXTI interrupt
    /// wakes it. Does nothing but record the edge.
    #[task(priority = 3)]
    async fn flow_pulse(
        _cx: flow_pulse::Context,
        pins: FlowPins,
        pulses: &'static PulseAccumulator,
    ) {
        let mut input = ExtiInput::new(pins.input, pins.exti, Pull::Up);
        info!(
            "Flow pulse input armed (debounce {} us)",
            pulses.debounce_ticks()
        );
        loop {
            input.wait_for_rising_edge().await;
            pulses.record_edge(Mono::now().ticks() as u32);
        }
    }

    /// Sampling loop: one reading per configured period
    #[task(priority = 2)]
    async fn sampler(
        _cx: sampler::Context,
        pins: ProbePins,
        config: MeterConfig,
        pulses: &'static PulseAccumulator,
        clock: &'static WallClock,
    ) {
        let mut supply = probe(OutputOpenDrain::new(pins.supply, Level::High, Speed::Low));
        let mut ret = probe(OutputOpenDrain::new(pins.ret, Level::High, Speed::Low));
        if let Err(e) = supply.configure() {
            warn!("Supply probe not configured: {}", e);
        }
        if let Err(e) = ret.configure() {
            warn!("Return probe not configured: {}", e);
        }

        let mut supply_hold = StaleHold::new(config.max_stale_samples);
        let mut return_hold = StaleHold::new(config.max_stale_samples);

        pulses.take();
        pulses.take_rejected();
        let mut meter = Sampler::new(config, time::uptime_us());

        let period: <Mono as Monotonic>::Duration = (config.sample_period_ms as u64).millis();
        let mut next = Mono::now();
        info!("Sampling every {} ms", config.sample_period_ms);

        loop {
            next += period;
            Mono::delay_until(next).await;

            // Conversions overlap; only the bit slots are serialized
            let (supply_raw, return_raw) =
                join(supply.read_fahrenheit(), ret.read_fahrenheit()).await;

            let count = pulses.take();
            let now_us = time::uptime_us();

            let glitches = pulses.take_rejected();
            if glitches > 0 {
                debug!("Rejected {} flow pulse glitches", glitches);
            }
            if let Err(e) = &supply_raw {
                warn!("Supply probe read failed: {}", e);
            }
            if let Err(e) = &return_raw {
                warn!("Return probe read failed: {}", e);
            }

            match (supply_hold.update(supply_raw), return_hold.update(return_raw)) {
                (Ok(supply_f), Ok(return_f)) => {
                    let reading =
                        meter.sample(count, now_us, supply_f, return_f, clock.now(now_us));
                    info!("{}", reading.status_line().as_str());
                }
                (supply_f, return_f) => {
                    if supply_f.is_err() {
                        error!("Supply probe stale for {} periods", supply_hold.misses());
                    }
                    if return_f.is_err() {
                        error!("Return probe stale for {} periods", return_hold.misses());
                    }
                    meter.skip(count, now_us);
                }
            }

            let totals = meter.totals();
            debug!("Totals: {} gal, {} BTU", totals.gallons, totals.btu);
        }
    }

    fn probe(pin: OutputOpenDrain<'static>) -> Probe {
        Ds18b20::new(OneWire::new(pin, Delay), Delay, Resolution::Bits12)
    }

    /// Heartbeat task; blinks fast while the link is degraded
    #[task(priority = 1, local = [led])]
    async fn heartbeat(cx: heartbeat::Context, link: &'static SharedLinkState) {
        info!("Heartbeat task started");
        loop {
            let off_ms: u64 = match link.get() {
                LinkState::Degraded => 400,
                _ => 4900,
            };
            cx.local.led.set_high();
            Mono::delay(100_u64.millis()).await;
            cx.local.led.set_low();
            Mono::delay(off_ms.millis()).await;
        }
    }

    /// Network task: W5500, embassy-net and the link driver
    ///
    /// Stack is !Send and must remain within this task.
    #[task(priority = 1)]
    async fn network_task(
        _cx: network_task::Context,
        periph: NetworkPeripherals,
        link_config: LinkConfig,
        link_state: &'static SharedLinkState,
        clock: &'static WallClock,
    ) {
        use embassy_net::{Config, StackResources};

        info!("Network task started");
        let net_config = NetworkConfig::default();

        let mut spi_config = spi::Config::default();
        spi_config.frequency = Hertz(net_config.spi_hz);

        let spi = Spi::new(
            periph.spi,
            periph.sck,
            periph.mosi,
            periph.miso,
            periph.dma_tx,
            periph.dma_rx,
            spi_config,
        );

        let eth_periph = eth::EthPeripherals {
            spi,
            cs: Output::new(periph.cs, Level::High, Speed::VeryHigh),
            reset: Output::new(periph.reset, Level::High, Speed::Low),
            int: ExtiInput::new(periph.int, periph.exti, Pull::Up),
        };

        let (device, w5500_runner) = match eth::init_w5500(eth_periph, net_config.mac_addr).await
        {
            Ok(parts) => parts,
            Err(_) => {
                error!("Ethernet unavailable; metering continues offline");
                link_state.set(LinkState::Degraded);
                return;
            }
        };

        static RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
        let (stack, mut net_runner) = embassy_net::new(
            device,
            Config::dhcpv4(Default::default()),
            RESOURCES.init(StackResources::new()),
            net_config.seed,
        );
        info!("Network stack initialized with DHCP");

        let sntp = SntpClient::new(SntpConfig::default(), clock);
        join3(
            w5500_runner.run(),
            net_runner.run(),
            manager::run_link(stack, link_config, link_state, sntp),
        )
        .await;
    }

    /// RTIC idle task - WFI sleep mode when no tasks active
    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        info!("Idle task started - entering WFI loop");
        loop {
            cortex_m::asm::wfi();
        }
    }
}
