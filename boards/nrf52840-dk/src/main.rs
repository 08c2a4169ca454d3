#![deny(unsafe_code)]
#![deny(warnings)]
#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use rtic::app;
use rtic_monotonics::systick::prelude::*;

mod clock;
mod gpio;
mod panic;
mod spim;
mod uarte;

systick_monotonic!(Mono, 1_000);

/// Core clock feeding SysTick
const SYSCLK_HZ: u32 = 64_000_000;

/// Board wiring, all on port 0
mod pins {
    use netstack_hal::PinId;

    pub const SPI_SCK: PinId = 2;
    pub const SPI_MISO: PinId = 26;
    pub const SPI_MOSI: PinId = 27;
    pub const W5500_RESET: PinId = 31;
    pub const UART_TX: PinId = 6;
}

#[app(device = nrf52840_pac, peripherals = true, dispatchers = [SWI0_EGU0, SWI1_EGU1])]
mod app {
    use super::*;
    use defmt::{error, info};
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::mutex::Mutex;
    use netstack_core::config::{NetConfig, SerialConfig, ServerConfig, SpiConfig};
    use netstack_core::logger::{LogDrain, LogQueue};
    use netstack_core::net::{reset_chip, SocketServer, W5500Port, W5500};
    use netstack_core::serial::SerialPort;
    use netstack_core::spi::{SpiBus, SpiEngine};
    use netstack_core::{fault, Fault};
    use netstack_hal::GpioPort;
    use static_cell::StaticCell;

    use crate::clock::SysTickClock;
    use crate::gpio::{Output, Port0};
    use crate::spim::{Spim0, SpimPins};
    use crate::uarte::Uarte0;

    type Bus = SpiBus<CriticalSectionRawMutex, Spim0, Port0, SysTickClock>;
    type Serial = SerialPort<CriticalSectionRawMutex, Uarte0, SysTickClock>;

    /// 2 KiB per socket in each direction
    const SOCKET_BUF_KIB: [u8; 8] = [2; 8];

    static LOG: LogQueue = LogQueue::new();
    static CHIP_LOCK: Mutex<CriticalSectionRawMutex, ()> = Mutex::new(());

    #[shared]
    struct Shared {}

    #[local]
    struct Local {}

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        info!("nRF52840-DK W5500 server starting...");

        Mono::start(cx.core.SYST, SYSCLK_HZ);

        let mut port = Port0::new(cx.device.P0);
        // SCK idles low for mode 0
        port.set_low(pins::SPI_SCK);
        port.configure_output(pins::SPI_SCK);
        port.set_low(pins::SPI_MOSI);
        port.configure_output(pins::SPI_MOSI);
        port.configure_input(pins::SPI_MISO);
        // UART line idles high
        port.set_high(pins::UART_TX);
        port.configure_output(pins::UART_TX);
        let reset = port.output(pins::W5500_RESET, true);

        let spim = Spim0::new(
            cx.device.SPIM0,
            SpimPins {
                sck: pins::SPI_SCK,
                mosi: pins::SPI_MOSI,
                miso: pins::SPI_MISO,
            },
        );
        static BUS: StaticCell<Bus> = StaticCell::new();
        let bus: &'static Bus = BUS.init(SpiBus::new(SpiEngine::new(
            spim,
            port,
            SysTickClock,
            SpiConfig::default(),
            &LOG,
        )));

        static SERIAL: StaticCell<Serial> = StaticCell::new();
        let serial: &'static Serial = SERIAL.init(SerialPort::new(
            Uarte0::new(cx.device.UARTE0, pins::UART_TX),
            SysTickClock,
            SerialConfig::default(),
        ));

        if log_drain::spawn(serial).is_err() {
            fault(Fault::TaskSpawn);
        }
        if net_task::spawn(bus, reset).is_err() {
            fault(Fault::TaskSpawn);
        }

        (Shared {}, Local {})
    }

    /// Moves queued log records out over the UART
    #[task(priority = 1)]
    async fn log_drain(_cx: log_drain::Context, serial: &'static Serial) -> ! {
        info!("log drain started");
        LogDrain::new(&LOG, serial, SysTickClock).run().await
    }

    /// Brings up the W5500 and runs the socket server forever
    #[task(priority = 2)]
    async fn net_task(_cx: net_task::Context, bus: &'static Bus, mut reset: Output) -> ! {
        info!("network task started");

        let mut delay = SysTickClock;
        match reset_chip(&mut reset, &mut delay).await {
            Ok(()) => {}
            Err(never) => match never {},
        }

        let port = W5500Port::new(bus, &CHIP_LOCK);
        port.init().await;

        let mut chip = W5500::new(port);
        if let Err(e) = chip.init(&SOCKET_BUF_KIB, &SOCKET_BUF_KIB).await {
            // A dead chip is caught by the network configuration readback
            error!("W5500 init failed: {}", e);
        }

        let mut server = SocketServer::new(chip, SysTickClock, ServerConfig::default(), &LOG);
        server.configure_network(&NetConfig::default()).await;
        info!("serving");
        server.run().await
    }
}
