use netstack_hal::{GpioPort, SpiMaster, TickClock};

use super::SpiDevice;
use crate::config::{SpiConfig, SPI_MAX_XFER};
use crate::error::SpiError;
use crate::fault::{fault, Fault};
use crate::logger::LogQueue;
use crate::wait::poll_until;

const LOG_LABEL: &str = "SPI:";

/// Transaction state of the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusState {
    Idle,
    Active(&'static SpiDevice),
}

/// Owner of the SPI master and the chip-select lines
///
/// Not shared directly: [`SpiBus`](super::SpiBus) puts it behind the bus
/// mutex and only hands it out inside a transaction.
pub struct SpiEngine<S, G, C> {
    spim: S,
    gpio: G,
    clock: C,
    config: SpiConfig,
    log: &'static LogQueue,
    state: BusState,
    /// Copy of transmit data the DMA engine cannot reach
    staging: [u8; SPI_MAX_XFER],
    /// Target of the unused DMA channel
    scratch: [u8; SPI_MAX_XFER],
}

impl<S, G, C> SpiEngine<S, G, C>
where
    S: SpiMaster,
    G: GpioPort,
    C: TickClock,
{
    /// Take ownership of the peripheral and enable it
    pub fn new(mut spim: S, gpio: G, clock: C, config: SpiConfig, log: &'static LogQueue) -> Self {
        spim.enable();
        Self {
            spim,
            gpio,
            clock,
            config,
            log,
            state: BusState::Idle,
            staging: [0; SPI_MAX_XFER],
            scratch: [0; SPI_MAX_XFER],
        }
    }

    /// Configure a device's chip select as an output, idling high
    pub fn device_init(&mut self, device: &SpiDevice) {
        self.gpio.configure_output(device.cs_pin);
        self.gpio.set_high(device.cs_pin);
    }

    pub fn state(&self) -> BusState {
        self.state
    }

    pub fn begin(&mut self, device: &'static SpiDevice) {
        if let BusState::Active(_) = self.state {
            fault(Fault::TransactionActive);
        }

        self.spim.configure(&device.bus_config());
        self.gpio.set_low(device.cs_pin);
        self.state = BusState::Active(device);

        trace!("spi: begin cs={}", device.cs_pin);
        self.log.log_u32("SPI BEGIN CS:", u32::from(device.cs_pin));
    }

    pub fn end(&mut self) {
        let BusState::Active(device) = self.state else {
            fault(Fault::NoTransaction);
        };

        self.gpio.set_high(device.cs_pin);
        self.state = BusState::Idle;
    }

    /// Transmit `buf`, discarding what comes back
    pub async fn tx(&mut self, buf: &[u8]) -> Result<(), SpiError> {
        let len = self.check_transfer(buf.len())?;

        let src: &[u8] = if self.spim.is_dma_accessible(buf) {
            buf
        } else {
            self.staging[..len].copy_from_slice(buf);
            &self.staging[..len]
        };
        self.spim.start(src, &mut self.scratch[..len]);

        self.complete().await
    }

    /// Fill `buf` while clocking out the device's dummy byte
    pub async fn rx(&mut self, buf: &mut [u8]) -> Result<(), SpiError> {
        let len = self.check_transfer(buf.len())?;
        self.check_rx_target(buf);

        let dummy = self.active_device().dummy_byte;
        self.scratch[..len].fill(dummy);
        self.spim.start(&self.scratch[..len], buf);

        self.complete().await
    }

    /// Full-duplex transfer; `tx` and `rx` must be the same length
    pub async fn txrx(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), SpiError> {
        if tx.len() != rx.len() {
            fault(Fault::LengthMismatch {
                tx: tx.len(),
                rx: rx.len(),
            });
        }
        let len = self.check_transfer(tx.len())?;
        self.check_rx_target(rx);

        let src: &[u8] = if self.spim.is_dma_accessible(tx) {
            tx
        } else {
            self.staging[..len].copy_from_slice(tx);
            &self.staging[..len]
        };
        self.spim.start(src, rx);

        self.complete().await
    }

    fn active_device(&self) -> &'static SpiDevice {
        match self.state {
            BusState::Active(device) => device,
            BusState::Idle => fault(Fault::NoTransaction),
        }
    }

    fn check_transfer(&self, len: usize) -> Result<usize, SpiError> {
        self.active_device();
        if len == 0 {
            return Err(SpiError::Empty);
        }
        if len > SPI_MAX_XFER {
            fault(Fault::TransferTooLarge {
                len,
                max: SPI_MAX_XFER,
            });
        }
        Ok(len)
    }

    fn check_rx_target(&self, buf: &[u8]) {
        if !self.spim.is_dma_accessible(buf) {
            fault(Fault::RxNotDmaAccessible);
        }
    }

    /// Wait for END, aborting the transfer if it does not arrive in time
    async fn complete(&mut self) -> Result<(), SpiError> {
        let spim = &self.spim;
        if poll_until(&self.clock, self.config.timeout, || spim.is_finished()).await {
            self.spim.clear_events();
            return Ok(());
        }

        self.spim.stop();
        let spim = &self.spim;
        if !poll_until(&self.clock, self.config.stop_timeout, || spim.is_stopped()).await {
            warn!("spi: STOPPED not observed after abort");
        }
        self.spim.clear_events();

        warn!("spi: transfer timeout");
        self.log.log_str(LOG_LABEL, "XFER TIMEOUT");
        Err(SpiError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::LogKind;
    use crate::mock::{leaked_log, FakeClock, FakeGpio, FakeSpim};
    use embassy_futures::block_on;
    use netstack_hal::spi::MODE_3;
    use netstack_hal::{BitOrder, Frequency};

    static DEVICE: SpiDevice = SpiDevice {
        cs_pin: 7,
        mode: MODE_3,
        frequency: Frequency::M4,
        order: BitOrder::LsbFirst,
        dummy_byte: 0xA5,
    };

    // Stands in for a `static` placed in flash
    static FLASH_FRAME: [u8; 6] = [0x00, 0x39, 0x00, 0xDE, 0xAD, 0x01];

    struct Rig {
        spim: FakeSpim,
        gpio: FakeGpio,
        log: &'static LogQueue,
        engine: SpiEngine<FakeSpim, FakeGpio, FakeClock>,
    }

    fn rig() -> Rig {
        let spim = FakeSpim::default();
        let gpio = FakeGpio::default();
        let log = leaked_log();
        let engine = SpiEngine::new(
            spim.clone(),
            gpio.clone(),
            FakeClock::new(),
            SpiConfig::default(),
            log,
        );
        Rig {
            spim,
            gpio,
            log,
            engine,
        }
    }

    #[test]
    fn test_new_enables_peripheral() {
        let r = rig();
        assert!(r.spim.state().enabled);
        assert_eq!(r.engine.state(), BusState::Idle);
    }

    #[test]
    fn test_device_init_idles_cs_high() {
        let mut r = rig();
        r.engine.device_init(&DEVICE);
        assert_eq!(r.gpio.0.borrow().outputs, vec![7]);
        assert_eq!(r.gpio.level(7), Some(true));
        assert!(r.spim.state().wire.is_empty());
    }

    #[test]
    fn test_begin_programs_bus_and_asserts_cs() {
        let mut r = rig();
        r.engine.device_init(&DEVICE);
        r.engine.begin(&DEVICE);

        assert_eq!(r.spim.state().config, Some(DEVICE.bus_config()));
        assert_eq!(r.gpio.level(7), Some(false));
        assert_eq!(r.engine.state(), BusState::Active(&DEVICE));

        let record = r.log.try_dequeue().unwrap();
        assert_eq!(record.kind(), LogKind::UnsignedInt);
        assert_eq!(record.as_u32(), 7);
    }

    #[test]
    fn test_end_releases_cs() {
        let mut r = rig();
        r.engine.begin(&DEVICE);
        r.engine.end();
        assert_eq!(r.gpio.level(7), Some(true));
        assert_eq!(r.engine.state(), BusState::Idle);
    }

    #[test]
    #[should_panic(expected = "already active")]
    fn test_double_begin_is_fatal() {
        let mut r = rig();
        r.engine.begin(&DEVICE);
        r.engine.begin(&DEVICE);
    }

    #[test]
    #[should_panic(expected = "no active SPI transaction")]
    fn test_end_without_begin_is_fatal() {
        let mut r = rig();
        r.engine.end();
    }

    #[test]
    #[should_panic(expected = "no active SPI transaction")]
    fn test_transfer_outside_transaction_is_fatal() {
        let mut r = rig();
        let _ = block_on(r.engine.tx(&[1, 2, 3]));
    }

    #[test]
    fn test_zero_length_is_soft_error_and_bus_untouched() {
        let mut r = rig();
        r.engine.begin(&DEVICE);

        let mut empty: [u8; 0] = [];
        assert_eq!(block_on(r.engine.tx(&[])), Err(SpiError::Empty));
        assert_eq!(block_on(r.engine.rx(&mut empty)), Err(SpiError::Empty));
        assert_eq!(
            block_on(r.engine.txrx(&[], &mut empty)),
            Err(SpiError::Empty)
        );
        assert!(r.spim.state().wire.is_empty());
    }

    #[test]
    fn test_tx_from_flash_goes_through_staging() {
        let mut r = rig();
        let base = FLASH_FRAME.as_ptr() as usize;
        r.spim.state().flash = Some(base..base + FLASH_FRAME.len());

        r.engine.begin(&DEVICE);
        assert_eq!(block_on(r.engine.tx(&FLASH_FRAME)), Ok(()));

        let state = r.spim.state();
        assert_eq!(state.wire, vec![FLASH_FRAME.to_vec()]);
        assert_ne!(state.tx_addrs[0], base);
    }

    #[test]
    fn test_txrx_from_flash_goes_through_staging() {
        let mut r = rig();
        let base = FLASH_FRAME.as_ptr() as usize;
        r.spim.state().flash = Some(base..base + FLASH_FRAME.len());
        r.spim.state().miso.extend([1, 2, 3, 4, 5, 6]);

        r.engine.begin(&DEVICE);
        let mut rx = [0u8; 6];
        assert_eq!(block_on(r.engine.txrx(&FLASH_FRAME, &mut rx)), Ok(()));
        assert_eq!(rx, [1, 2, 3, 4, 5, 6]);

        let state = r.spim.state();
        assert_eq!(state.wire, vec![FLASH_FRAME.to_vec()]);
        assert_ne!(state.tx_addrs[0], base);
    }

    #[test]
    fn test_tx_from_ram_is_used_in_place() {
        let mut r = rig();
        let frame = [0x10u8, 0x20, 0x30];
        r.engine.begin(&DEVICE);
        assert_eq!(block_on(r.engine.tx(&frame)), Ok(()));
        assert_eq!(r.spim.state().tx_addrs[0], frame.as_ptr() as usize);
    }

    #[test]
    fn test_rx_clocks_dummy_byte() {
        let mut r = rig();
        r.spim.state().miso.extend([0x04, 0x17]);
        r.engine.begin(&DEVICE);

        let mut buf = [0u8; 2];
        assert_eq!(block_on(r.engine.rx(&mut buf)), Ok(()));
        assert_eq!(buf, [0x04, 0x17]);
        assert_eq!(r.spim.state().wire, vec![vec![0xA5, 0xA5]]);
    }

    #[test]
    fn test_txrx_full_duplex() {
        let mut r = rig();
        r.spim.state().miso.extend([9, 8, 7]);
        r.engine.begin(&DEVICE);

        let mut rx = [0u8; 3];
        assert_eq!(block_on(r.engine.txrx(&[1, 2, 3], &mut rx)), Ok(()));
        assert_eq!(rx, [9, 8, 7]);
        assert_eq!(r.spim.state().wire, vec![vec![1, 2, 3]]);
    }

    #[test]
    #[should_panic(expected = "length mismatch")]
    fn test_txrx_length_mismatch_is_fatal() {
        let mut r = rig();
        r.engine.begin(&DEVICE);
        let mut rx = [0u8; 2];
        let _ = block_on(r.engine.txrx(&[1, 2, 3], &mut rx));
    }

    #[test]
    #[should_panic(expected = "exceeds maximum 512")]
    fn test_oversized_tx_is_fatal() {
        let mut r = rig();
        r.engine.begin(&DEVICE);
        let big = [0u8; 600];
        let _ = block_on(r.engine.tx(&big));
    }

    #[test]
    #[should_panic(expected = "not DMA accessible")]
    fn test_rx_into_non_dma_memory_is_fatal() {
        let mut r = rig();
        let mut buf = [0u8; 4];
        let base = buf.as_ptr() as usize;
        r.spim.state().flash = Some(base..base + buf.len());

        r.engine.begin(&DEVICE);
        let _ = block_on(r.engine.rx(&mut buf));
    }

    #[test]
    fn test_timeout_recovers_and_bus_ends_idle() {
        let mut r = rig();
        r.spim.state().stall = true;
        r.engine.device_init(&DEVICE);
        r.engine.begin(&DEVICE);
        let _ = r.log.try_dequeue();

        assert_eq!(block_on(r.engine.tx(&[0xFF; 4])), Err(SpiError::Timeout));
        assert_eq!(r.spim.state().stops, 1);

        let record = r.log.try_dequeue().unwrap();
        assert_eq!(record.payload(), b"XFER TIMEOUT");

        r.engine.end();
        assert_eq!(r.gpio.level(7), Some(true));
        assert_eq!(r.engine.state(), BusState::Idle);
    }

    #[test]
    fn test_timeout_returns_within_configured_window() {
        let mut r = rig();
        r.spim.state().stall = true;
        r.engine.begin(&DEVICE);

        let config = SpiConfig::default();
        let start = r.engine.clock.peek();
        assert_eq!(block_on(r.engine.tx(&[0xFF; 4])), Err(SpiError::Timeout));
        let elapsed = r.engine.clock.peek() - start;

        assert!(elapsed >= config.timeout);
        assert!(elapsed <= config.timeout + config.stop_timeout + 2);
        r.engine.end();
    }

    #[test]
    fn test_transfer_after_timeout_succeeds() {
        let mut r = rig();
        r.spim.state().stall = true;
        r.engine.begin(&DEVICE);
        assert_eq!(block_on(r.engine.tx(&[1])), Err(SpiError::Timeout));

        r.spim.state().stall = false;
        assert_eq!(block_on(r.engine.tx(&[2])), Ok(()));
        r.engine.end();
    }
}
