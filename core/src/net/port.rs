//! SPI port for the W5500
//!
//! The chip driver drives the bus through [`ChipBus`]: chip select framing,
//! byte and burst transfers, and a critical section guarding multi-frame
//! register sequences. [`W5500Port`] implements it on top of the shared
//! [`SpiBus`], with a chip mutex that is separate from the bus mutex.

use core::future::Future;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use netstack_hal::spi::MODE_0;
use netstack_hal::{BitOrder, Frequency, GpioPort, SpiMaster, TickClock};

use crate::config::SPI_MAX_XFER;
use crate::error::SpiError;
use crate::fault::{fault, Fault};
use crate::spi::{SpiBus, SpiDevice, Transaction};

/// W5500 on the nRF52840-DK wiring
pub static W5500_DEVICE: SpiDevice = SpiDevice {
    cs_pin: 30,
    mode: MODE_0,
    frequency: Frequency::M8,
    order: BitOrder::MsbFirst,
    dummy_byte: 0xFF,
};

/// Reset pulse width
const RESET_LOW_MS: u32 = 10;
/// Time the chip needs after reset before its registers respond
const POWER_UP_MS: u32 = 150;

/// Bus callbacks the chip driver is written against
pub trait ChipBus {
    /// Assert chip select, taking exclusive use of the bus
    fn select(&mut self) -> impl Future<Output = ()>;

    /// Deassert chip select and release the bus
    fn deselect(&mut self);

    fn read_byte(&mut self) -> impl Future<Output = Result<u8, SpiError>>;

    fn write_byte(&mut self, byte: u8) -> impl Future<Output = Result<(), SpiError>>;

    fn read_burst(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<(), SpiError>>;

    fn write_burst(&mut self, buf: &[u8]) -> impl Future<Output = Result<(), SpiError>>;

    fn enter_critical(&mut self) -> impl Future<Output = ()>;

    fn exit_critical(&mut self);
}

/// Pulse the chip's reset line and wait for it to come up
pub async fn reset_chip<P, D>(reset: &mut P, delay: &mut D) -> Result<(), P::Error>
where
    P: OutputPin,
    D: DelayNs,
{
    reset.set_low()?;
    delay.delay_ms(RESET_LOW_MS).await;
    reset.set_high()?;
    delay.delay_ms(POWER_UP_MS).await;
    Ok(())
}

pub struct W5500Port<'a, M, S, G, C>
where
    M: RawMutex,
    S: SpiMaster,
    G: GpioPort,
    C: TickClock,
{
    bus: &'a SpiBus<M, S, G, C>,
    device: &'static SpiDevice,
    chip_lock: &'a Mutex<M, ()>,
    txn: Option<Transaction<'a, M, S, G, C>>,
    critical: Option<MutexGuard<'a, M, ()>>,
}

impl<'a, M, S, G, C> W5500Port<'a, M, S, G, C>
where
    M: RawMutex,
    S: SpiMaster,
    G: GpioPort,
    C: TickClock,
{
    pub fn new(bus: &'a SpiBus<M, S, G, C>, chip_lock: &'a Mutex<M, ()>) -> Self {
        Self::with_device(bus, chip_lock, &W5500_DEVICE)
    }

    pub fn with_device(
        bus: &'a SpiBus<M, S, G, C>,
        chip_lock: &'a Mutex<M, ()>,
        device: &'static SpiDevice,
    ) -> Self {
        Self {
            bus,
            device,
            chip_lock,
            txn: None,
            critical: None,
        }
    }

    /// Configure chip select; call once before the first access
    pub async fn init(&self) {
        self.bus.device_init(self.device).await;
    }

    fn transaction(&mut self) -> &mut Transaction<'a, M, S, G, C> {
        match self.txn.as_mut() {
            Some(txn) => txn,
            None => fault(Fault::NoTransaction),
        }
    }
}

impl<'a, M, S, G, C> ChipBus for W5500Port<'a, M, S, G, C>
where
    M: RawMutex,
    S: SpiMaster,
    G: GpioPort,
    C: TickClock,
{
    async fn select(&mut self) {
        // A second begin from this task would wait on the bus forever
        if self.txn.is_some() {
            fault(Fault::TransactionActive);
        }
        self.txn = Some(self.bus.begin(self.device).await);
    }

    fn deselect(&mut self) {
        match self.txn.take() {
            Some(txn) => txn.end(),
            None => fault(Fault::NoTransaction),
        }
    }

    async fn read_byte(&mut self) -> Result<u8, SpiError> {
        let mut byte = [0u8; 1];
        self.transaction().rx(&mut byte).await?;
        Ok(byte[0])
    }

    async fn write_byte(&mut self, byte: u8) -> Result<(), SpiError> {
        self.transaction().tx(&[byte]).await
    }

    async fn read_burst(&mut self, buf: &mut [u8]) -> Result<(), SpiError> {
        let txn = self.transaction();
        for chunk in buf.chunks_mut(SPI_MAX_XFER) {
            txn.rx(chunk).await?;
        }
        Ok(())
    }

    async fn write_burst(&mut self, buf: &[u8]) -> Result<(), SpiError> {
        let txn = self.transaction();
        for chunk in buf.chunks(SPI_MAX_XFER) {
            txn.tx(chunk).await?;
        }
        Ok(())
    }

    async fn enter_critical(&mut self) {
        if self.critical.is_some() {
            fault(Fault::CriticalSectionHeld);
        }
        self.critical = Some(self.chip_lock.lock().await);
    }

    fn exit_critical(&mut self) {
        self.critical = None;
    }
}
