use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use netstack_hal::{GpioPort, SpiMaster, TickClock};

use super::{BusState, SpiDevice, SpiEngine};
use crate::error::SpiError;

/// The shared SPI bus
///
/// Place it in a `static` (or `StaticCell`) and hand out `&SpiBus` to every
/// device driver.
pub struct SpiBus<M: RawMutex, S, G, C> {
    engine: Mutex<M, SpiEngine<S, G, C>>,
}

impl<M, S, G, C> SpiBus<M, S, G, C>
where
    M: RawMutex,
    S: SpiMaster,
    G: GpioPort,
    C: TickClock,
{
    pub const fn new(engine: SpiEngine<S, G, C>) -> Self {
        Self {
            engine: Mutex::new(engine),
        }
    }

    /// Configure a device's chip select without starting a transaction
    pub async fn device_init(&self, device: &SpiDevice) {
        self.engine.lock().await.device_init(device);
    }

    /// Wait for the bus, then select `device`
    ///
    /// The wait is unbounded. Calling this again from the task that already
    /// holds a [`Transaction`] never completes.
    pub async fn begin(&self, device: &'static SpiDevice) -> Transaction<'_, M, S, G, C> {
        let mut engine = self.engine.lock().await;
        engine.begin(device);
        Transaction { engine }
    }

    /// Bus state, or `None` while a transaction holds the bus
    pub fn try_state(&self) -> Option<BusState> {
        self.engine.try_lock().ok().map(|engine| engine.state())
    }
}

/// Exclusive access to the bus with one device selected
///
/// Ending or dropping the transaction deasserts chip select and releases
/// the bus, also when a transfer failed.
pub struct Transaction<'a, M, S, G, C>
where
    M: RawMutex,
    S: SpiMaster,
    G: GpioPort,
    C: TickClock,
{
    engine: MutexGuard<'a, M, SpiEngine<S, G, C>>,
}

impl<M, S, G, C> Transaction<'_, M, S, G, C>
where
    M: RawMutex,
    S: SpiMaster,
    G: GpioPort,
    C: TickClock,
{
    pub async fn tx(&mut self, buf: &[u8]) -> Result<(), SpiError> {
        self.engine.tx(buf).await
    }

    pub async fn rx(&mut self, buf: &mut [u8]) -> Result<(), SpiError> {
        self.engine.rx(buf).await
    }

    pub async fn txrx(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), SpiError> {
        self.engine.txrx(tx, rx).await
    }

    pub fn end(self) {}
}

impl<M, S, G, C> Drop for Transaction<'_, M, S, G, C>
where
    M: RawMutex,
    S: SpiMaster,
    G: GpioPort,
    C: TickClock,
{
    fn drop(&mut self) {
        self.engine.end();
    }
}
