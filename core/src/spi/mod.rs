//! SPI transaction engine
//!
//! A single SPI bus shared by any number of devices. Every access is framed
//! by [`SpiBus::begin`] and [`Transaction::end`]: `begin` takes the bus
//! mutex, programs the device's bus settings and asserts its chip select;
//! dropping or ending the [`Transaction`] deasserts chip select and releases
//! the bus.
//!
//! Transfers use both DMA channels of the master. Transmit data that lives
//! outside DMA-reachable memory (for example a `static` in flash) is copied
//! into an internal staging buffer; receive buffers must be DMA-reachable.

mod bus;
mod engine;

pub use bus::{SpiBus, Transaction};
pub use engine::{BusState, SpiEngine};

use netstack_hal::spi::Mode;
use netstack_hal::{BitOrder, BusConfig, Frequency, PinId};

/// Static description of a device on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiDevice {
    /// Chip select pin, active low
    pub cs_pin: PinId,
    pub mode: Mode,
    pub frequency: Frequency,
    pub order: BitOrder,
    /// Byte clocked out while receiving
    pub dummy_byte: u8,
}

impl SpiDevice {
    pub const fn bus_config(&self) -> BusConfig {
        BusConfig {
            mode: self.mode,
            order: self.order,
            frequency: self.frequency,
            dummy: self.dummy_byte,
        }
    }
}
