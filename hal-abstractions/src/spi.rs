//! SPI master with DMA transfers
//!
//! Modelled after the nRF52 SPIM: both DMA channels are armed for every
//! transfer, completion is signalled by an END event, and a wedged transfer
//! is aborted with a STOP task acknowledged by a STOPPED event.

pub use embedded_hal::spi::{Mode, Phase, Polarity, MODE_0, MODE_1, MODE_2, MODE_3};

/// Bit order on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    MsbFirst,
    LsbFirst,
}

/// SCK frequency
///
/// Boards map these onto their register encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Frequency {
    K125,
    K250,
    K500,
    M1,
    M2,
    M4,
    M8,
    M16,
    M32,
}

/// Per-transaction bus settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    pub mode: Mode,
    pub order: BitOrder,
    pub frequency: Frequency,
    /// Over-read character clocked out once the TX buffer is exhausted
    pub dummy: u8,
}

/// Register-level SPI master interface
pub trait SpiMaster {
    /// Connect SCK/MOSI/MISO and enable the peripheral
    fn enable(&mut self);

    /// Program clock polarity/phase, bit order, frequency and over-read character
    fn configure(&mut self, config: &BusConfig);

    /// Arm both DMA channels and trigger the START task.
    ///
    /// The caller keeps both buffers borrowed and untouched until
    /// [`is_finished`](Self::is_finished) or [`is_stopped`](Self::is_stopped)
    /// reports completion.
    fn start(&mut self, tx: &[u8], rx: &mut [u8]);

    /// END event
    fn is_finished(&self) -> bool;

    /// Trigger the STOP task
    fn stop(&mut self);

    /// STOPPED event
    fn is_stopped(&self) -> bool;

    /// Clear END and STOPPED
    fn clear_events(&mut self);

    /// Whether the DMA engine can reach `buf` (data RAM, not flash)
    fn is_dma_accessible(&self, buf: &[u8]) -> bool;
}
