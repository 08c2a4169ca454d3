//! Hardware abstraction traits for the network stack firmware
//!
//! This crate defines the narrow register-level interface the stack needs
//! from a target: an SPI master with EasyDMA-style transfers, a GPIO port
//! addressed by pin number, a DMA-driven UART transmitter and a tick clock.
//! Boards implement these traits once; the logic in `netstack-core` is
//! written purely against them and runs on the host against fakes.

#![no_std]
#![deny(unsafe_code)]
#![deny(warnings)]

pub mod clock;
pub mod gpio;
pub mod spi;
pub mod uart;

pub use clock::{TickClock, Ticks};
pub use gpio::{GpioPort, PinId};
pub use spi::{BitOrder, BusConfig, Frequency, SpiMaster};
pub use uart::UartTx;
