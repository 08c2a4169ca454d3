//! Platform-agnostic core of the network stack firmware
//!
//! This crate contains the logic shared by every board. It has NO hardware
//! dependencies: peripherals are reached through the traits in
//! `netstack-hal`, so everything here runs on the host against fakes.
//!
//! - **`logger`**: bounded overwrite-oldest log queue and its drain task
//! - **`spi`**: exclusive-access SPI transaction engine (begin/end framing,
//!   DMA placement checks, timeout recovery)
//! - **`serial`**: DMA UART writer used as the log sink
//! - **`net`**: W5500 port adapter, socket driver and the HTTP socket server
//! - **`fault`**: the single terminal path for contract violations

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![deny(warnings)]

// This must go first so the logging macros are visible to the other modules.
mod fmt;

pub mod config;
pub mod error;
pub mod fault;
pub mod logger;
pub mod net;
pub mod serial;
pub mod spi;

mod wait;

#[cfg(test)]
mod mock;

pub use error::{SerialError, SocketError, SpiError};
pub use fault::{fault, Fault};
