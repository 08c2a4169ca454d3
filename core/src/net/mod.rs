//! W5500 networking
//!
//! - [`port`]: adapts the SPI bus to the chip's callback contract
//! - [`w5500`]: socket-level driver for the chip's hardwired TCP/IP stack
//! - [`server`]: per-socket HTTP server state machine
//!
//! The server only sees the [`SocketDriver`] trait, so it can be exercised
//! against a scripted driver on the host.

use core::future::Future;

use crate::config::NetConfig;
use crate::error::SocketError;

pub mod port;
pub mod server;
pub mod w5500;

pub use port::{reset_chip, ChipBus, W5500Port, W5500_DEVICE};
pub use server::{SocketEntry, SocketServer};
pub use w5500::W5500;

/// Hardware socket number
pub type SocketId = u8;

/// Socket status register values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketStatus {
    Closed,
    Init,
    Listen,
    SynSent,
    SynRecv,
    Established,
    FinWait,
    Closing,
    TimeWait,
    CloseWait,
    LastAck,
    Udp,
    MacRaw,
    /// Transient or undocumented value
    Unknown(u8),
}

impl SocketStatus {
    pub fn raw(self) -> u8 {
        match self {
            Self::Closed => 0x00,
            Self::Init => 0x13,
            Self::Listen => 0x14,
            Self::SynSent => 0x15,
            Self::SynRecv => 0x16,
            Self::Established => 0x17,
            Self::FinWait => 0x18,
            Self::Closing => 0x1A,
            Self::TimeWait => 0x1B,
            Self::CloseWait => 0x1C,
            Self::LastAck => 0x1D,
            Self::Udp => 0x22,
            Self::MacRaw => 0x42,
            Self::Unknown(v) => v,
        }
    }
}

impl From<u8> for SocketStatus {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Closed,
            0x13 => Self::Init,
            0x14 => Self::Listen,
            0x15 => Self::SynSent,
            0x16 => Self::SynRecv,
            0x17 => Self::Established,
            0x18 => Self::FinWait,
            0x1A => Self::Closing,
            0x1B => Self::TimeWait,
            0x1C => Self::CloseWait,
            0x1D => Self::LastAck,
            0x22 => Self::Udp,
            0x42 => Self::MacRaw,
            v => Self::Unknown(v),
        }
    }
}

/// Socket API of an offloading network chip
pub trait SocketDriver {
    /// Open `sn` as a TCP socket bound to `port`
    fn open(&mut self, sn: SocketId, port: u16) -> impl Future<Output = Result<(), SocketError>>;

    fn listen(&mut self, sn: SocketId) -> impl Future<Output = Result<(), SocketError>>;

    /// Start a graceful close (FIN)
    fn disconnect(&mut self, sn: SocketId) -> impl Future<Output = Result<(), SocketError>>;

    /// Close immediately
    fn close(&mut self, sn: SocketId) -> impl Future<Output = Result<(), SocketError>>;

    /// Queue `data` for transmission, returning how much was accepted
    fn send(
        &mut self,
        sn: SocketId,
        data: &[u8],
    ) -> impl Future<Output = Result<usize, SocketError>>;

    /// Read received data into `buf`, returning the byte count
    fn recv(
        &mut self,
        sn: SocketId,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<usize, SocketError>>;

    fn status(&mut self, sn: SocketId) -> impl Future<Output = Result<SocketStatus, SocketError>>;

    /// Bytes waiting in the receive buffer
    fn rx_available(&mut self, sn: SocketId) -> impl Future<Output = Result<u16, SocketError>>;

    fn set_net_info(&mut self, config: &NetConfig) -> impl Future<Output = Result<(), SocketError>>;

    fn net_info(&mut self) -> impl Future<Output = Result<NetConfig, SocketError>>;
}
