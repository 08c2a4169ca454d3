//! Recoverable error types

use core::fmt;

/// SPI transfer errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiError {
    /// Zero-length transfer; nothing was clocked
    Empty,
    /// END never arrived; the transfer was stopped and bus state is unknown
    Timeout,
}

impl fmt::Display for SpiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty transfer"),
            Self::Timeout => write!(f, "Transfer timeout"),
        }
    }
}

impl core::error::Error for SpiError {}

/// Serial write errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialError {
    /// ENDTX never arrived; the peripheral was stopped and reinitialized
    Timeout,
}

impl fmt::Display for SerialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "Serial write timeout"),
        }
    }
}

impl core::error::Error for SerialError {}

impl embedded_io_async::Error for SerialError {
    fn kind(&self) -> embedded_io_async::ErrorKind {
        match self {
            Self::Timeout => embedded_io_async::ErrorKind::TimedOut,
        }
    }
}

/// Network chip socket errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketError {
    /// Underlying SPI transfer failed
    Spi(SpiError),
    /// Socket number outside the chip's socket range
    InvalidSocket,
    /// Socket not in the state the operation requires
    NotReady,
    /// LISTEN command did not leave the socket listening
    ListenFailed,
    /// Peer never acknowledged sent data
    SendTimeout,
    /// Connection closed
    Closed,
    /// Chip did not complete a command
    CommandTimeout,
    /// Chip version register holds an unexpected value
    UnsupportedChip(u8),
    /// Per-socket buffer sizes exceed chip memory
    InvalidBufferSizes,
}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spi(e) => write!(f, "SPI error: {}", e),
            Self::InvalidSocket => write!(f, "Invalid socket"),
            Self::NotReady => write!(f, "Socket not ready"),
            Self::ListenFailed => write!(f, "Listen failed"),
            Self::SendTimeout => write!(f, "Send timeout"),
            Self::Closed => write!(f, "Socket closed"),
            Self::CommandTimeout => write!(f, "Command timeout"),
            Self::UnsupportedChip(v) => write!(f, "Unsupported chip version 0x{:02x}", v),
            Self::InvalidBufferSizes => write!(f, "Invalid socket buffer sizes"),
        }
    }
}

impl core::error::Error for SocketError {}

impl From<SpiError> for SocketError {
    fn from(e: SpiError) -> Self {
        Self::Spi(e)
    }
}
