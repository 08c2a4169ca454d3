//! Static configuration
//!
//! Compile-time constants plus configuration structs with `Default`
//! implementations. Tick values assume a 1 kHz scheduler tick.

use netstack_hal::Ticks;

/// Largest single SPI transfer (EasyDMA MAXCNT budget)
pub const SPI_MAX_XFER: usize = 512;

/// Log queue capacity in records
pub const LOG_QUEUE_CAP: usize = 64;

/// Log label width; shorter labels are space padded
pub const LOG_LABEL_LEN: usize = 16;

/// Log payload capacity; longer payloads are truncated
pub const LOG_PAYLOAD_LEN: usize = 64;

/// UART DMA staging buffer; longer writes are split by the caller
pub const UART_TX_BUF_SIZE: usize = 256;

/// Number of chip sockets served concurrently
pub const SOCKET_COUNT: usize = 4;

/// Canned response served to every accepted connection
pub const HTTP_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Type: text/plain\r\n\
Content-Length: 3\r\n\
Connection: close\r\n\
\r\n\
OK\n";

/// SPI engine timing
#[derive(Debug, Clone)]
pub struct SpiConfig {
    /// Ticks to wait for the END event of one transfer
    pub timeout: Ticks,
    /// Ticks to wait for STOPPED after aborting a transfer
    pub stop_timeout: Ticks,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            timeout: 50,
            stop_timeout: 5,
        }
    }
}

/// Serial writer timing
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Ticks to wait for ENDTX of one staging buffer
    pub timeout: Ticks,
    /// Ticks to wait for TXSTOPPED before reinitializing the peripheral
    pub stop_timeout: Ticks,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            // 256 bytes at 115200 baud take ~22 ms
            timeout: 100,
            stop_timeout: 5,
        }
    }
}

/// Static IPv4 network configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NetConfig {
    pub mac: [u8; 6],
    pub ip: [u8; 4],
    pub subnet: [u8; 4],
    pub gateway: [u8; 4],
    pub dns: [u8; 4],
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            mac: [0x02, 0x00, 0x00, 0x00, 0x00, 0x50],
            ip: [192, 168, 29, 70],
            subnet: [255, 255, 255, 0],
            gateway: [192, 168, 29, 1],
            dns: [192, 168, 29, 1],
        }
    }
}

/// Socket server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP listen port
    pub port: u16,
    /// Close an accepted connection that sends nothing within this many ticks
    pub rx_idle_timeout: Ticks,
    /// Force-close a socket still tearing down this long after our disconnect
    pub cleanup_timeout: Ticks,
    /// Delay between polling cycles
    pub poll_interval: Ticks,
    /// Response payload
    pub response: &'static [u8],
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            rx_idle_timeout: 1000,
            cleanup_timeout: 250,
            poll_interval: 5,
            response: HTTP_RESPONSE,
        }
    }
}
