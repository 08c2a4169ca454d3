//! W5500 socket driver
//!
//! Every register access is one variable-length SPI frame: a 16-bit offset
//! address, a control byte selecting the block and direction, then data.
//! Each frame runs inside the port's critical section.

use embassy_futures::yield_now;

use super::port::ChipBus;
use super::{SocketDriver, SocketId, SocketStatus};
use crate::config::NetConfig;
use crate::error::{SocketError, SpiError};

/// Hardware sockets on the chip
pub const MAX_SOCKETS: usize = 8;

/// Expected VERSIONR value
const CHIP_VERSION: u8 = 0x04;

/// Total TX (and RX) buffer memory in KiB shared by all sockets
const BUFFER_MEMORY_KIB: u8 = 16;

/// Reads of a command or status register before giving up
const COMMAND_POLLS: usize = 1000;
/// Free-space polls while waiting for room in the TX buffer
const SEND_POLLS: usize = 10_000;
/// Reads of a free-running counter while waiting for two equal values
const STABLE_READS: usize = 8;

const COMMON_BLOCK: u8 = 0x00;

// Common registers
const MR: u16 = 0x0000;
const GAR: u16 = 0x0001;
const SUBR: u16 = 0x0005;
const SHAR: u16 = 0x0009;
const SIPR: u16 = 0x000F;
const VERSIONR: u16 = 0x0039;

const MR_RST: u8 = 0x80;

// Socket registers
const SN_MR: u16 = 0x0000;
const SN_CR: u16 = 0x0001;
const SN_IR: u16 = 0x0002;
const SN_SR: u16 = 0x0003;
const SN_PORT: u16 = 0x0004;
const SN_RXBUF_SIZE: u16 = 0x001E;
const SN_TXBUF_SIZE: u16 = 0x001F;
const SN_TX_FSR: u16 = 0x0020;
const SN_TX_WR: u16 = 0x0024;
const SN_RX_RSR: u16 = 0x0026;
const SN_RX_RD: u16 = 0x0028;

const SN_MR_TCP: u8 = 0x01;

const CMD_OPEN: u8 = 0x01;
const CMD_LISTEN: u8 = 0x02;
const CMD_DISCON: u8 = 0x08;
const CMD_CLOSE: u8 = 0x10;
const CMD_SEND: u8 = 0x20;
const CMD_RECV: u8 = 0x40;

const IR_TIMEOUT: u8 = 0x08;
const IR_SEND_OK: u8 = 0x10;

const CTRL_WRITE: u8 = 0x04;

fn socket_block(sn: SocketId) -> u8 {
    1 + 4 * sn
}

fn tx_block(sn: SocketId) -> u8 {
    2 + 4 * sn
}

fn rx_block(sn: SocketId) -> u8 {
    3 + 4 * sn
}

fn frame_header(block: u8, addr: u16, write: bool) -> [u8; 3] {
    let [hi, lo] = addr.to_be_bytes();
    let rw = if write { CTRL_WRITE } else { 0 };
    [hi, lo, (block << 3) | rw]
}

pub struct W5500<B> {
    bus: B,
    /// The chip has no DNS register
    dns: [u8; 4],
    tx_kib: [u8; MAX_SOCKETS],
}

impl<B: ChipBus> W5500<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            dns: [0; 4],
            tx_kib: [2; MAX_SOCKETS],
        }
    }

    /// Soft reset, check the chip version and size the socket buffers
    ///
    /// Sizes are in KiB per socket; each must be 0, 1, 2, 4, 8 or 16 and each
    /// direction may use at most 16 KiB in total.
    pub async fn init(
        &mut self,
        tx_kib: &[u8; MAX_SOCKETS],
        rx_kib: &[u8; MAX_SOCKETS],
    ) -> Result<(), SocketError> {
        for sizes in [tx_kib, rx_kib] {
            let valid = sizes.iter().all(|&s| s == 0 || (s.is_power_of_two() && s <= 16));
            let total: u16 = sizes.iter().map(|&s| u16::from(s)).sum();
            if !valid || total > u16::from(BUFFER_MEMORY_KIB) {
                return Err(SocketError::InvalidBufferSizes);
            }
        }

        self.write_u8(COMMON_BLOCK, MR, MR_RST).await?;
        let mut reset_done = false;
        for _ in 0..COMMAND_POLLS {
            if self.read_u8(COMMON_BLOCK, MR).await? & MR_RST == 0 {
                reset_done = true;
                break;
            }
            yield_now().await;
        }
        if !reset_done {
            return Err(SocketError::CommandTimeout);
        }

        let version = self.version().await?;
        if version != CHIP_VERSION {
            return Err(SocketError::UnsupportedChip(version));
        }

        for sn in 0..MAX_SOCKETS as SocketId {
            let i = usize::from(sn);
            self.write_u8(socket_block(sn), SN_TXBUF_SIZE, tx_kib[i]).await?;
            self.write_u8(socket_block(sn), SN_RXBUF_SIZE, rx_kib[i]).await?;
        }
        self.tx_kib = *tx_kib;

        debug!("w5500: initialized, version {}", version);
        Ok(())
    }

    pub async fn version(&mut self) -> Result<u8, SocketError> {
        Ok(self.read_u8(COMMON_BLOCK, VERSIONR).await?)
    }

    async fn read(&mut self, block: u8, addr: u16, buf: &mut [u8]) -> Result<(), SpiError> {
        let header = frame_header(block, addr, false);
        self.bus.enter_critical().await;
        self.bus.select().await;
        let mut result = self.bus.write_burst(&header).await;
        if result.is_ok() {
            result = self.bus.read_burst(buf).await;
        }
        self.bus.deselect();
        self.bus.exit_critical();
        result
    }

    async fn write(&mut self, block: u8, addr: u16, data: &[u8]) -> Result<(), SpiError> {
        let header = frame_header(block, addr, true);
        self.bus.enter_critical().await;
        self.bus.select().await;
        let mut result = self.bus.write_burst(&header).await;
        if result.is_ok() {
            result = self.bus.write_burst(data).await;
        }
        self.bus.deselect();
        self.bus.exit_critical();
        result
    }

    async fn read_u8(&mut self, block: u8, addr: u16) -> Result<u8, SpiError> {
        let mut byte = [0u8; 1];
        self.read(block, addr, &mut byte).await?;
        Ok(byte[0])
    }

    async fn write_u8(&mut self, block: u8, addr: u16, value: u8) -> Result<(), SpiError> {
        self.write(block, addr, &[value]).await
    }

    async fn read_u16(&mut self, block: u8, addr: u16) -> Result<u16, SpiError> {
        let mut raw = [0u8; 2];
        self.read(block, addr, &mut raw).await?;
        Ok(u16::from_be_bytes(raw))
    }

    async fn write_u16(&mut self, block: u8, addr: u16, value: u16) -> Result<(), SpiError> {
        self.write(block, addr, &value.to_be_bytes()).await
    }

    /// Read a counter the chip updates on its own until two reads agree
    async fn read_u16_stable(&mut self, block: u8, addr: u16) -> Result<u16, SpiError> {
        let mut prev = self.read_u16(block, addr).await?;
        for _ in 0..STABLE_READS {
            let next = self.read_u16(block, addr).await?;
            if next == prev {
                return Ok(next);
            }
            prev = next;
        }
        // Still moving; the latest value is the best available
        Ok(prev)
    }

    async fn read_status(&mut self, sn: SocketId) -> Result<SocketStatus, SocketError> {
        Ok(SocketStatus::from(self.read_u8(socket_block(sn), SN_SR).await?))
    }

    /// Issue a socket command and wait for the chip to accept it
    async fn command(&mut self, sn: SocketId, cmd: u8) -> Result<(), SocketError> {
        self.write_u8(socket_block(sn), SN_CR, cmd).await?;
        for _ in 0..COMMAND_POLLS {
            if self.read_u8(socket_block(sn), SN_CR).await? == 0 {
                return Ok(());
            }
            yield_now().await;
        }
        warn!("w5500: socket {} command {} not accepted", sn, cmd);
        Err(SocketError::CommandTimeout)
    }

    async fn wait_status_not(
        &mut self,
        sn: SocketId,
        from: SocketStatus,
    ) -> Result<SocketStatus, SocketError> {
        for _ in 0..COMMAND_POLLS {
            let status = self.read_status(sn).await?;
            if status != from {
                return Ok(status);
            }
            yield_now().await;
        }
        Err(SocketError::CommandTimeout)
    }

    fn check_socket(sn: SocketId) -> Result<(), SocketError> {
        if usize::from(sn) < MAX_SOCKETS {
            Ok(())
        } else {
            Err(SocketError::InvalidSocket)
        }
    }

    async fn close_socket(&mut self, sn: SocketId) -> Result<(), SocketError> {
        self.command(sn, CMD_CLOSE).await?;
        self.write_u8(socket_block(sn), SN_IR, 0xFF).await?;
        for _ in 0..COMMAND_POLLS {
            if self.read_status(sn).await? == SocketStatus::Closed {
                return Ok(());
            }
            yield_now().await;
        }
        Err(SocketError::CommandTimeout)
    }

    /// Wait for SEND_OK, or TIMEOUT when the peer never acknowledged
    async fn wait_send_done(&mut self, sn: SocketId) -> Result<(), SocketError> {
        for _ in 0..SEND_POLLS {
            let ir = self.read_u8(socket_block(sn), SN_IR).await?;
            if ir & IR_SEND_OK != 0 {
                self.write_u8(socket_block(sn), SN_IR, IR_SEND_OK).await?;
                return Ok(());
            }
            if ir & IR_TIMEOUT != 0 {
                self.write_u8(socket_block(sn), SN_IR, IR_TIMEOUT).await?;
                return Err(SocketError::SendTimeout);
            }
            if self.read_status(sn).await? == SocketStatus::Closed {
                return Err(SocketError::Closed);
            }
            yield_now().await;
        }
        Err(SocketError::CommandTimeout)
    }
}

impl<B: ChipBus> SocketDriver for W5500<B> {
    async fn open(&mut self, sn: SocketId, port: u16) -> Result<(), SocketError> {
        Self::check_socket(sn)?;
        self.close_socket(sn).await?;

        self.write_u8(socket_block(sn), SN_MR, SN_MR_TCP).await?;
        self.write_u16(socket_block(sn), SN_PORT, port).await?;
        self.command(sn, CMD_OPEN).await?;

        match self.wait_status_not(sn, SocketStatus::Closed).await? {
            SocketStatus::Init => Ok(()),
            _ => Err(SocketError::NotReady),
        }
    }

    async fn listen(&mut self, sn: SocketId) -> Result<(), SocketError> {
        Self::check_socket(sn)?;
        if self.read_status(sn).await? != SocketStatus::Init {
            return Err(SocketError::NotReady);
        }

        self.command(sn, CMD_LISTEN).await?;
        if self.read_status(sn).await? != SocketStatus::Listen {
            self.close_socket(sn).await?;
            return Err(SocketError::ListenFailed);
        }
        Ok(())
    }

    async fn disconnect(&mut self, sn: SocketId) -> Result<(), SocketError> {
        Self::check_socket(sn)?;
        self.command(sn, CMD_DISCON).await
    }

    async fn close(&mut self, sn: SocketId) -> Result<(), SocketError> {
        Self::check_socket(sn)?;
        self.close_socket(sn).await
    }

    async fn send(&mut self, sn: SocketId, data: &[u8]) -> Result<usize, SocketError> {
        Self::check_socket(sn)?;
        let capacity = usize::from(self.tx_kib[usize::from(sn)]) * 1024;
        let len = data.len().min(capacity);
        if len == 0 {
            return Ok(0);
        }

        let mut room = false;
        for _ in 0..SEND_POLLS {
            match self.read_status(sn).await? {
                SocketStatus::Established | SocketStatus::CloseWait => {}
                _ => return Err(SocketError::Closed),
            }
            let free = self.read_u16_stable(socket_block(sn), SN_TX_FSR).await?;
            if usize::from(free) >= len {
                room = true;
                break;
            }
            yield_now().await;
        }
        if !room {
            return Err(SocketError::SendTimeout);
        }

        // The chip maps the 16-bit pointer onto the socket buffer itself
        let ptr = self.read_u16(socket_block(sn), SN_TX_WR).await?;
        self.write(tx_block(sn), ptr, &data[..len]).await?;
        self.write_u16(socket_block(sn), SN_TX_WR, ptr.wrapping_add(len as u16))
            .await?;

        self.command(sn, CMD_SEND).await?;
        self.wait_send_done(sn).await?;
        Ok(len)
    }

    async fn recv(&mut self, sn: SocketId, buf: &mut [u8]) -> Result<usize, SocketError> {
        Self::check_socket(sn)?;
        let available = usize::from(self.rx_available(sn).await?);
        if available == 0 {
            return match self.read_status(sn).await? {
                SocketStatus::Established => Ok(0),
                _ => Err(SocketError::Closed),
            };
        }

        let len = available.min(buf.len());
        let ptr = self.read_u16(socket_block(sn), SN_RX_RD).await?;
        self.read(rx_block(sn), ptr, &mut buf[..len]).await?;
        self.write_u16(socket_block(sn), SN_RX_RD, ptr.wrapping_add(len as u16))
            .await?;
        self.command(sn, CMD_RECV).await?;
        Ok(len)
    }

    async fn status(&mut self, sn: SocketId) -> Result<SocketStatus, SocketError> {
        Self::check_socket(sn)?;
        self.read_status(sn).await
    }

    async fn rx_available(&mut self, sn: SocketId) -> Result<u16, SocketError> {
        Self::check_socket(sn)?;
        Ok(self.read_u16_stable(socket_block(sn), SN_RX_RSR).await?)
    }

    async fn set_net_info(&mut self, config: &NetConfig) -> Result<(), SocketError> {
        self.write(COMMON_BLOCK, SHAR, &config.mac).await?;
        self.write(COMMON_BLOCK, GAR, &config.gateway).await?;
        self.write(COMMON_BLOCK, SUBR, &config.subnet).await?;
        self.write(COMMON_BLOCK, SIPR, &config.ip).await?;
        self.dns = config.dns;
        Ok(())
    }

    async fn net_info(&mut self) -> Result<NetConfig, SocketError> {
        let mut config = NetConfig {
            mac: [0; 6],
            ip: [0; 4],
            subnet: [0; 4],
            gateway: [0; 4],
            dns: self.dns,
        };
        self.read(COMMON_BLOCK, SHAR, &mut config.mac).await?;
        self.read(COMMON_BLOCK, GAR, &mut config.gateway).await?;
        self.read(COMMON_BLOCK, SUBR, &mut config.subnet).await?;
        self.read(COMMON_BLOCK, SIPR, &mut config.ip).await?;
        Ok(config)
    }
}
