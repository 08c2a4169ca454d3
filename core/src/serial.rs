//! DMA UART writer
//!
//! Copies each write into a RAM staging buffer the DMA engine can read,
//! starts the transfer and polls for ENDTX. A transfer that never finishes
//! is stopped and the peripheral reinitialized before the error is
//! returned, so the next write starts from a clean state.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embedded_io_async::{ErrorType, Write};
use netstack_hal::{TickClock, UartTx};

use crate::config::{SerialConfig, UART_TX_BUF_SIZE};
use crate::error::SerialError;
use crate::wait::poll_until;

struct Inner<U, C> {
    uart: U,
    clock: C,
    config: SerialConfig,
    buf: [u8; UART_TX_BUF_SIZE],
}

/// Serial output shared by reference between tasks
pub struct SerialPort<M: RawMutex, U, C> {
    inner: Mutex<M, Inner<U, C>>,
}

impl<M, U, C> SerialPort<M, U, C>
where
    M: RawMutex,
    U: UartTx,
    C: TickClock,
{
    pub fn new(mut uart: U, clock: C, config: SerialConfig) -> Self {
        uart.init();
        Self {
            inner: Mutex::new(Inner {
                uart,
                clock,
                config,
                buf: [0; UART_TX_BUF_SIZE],
            }),
        }
    }

    /// Send up to [`UART_TX_BUF_SIZE`] bytes of `data`, returning how many were sent
    pub async fn write_bytes(&self, data: &[u8]) -> Result<usize, SerialError> {
        if data.is_empty() {
            return Ok(0);
        }
        self.inner.lock().await.send(data).await
    }
}

impl<U, C> Inner<U, C>
where
    U: UartTx,
    C: TickClock,
{
    async fn send(&mut self, data: &[u8]) -> Result<usize, SerialError> {
        let len = data.len().min(UART_TX_BUF_SIZE);
        self.buf[..len].copy_from_slice(&data[..len]);

        self.uart.clear_events();
        self.uart.start_tx(&self.buf[..len]);

        let uart = &self.uart;
        if poll_until(&self.clock, self.config.timeout, || uart.is_tx_done()).await {
            self.uart.clear_events();
            return Ok(len);
        }

        self.uart.stop_tx();
        let uart = &self.uart;
        if !poll_until(&self.clock, self.config.stop_timeout, || uart.is_tx_stopped()).await {
            warn!("serial: TXSTOPPED not observed, reinitializing anyway");
        }
        self.uart.clear_events();
        self.uart.init();

        Err(SerialError::Timeout)
    }
}

impl<M: RawMutex, U, C> ErrorType for &SerialPort<M, U, C> {
    type Error = SerialError;
}

impl<M, U, C> Write for &SerialPort<M, U, C>
where
    M: RawMutex,
    U: UartTx,
    C: TickClock,
{
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.write_bytes(buf).await
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        // Every write waits for ENDTX before returning
        Ok(())
    }
}
