//! DMA-driven UART transmitter

/// Register-level UART TX interface (nRF52 UARTE style)
pub trait UartTx {
    /// Configure pins, baud rate and framing, then enable the peripheral.
    ///
    /// Also used to recover a peripheral that failed to finish a transfer.
    fn init(&mut self);

    /// Arm the TX DMA channel with `buf` and trigger STARTTX.
    ///
    /// `buf` must stay untouched until [`is_tx_done`](Self::is_tx_done) or
    /// [`is_tx_stopped`](Self::is_tx_stopped) reports completion.
    fn start_tx(&mut self, buf: &[u8]);

    /// ENDTX event
    fn is_tx_done(&self) -> bool;

    /// Trigger STOPTX
    fn stop_tx(&mut self);

    /// TXSTOPPED event
    fn is_tx_stopped(&self) -> bool;

    /// Clear ENDTX and TXSTOPPED
    fn clear_events(&mut self);
}
