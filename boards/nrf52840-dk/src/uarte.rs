//! UARTE0, TX only

#![allow(unsafe_code)]

use netstack_hal::{PinId, UartTx};
use nrf52840_pac::UARTE0;

/// ENABLE value selecting UARTE
const ENABLE_UARTE: u32 = 8;
/// 115200 baud
const BAUD_115200: u32 = 0x01D6_0000;
/// PSEL.CONNECT = disconnected
const PSEL_DISCONNECTED: u32 = 1 << 31;

pub struct Uarte0 {
    regs: UARTE0,
    tx_pin: PinId,
}

impl Uarte0 {
    /// `tx_pin` must already be an output idling high
    pub fn new(regs: UARTE0, tx_pin: PinId) -> Self {
        Self { regs, tx_pin }
    }
}

impl UartTx for Uarte0 {
    fn init(&mut self) {
        let r = &self.regs;
        r.enable.write(|w| unsafe { w.bits(0) });

        r.psel.txd.write(|w| unsafe { w.bits(u32::from(self.tx_pin)) });
        r.psel.rxd.write(|w| unsafe { w.bits(PSEL_DISCONNECTED) });
        // No flow control, no parity, one stop bit
        r.config.write(|w| unsafe { w.bits(0) });
        r.baudrate.write(|w| unsafe { w.bits(BAUD_115200) });

        r.events_endtx.write(|w| unsafe { w.bits(0) });
        r.events_txstopped.write(|w| unsafe { w.bits(0) });
        r.enable.write(|w| unsafe { w.bits(ENABLE_UARTE) });
    }

    fn start_tx(&mut self, buf: &[u8]) {
        let r = &self.regs;
        r.txd.ptr.write(|w| unsafe { w.bits(buf.as_ptr() as u32) });
        r.txd.maxcnt.write(|w| unsafe { w.bits(buf.len() as u32) });
        r.tasks_starttx.write(|w| unsafe { w.bits(1) });
    }

    fn is_tx_done(&self) -> bool {
        self.regs.events_endtx.read().bits() != 0
    }

    fn stop_tx(&mut self) {
        self.regs.tasks_stoptx.write(|w| unsafe { w.bits(1) });
    }

    fn is_tx_stopped(&self) -> bool {
        self.regs.events_txstopped.read().bits() != 0
    }

    fn clear_events(&mut self) {
        self.regs.events_endtx.write(|w| unsafe { w.bits(0) });
        self.regs.events_txstopped.write(|w| unsafe { w.bits(0) });
    }
}
