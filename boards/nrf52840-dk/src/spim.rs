//! SPIM0 with EasyDMA

#![allow(unsafe_code)]

use netstack_hal::spi::{Phase, Polarity};
use netstack_hal::{BitOrder, BusConfig, Frequency, PinId, SpiMaster};
use nrf52840_pac::SPIM0;

/// ENABLE value selecting SPIM (as opposed to SPI/SPIS)
const ENABLE_SPIM: u32 = 7;

/// EasyDMA can only reach data RAM
pub const DMA_RAM: core::ops::Range<usize> = 0x2000_0000..0x2004_0000;

const CONFIG_ORDER_LSB: u32 = 1 << 0;
const CONFIG_CPHA_TRAILING: u32 = 1 << 1;
const CONFIG_CPOL_ACTIVE_LOW: u32 = 1 << 2;

pub struct SpimPins {
    pub sck: PinId,
    pub mosi: PinId,
    pub miso: PinId,
}

pub struct Spim0 {
    regs: SPIM0,
    pins: SpimPins,
}

impl Spim0 {
    /// SCK and MOSI must already be outputs and MISO an input
    pub fn new(regs: SPIM0, pins: SpimPins) -> Self {
        Self { regs, pins }
    }
}

fn frequency_bits(frequency: Frequency) -> u32 {
    match frequency {
        Frequency::K125 => 0x0200_0000,
        Frequency::K250 => 0x0400_0000,
        Frequency::K500 => 0x0800_0000,
        Frequency::M1 => 0x1000_0000,
        Frequency::M2 => 0x2000_0000,
        Frequency::M4 => 0x4000_0000,
        Frequency::M8 => 0x8000_0000,
        Frequency::M16 => 0x0A00_0000,
        Frequency::M32 => 0x1400_0000,
    }
}

fn config_bits(config: &BusConfig) -> u32 {
    let mut bits = 0;
    if config.order == BitOrder::LsbFirst {
        bits |= CONFIG_ORDER_LSB;
    }
    if config.mode.phase == Phase::CaptureOnSecondTransition {
        bits |= CONFIG_CPHA_TRAILING;
    }
    if config.mode.polarity == Polarity::IdleHigh {
        bits |= CONFIG_CPOL_ACTIVE_LOW;
    }
    bits
}

impl SpiMaster for Spim0 {
    fn enable(&mut self) {
        let r = &self.regs;
        r.psel.sck.write(|w| unsafe { w.bits(u32::from(self.pins.sck)) });
        r.psel.mosi.write(|w| unsafe { w.bits(u32::from(self.pins.mosi)) });
        r.psel.miso.write(|w| unsafe { w.bits(u32::from(self.pins.miso)) });
        r.enable.write(|w| unsafe { w.bits(ENABLE_SPIM) });
    }

    fn configure(&mut self, config: &BusConfig) {
        let r = &self.regs;
        r.config.write(|w| unsafe { w.bits(config_bits(config)) });
        r.frequency.write(|w| unsafe { w.bits(frequency_bits(config.frequency)) });
        r.orc.write(|w| unsafe { w.bits(u32::from(config.dummy)) });
    }

    fn start(&mut self, tx: &[u8], rx: &mut [u8]) {
        let r = &self.regs;
        r.events_end.write(|w| unsafe { w.bits(0) });

        r.txd.ptr.write(|w| unsafe { w.bits(tx.as_ptr() as u32) });
        r.txd.maxcnt.write(|w| unsafe { w.bits(tx.len() as u32) });
        r.rxd.ptr.write(|w| unsafe { w.bits(rx.as_mut_ptr() as u32) });
        r.rxd.maxcnt.write(|w| unsafe { w.bits(rx.len() as u32) });

        r.tasks_start.write(|w| unsafe { w.bits(1) });
    }

    fn is_finished(&self) -> bool {
        self.regs.events_end.read().bits() != 0
    }

    fn stop(&mut self) {
        self.regs.tasks_stop.write(|w| unsafe { w.bits(1) });
    }

    fn is_stopped(&self) -> bool {
        self.regs.events_stopped.read().bits() != 0
    }

    fn clear_events(&mut self) {
        self.regs.events_end.write(|w| unsafe { w.bits(0) });
        self.regs.events_stopped.write(|w| unsafe { w.bits(0) });
    }

    fn is_dma_accessible(&self, buf: &[u8]) -> bool {
        let start = buf.as_ptr() as usize;
        DMA_RAM.contains(&start) && start + buf.len() <= DMA_RAM.end
    }
}
