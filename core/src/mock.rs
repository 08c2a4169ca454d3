//! Host fakes for the hardware traits

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::ops::Range;
use std::rc::Rc;

use netstack_hal::{BusConfig, GpioPort, PinId, SpiMaster, TickClock, Ticks, UartTx};

use crate::logger::LogQueue;

/// Log queue with `'static` lifetime for components that hold one
pub fn leaked_log() -> &'static LogQueue {
    Box::leak(Box::new(LogQueue::new()))
}

/// Tick clock that advances `step` ticks per `now()` read and `n` ticks per delay
pub struct FakeClock {
    now: Cell<Ticks>,
    step: Ticks,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::with_step(1)
    }

    pub fn with_step(step: Ticks) -> Self {
        Self {
            now: Cell::new(0),
            step,
        }
    }

    pub fn peek(&self) -> Ticks {
        self.now.get()
    }
}

impl TickClock for FakeClock {
    fn now(&self) -> Ticks {
        let t = self.now.get();
        self.now.set(t.wrapping_add(self.step));
        t
    }

    async fn delay(&self, ticks: Ticks) {
        self.now.set(self.now.get().wrapping_add(ticks));
    }
}

#[derive(Default)]
pub struct SpimState {
    pub enabled: bool,
    pub config: Option<BusConfig>,
    /// Bytes sent on MOSI, one entry per transfer
    pub wire: Vec<Vec<u8>>,
    /// Address of the TX buffer handed to DMA, one entry per transfer
    pub tx_addrs: Vec<usize>,
    /// Bytes returned on MISO; zeros once exhausted
    pub miso: VecDeque<u8>,
    /// Never raise END
    pub stall: bool,
    finished: bool,
    stopped: bool,
    pub stops: usize,
    /// Address range the fake DMA engine cannot reach
    pub flash: Option<Range<usize>>,
}

#[derive(Clone, Default)]
pub struct FakeSpim(pub Rc<RefCell<SpimState>>);

impl FakeSpim {
    pub fn state(&self) -> std::cell::RefMut<'_, SpimState> {
        self.0.borrow_mut()
    }
}

impl SpiMaster for FakeSpim {
    fn enable(&mut self) {
        self.state().enabled = true;
    }

    fn configure(&mut self, config: &BusConfig) {
        self.state().config = Some(*config);
    }

    fn start(&mut self, tx: &[u8], rx: &mut [u8]) {
        let mut s = self.state();
        s.wire.push(tx.to_vec());
        s.tx_addrs.push(tx.as_ptr() as usize);
        for byte in rx.iter_mut() {
            *byte = s.miso.pop_front().unwrap_or(0);
        }
        s.finished = !s.stall;
    }

    fn is_finished(&self) -> bool {
        self.0.borrow().finished
    }

    fn stop(&mut self) {
        let mut s = self.state();
        s.stops += 1;
        s.stopped = true;
    }

    fn is_stopped(&self) -> bool {
        self.0.borrow().stopped
    }

    fn clear_events(&mut self) {
        let mut s = self.state();
        s.finished = false;
        s.stopped = false;
    }

    fn is_dma_accessible(&self, buf: &[u8]) -> bool {
        let addr = buf.as_ptr() as usize;
        match &self.0.borrow().flash {
            Some(range) => !range.contains(&addr),
            None => true,
        }
    }
}

#[derive(Default)]
pub struct GpioState {
    pub outputs: Vec<PinId>,
    pub levels: HashMap<PinId, bool>,
}

#[derive(Clone, Default)]
pub struct FakeGpio(pub Rc<RefCell<GpioState>>);

impl FakeGpio {
    pub fn level(&self, pin: PinId) -> Option<bool> {
        self.0.borrow().levels.get(&pin).copied()
    }
}

impl GpioPort for FakeGpio {
    fn configure_output(&mut self, pin: PinId) {
        self.0.borrow_mut().outputs.push(pin);
    }

    fn set_high(&mut self, pin: PinId) {
        self.0.borrow_mut().levels.insert(pin, true);
    }

    fn set_low(&mut self, pin: PinId) {
        self.0.borrow_mut().levels.insert(pin, false);
    }
}

#[derive(Default)]
pub struct UartState {
    pub inits: usize,
    pub sent: Vec<u8>,
    pub stall: bool,
    done: bool,
    stopped: bool,
    pub stops: usize,
}

#[derive(Clone, Default)]
pub struct FakeUart(pub Rc<RefCell<UartState>>);

impl FakeUart {
    pub fn state(&self) -> std::cell::RefMut<'_, UartState> {
        self.0.borrow_mut()
    }
}

impl UartTx for FakeUart {
    fn init(&mut self) {
        self.state().inits += 1;
    }

    fn start_tx(&mut self, buf: &[u8]) {
        let mut s = self.state();
        if !s.stall {
            s.sent.extend_from_slice(buf);
            s.done = true;
        }
    }

    fn is_tx_done(&self) -> bool {
        self.0.borrow().done
    }

    fn stop_tx(&mut self) {
        let mut s = self.state();
        s.stops += 1;
        s.stopped = true;
    }

    fn is_tx_stopped(&self) -> bool {
        self.0.borrow().stopped
    }

    fn clear_events(&mut self) {
        let mut s = self.state();
        s.done = false;
        s.stopped = false;
    }
}

/// Serial sink collecting everything written
#[derive(Default)]
pub struct VecSink(pub Vec<u8>);

impl embedded_io_async::ErrorType for VecSink {
    type Error = Infallible;
}

impl embedded_io_async::Write for VecSink {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
