//! P0 GPIO port

#![allow(unsafe_code)]

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use netstack_hal::{GpioPort, PinId};
use nrf52840_pac::{p0, P0};

/// PIN_CNF: DIR = output, INPUT = disconnect, no pull, S0S1 drive
const CNF_OUTPUT: u32 = 0b11;
/// PIN_CNF: DIR = input, INPUT = connect, no pull
const CNF_INPUT: u32 = 0b00;

/// Handle to port 0
///
/// OUTSET/OUTCLR act on single bits, so copies of the handle can drive
/// different pins without coordination.
#[derive(Clone, Copy)]
pub struct Port0 {
    _private: (),
}

impl Port0 {
    /// Take the port
    pub fn new(_p0: P0) -> Self {
        Self { _private: () }
    }

    fn regs(&self) -> &'static p0::RegisterBlock {
        // SAFETY: only reachable through a handle created from the owned P0
        unsafe { &*P0::ptr() }
    }

    pub fn configure_input(&mut self, pin: PinId) {
        self.regs().pin_cnf[usize::from(pin)].write(|w| unsafe { w.bits(CNF_INPUT) });
    }

    /// Configure `pin` as an output driven `high` and hand it out as an embedded-hal pin
    pub fn output(mut self, pin: PinId, high: bool) -> Output {
        if high {
            self.set_high(pin);
        } else {
            self.set_low(pin);
        }
        self.configure_output(pin);
        Output { port: self, pin }
    }
}

impl GpioPort for Port0 {
    fn configure_output(&mut self, pin: PinId) {
        self.regs().pin_cnf[usize::from(pin)].write(|w| unsafe { w.bits(CNF_OUTPUT) });
    }

    fn set_high(&mut self, pin: PinId) {
        self.regs().outset.write(|w| unsafe { w.bits(1 << pin) });
    }

    fn set_low(&mut self, pin: PinId) {
        self.regs().outclr.write(|w| unsafe { w.bits(1 << pin) });
    }
}

/// A single output pin
pub struct Output {
    port: Port0,
    pin: PinId,
}

impl ErrorType for Output {
    type Error = Infallible;
}

impl OutputPin for Output {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.port.set_low(self.pin);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.port.set_high(self.pin);
        Ok(())
    }
}
