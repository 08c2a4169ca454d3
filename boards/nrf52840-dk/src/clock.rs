use embedded_hal_async::delay::DelayNs;
use netstack_hal::{TickClock, Ticks};
use rtic_monotonics::systick::prelude::*;

use crate::Mono;

/// SysTick monotonic as the stack's tick source (1 tick = 1 ms)
#[derive(Clone, Copy, Default)]
pub struct SysTickClock;

impl TickClock for SysTickClock {
    fn now(&self) -> Ticks {
        Mono::now().ticks()
    }

    async fn delay(&self, ticks: Ticks) {
        Mono::delay(ticks.millis()).await;
    }
}

impl DelayNs for SysTickClock {
    async fn delay_ns(&mut self, ns: u32) {
        // Tick resolution is 1 ms; never wait less than asked
        Mono::delay(ns.div_ceil(1_000_000).millis()).await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        Mono::delay(ms.millis()).await;
    }
}
