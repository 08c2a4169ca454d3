//! Scheduler tick source

use core::future::Future;

/// Scheduler ticks. Wraps; always compare with [`TickClock::elapsed_since`].
pub type Ticks = u32;

/// Tick count and cooperative tick delay provided by the scheduler.
///
/// `delay` is only valid inside a task context.
pub trait TickClock {
    /// Current tick count
    fn now(&self) -> Ticks;

    /// Suspend the calling task for `ticks` scheduler ticks
    fn delay(&self, ticks: Ticks) -> impl Future<Output = ()>;

    /// Ticks elapsed since `start`, wrap-safe
    fn elapsed_since(&self, start: Ticks) -> Ticks {
        self.now().wrapping_sub(start)
    }
}

impl<T: TickClock + ?Sized> TickClock for &T {
    fn now(&self) -> Ticks {
        (**self).now()
    }

    fn delay(&self, ticks: Ticks) -> impl Future<Output = ()> {
        (**self).delay(ticks)
    }
}
