use embassy_futures::yield_now;
use netstack_hal::{TickClock, Ticks};

/// Poll `ready` until it holds or `timeout` ticks elapse, yielding in between.
///
/// Returns whether `ready` was observed.
pub(crate) async fn poll_until<C, F>(clock: &C, timeout: Ticks, mut ready: F) -> bool
where
    C: TickClock,
    F: FnMut() -> bool,
{
    let start = clock.now();
    loop {
        if ready() {
            return true;
        }
        if clock.elapsed_since(start) >= timeout {
            return false;
        }
        yield_now().await;
    }
}
