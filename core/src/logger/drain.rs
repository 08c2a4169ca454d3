use embedded_io_async::Write;
use netstack_hal::TickClock;

use super::queue::LogQueue;
use super::record::{LogKind, LogRecord};
use crate::config::{LOG_PAYLOAD_LEN, LOG_QUEUE_CAP};

const LINE_END: &[u8] = b"\r\n";

/// Render `value` as decimal ASCII into `out`, returning the digit count
pub fn format_u32(mut value: u32, out: &mut [u8; 10]) -> usize {
    if value == 0 {
        out[0] = b'0';
        return 1;
    }

    // Digits come out least significant first
    let mut tmp = [0u8; 10];
    let mut n = 0;
    while value != 0 {
        tmp[n] = b'0' + (value % 10) as u8;
        value /= 10;
        n += 1;
    }

    for (i, digit) in tmp[..n].iter().rev().enumerate() {
        out[i] = *digit;
    }
    n
}

/// Render `input` as uppercase hex pairs into `out`, returning bytes written
///
/// Stops early if `out` is shorter than `2 * input.len()`.
pub fn format_hex(input: &[u8], out: &mut [u8]) -> usize {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";

    let mut n = 0;
    for (byte, pair) in input.iter().zip(out.chunks_exact_mut(2)) {
        pair[0] = DIGITS[(byte >> 4) as usize];
        pair[1] = DIGITS[(byte & 0x0F) as usize];
        n += 2;
    }
    n
}

/// The single consumer of a [`LogQueue`]
///
/// Writes `label`, the formatted payload and `\r\n` for each record.
pub struct LogDrain<'a, W, C, const N: usize = LOG_QUEUE_CAP> {
    queue: &'a LogQueue<N>,
    sink: W,
    clock: C,
}

impl<'a, W, C, const N: usize> LogDrain<'a, W, C, N>
where
    W: Write,
    C: TickClock,
{
    pub fn new(queue: &'a LogQueue<N>, sink: W, clock: C) -> Self {
        Self { queue, sink, clock }
    }

    /// Drain forever; sleeps one tick whenever the queue is empty
    pub async fn run(&mut self) -> ! {
        loop {
            match self.drain_one().await {
                Ok(true) => {}
                Ok(false) => self.clock.delay(1).await,
                // The record is lost; the sink has already run its own recovery
                Err(_) => warn!("log drain: serial write failed"),
            }
        }
    }

    /// Write out one record. Returns `Ok(false)` when the queue was empty.
    pub async fn drain_one(&mut self) -> Result<bool, W::Error> {
        match self.queue.try_dequeue() {
            Some(record) => {
                write_record(&mut self.sink, &record).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }
}

async fn write_record<W: Write>(sink: &mut W, record: &LogRecord) -> Result<(), W::Error> {
    sink.write_all(record.label()).await?;

    match record.kind() {
        LogKind::UnsignedInt => {
            let mut digits = [0u8; 10];
            let n = format_u32(record.as_u32(), &mut digits);
            sink.write_all(&digits[..n]).await?;
        }
        LogKind::Hex => {
            let mut hex = [0u8; 2 * LOG_PAYLOAD_LEN];
            let n = format_hex(record.payload(), &mut hex);
            sink.write_all(&hex[..n]).await?;
        }
        LogKind::String => sink.write_all(record.payload()).await?,
    }

    sink.write_all(LINE_END).await
}
