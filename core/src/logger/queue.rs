use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Deque;

use super::record::LogRecord;
use crate::config::LOG_QUEUE_CAP;

struct Ring<const N: usize> {
    records: Deque<LogRecord, N>,
    dropped: u32,
}

/// Fixed-capacity log queue, overwrite-oldest on full
///
/// Many producers, one consumer. Each enqueue/dequeue is atomic under a
/// critical-section mutex, so producers at any task priority may log.
pub struct LogQueue<const N: usize = LOG_QUEUE_CAP> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Ring<N>>>,
}

impl<const N: usize> LogQueue<N> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Ring {
                records: Deque::new(),
                dropped: 0,
            })),
        }
    }

    /// Append a record, evicting the oldest one when full. Never fails.
    pub fn enqueue(&self, record: LogRecord) {
        self.inner.lock(|ring| {
            let mut ring = ring.borrow_mut();
            if ring.records.is_full() {
                ring.records.pop_front();
                ring.dropped = ring.dropped.wrapping_add(1);
            }
            // A slot is free at this point
            let _ = ring.records.push_back(record);
        });
    }

    /// Pop the oldest record, if any
    pub fn try_dequeue(&self) -> Option<LogRecord> {
        self.inner.lock(|ring| ring.borrow_mut().records.pop_front())
    }

    pub fn log_str(&self, label: &str, text: &str) {
        self.enqueue(LogRecord::string(label, text));
    }

    pub fn log_hex(&self, label: &str, bytes: &[u8]) {
        self.enqueue(LogRecord::hex(label, bytes));
    }

    pub fn log_u32(&self, label: &str, value: u32) {
        self.enqueue(LogRecord::uint(label, value));
    }

    /// Records currently queued
    pub fn len(&self) -> usize {
        self.inner.lock(|ring| ring.borrow().records.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records evicted to make room since boot
    pub fn dropped(&self) -> u32 {
        self.inner.lock(|ring| ring.borrow().dropped)
    }
}

impl<const N: usize> Default for LogQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
