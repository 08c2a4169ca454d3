//! Structured log pipeline
//!
//! Producers anywhere in the stack push fixed-size [`LogRecord`]s into a
//! [`LogQueue`]; a single low-priority [`LogDrain`] task formats them and
//! writes them to a serial sink. The queue overwrites its oldest record
//! when full, so logging never blocks a producer beyond a short critical
//! section and never grows.

mod drain;
mod queue;
mod record;

pub use drain::{format_hex, format_u32, LogDrain};
pub use queue::LogQueue;
pub use record::{LogKind, LogRecord};
