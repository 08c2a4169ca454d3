//! Unrecoverable faults
//!
//! Contract violations are caller bugs, not runtime conditions: every
//! assertion in the stack ends up in [`fault`], which logs the context and
//! panics. On target the panic handler disables interrupts and halts; on the
//! host the panic is what tests intercept with `#[should_panic]`.

use core::fmt;

/// Contract violations that halt the system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// `begin` while a transaction is already active
    TransactionActive,
    /// Transfer or `end` without an active transaction
    NoTransaction,
    /// Transfer longer than the engine's hard maximum
    TransferTooLarge { len: usize, max: usize },
    /// Full-duplex transfer with differing TX and RX lengths
    LengthMismatch { tx: usize, rx: usize },
    /// Receive buffer the DMA engine cannot write to
    RxNotDmaAccessible,
    /// Chip critical section entered while already held
    CriticalSectionHeld,
    /// Network configuration read back from the chip differs from what was set
    NetConfigMismatch,
    /// A boot-time task could not be started
    TaskSpawn,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransactionActive => write!(f, "SPI transaction already active"),
            Self::NoTransaction => write!(f, "no active SPI transaction"),
            Self::TransferTooLarge { len, max } => {
                write!(f, "SPI transfer of {} bytes exceeds maximum {}", len, max)
            }
            Self::LengthMismatch { tx, rx } => {
                write!(f, "SPI txrx length mismatch (tx {}, rx {})", tx, rx)
            }
            Self::RxNotDmaAccessible => write!(f, "SPI receive buffer not DMA accessible"),
            Self::CriticalSectionHeld => write!(f, "chip critical section already held"),
            Self::NetConfigMismatch => write!(f, "network configuration readback mismatch"),
            Self::TaskSpawn => write!(f, "task spawn failed"),
        }
    }
}

/// Terminal action for every contract violation
#[cold]
#[track_caller]
pub fn fault(fault: Fault) -> ! {
    error!("FATAL: {}", fault);
    panic!("fatal fault: {}", fault)
}
