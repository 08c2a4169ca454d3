use heapless::Vec;

use crate::config::{LOG_LABEL_LEN, LOG_PAYLOAD_LEN};

/// How the drain task renders a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogKind {
    /// Uppercase hex pairs
    Hex,
    /// Little-endian `u32` rendered in decimal
    UnsignedInt,
    /// Raw bytes
    String,
}

/// A log record, copied by value into the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    kind: LogKind,
    label: [u8; LOG_LABEL_LEN],
    payload: Vec<u8, LOG_PAYLOAD_LEN>,
}

impl LogRecord {
    /// Build a record, space-padding the label and truncating the payload
    pub fn new(kind: LogKind, label: &str, payload: &[u8]) -> Self {
        let mut padded = [b' '; LOG_LABEL_LEN];
        for (dst, src) in padded
            .iter_mut()
            .zip(label.bytes().take_while(|&b| b != 0))
        {
            *dst = src;
        }

        let len = payload.len().min(LOG_PAYLOAD_LEN);
        let mut bytes = Vec::new();
        // Fits: len is clamped to capacity above
        let _ = bytes.extend_from_slice(&payload[..len]);

        Self {
            kind,
            label: padded,
            payload: bytes,
        }
    }

    pub fn string(label: &str, text: &str) -> Self {
        Self::new(LogKind::String, label, text.as_bytes())
    }

    pub fn hex(label: &str, bytes: &[u8]) -> Self {
        Self::new(LogKind::Hex, label, bytes)
    }

    pub fn uint(label: &str, value: u32) -> Self {
        Self::new(LogKind::UnsignedInt, label, &value.to_le_bytes())
    }

    pub fn kind(&self) -> LogKind {
        self.kind
    }

    /// Space-padded label, always [`LOG_LABEL_LEN`] bytes
    pub fn label(&self) -> &[u8] {
        &self.label
    }

    /// Valid payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Decode an `UnsignedInt` payload; missing bytes read as zero
    pub fn as_u32(&self) -> u32 {
        let mut raw = [0u8; 4];
        let n = self.payload.len().min(raw.len());
        raw[..n].copy_from_slice(&self.payload[..n]);
        u32::from_le_bytes(raw)
    }
}
