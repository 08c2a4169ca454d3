//! GPIO port addressed by pin number

/// Pin number within the port (P0.00 - P0.31 on the nRF52840)
pub type PinId = u8;

/// Output control for a single GPIO port.
///
/// Pins are addressed by number so that device descriptors can stay plain
/// `const` data.
pub trait GpioPort {
    /// Configure `pin` as a push-pull output with its input buffer disconnected
    fn configure_output(&mut self, pin: PinId);

    /// Drive `pin` high
    fn set_high(&mut self, pin: PinId);

    /// Drive `pin` low
    fn set_low(&mut self, pin: PinId);
}
