//! GPIO-driven character LCD support.
//!
//! The crate is split into a narrow [GpioBackend] contract, a couple of backends implementing it
//! ([gpiod::GpiodBackend] for Linux character devices, [sim::SimGpioBackend] for tests), and the
//! [HD44780 driver](lcd::hd44780) built on top of them.
pub mod gpiod;
pub mod lcd;
pub mod sim;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("expected {expected} data pins, got {actual}")]
    DataPinCount { expected: usize, actual: usize },
    #[error("the display has not been initialized")]
    NotInitialized,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// Identifier of a single GPIO line, as understood by the backend.
pub type PinId = u32;

/// Direction a GPIO line is configured for.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PinMode {
    Input,
    Output,
}

/// Logic level of a GPIO line.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PinLevel {
    #[default]
    Low,
    High,
}

impl PinLevel {
    pub fn is_high(self) -> bool {
        self == PinLevel::High
    }
}

impl From<bool> for PinLevel {
    fn from(value: bool) -> Self {
        if value { PinLevel::High } else { PinLevel::Low }
    }
}

/// The capability set a display driver needs from the hardware.
///
/// Pins are addressed by [PinId]. A backend is expected to be exclusively owned by a single
/// driver, so every method takes `&mut self`; callers sharing one between threads have to
/// serialize access themselves.
pub trait GpioBackend: Debug {
    /// Configures the pin as an input or an output.
    fn configure_pin(&mut self, pin: PinId, mode: PinMode) -> GpioResult<()>;

    /// Drives an output pin to the given level.
    fn write_digital(&mut self, pin: PinId, level: PinLevel) -> GpioResult<()>;

    /// Reads the level of an input pin.
    fn read_digital(&mut self, pin: PinId) -> GpioResult<PinLevel>;

    /// Blocks for **at least** `us` microseconds.
    ///
    /// Implementations may overshoot, but must never return early.
    fn sleep_micros(&mut self, us: u32) -> GpioResult<()>;
}

impl<B: GpioBackend + ?Sized> GpioBackend for &mut B {
    fn configure_pin(&mut self, pin: PinId, mode: PinMode) -> GpioResult<()> {
        (**self).configure_pin(pin, mode)
    }

    fn write_digital(&mut self, pin: PinId, level: PinLevel) -> GpioResult<()> {
        (**self).write_digital(pin, level)
    }

    fn read_digital(&mut self, pin: PinId) -> GpioResult<PinLevel> {
        (**self).read_digital(pin)
    }

    fn sleep_micros(&mut self, us: u32) -> GpioResult<()> {
        (**self).sleep_micros(us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_level_from_bool() {
        assert_eq!(PinLevel::from(true), PinLevel::High);
        assert_eq!(PinLevel::from(false), PinLevel::Low);
        assert!(PinLevel::High.is_high());
        assert!(!PinLevel::default().is_high());
    }

    #[test]
    fn io_errors_keep_their_kind() {
        let err: GpioError = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert_eq!(err, GpioError::Io(std::io::ErrorKind::PermissionDenied));
    }

    #[test]
    fn data_pin_count_message() {
        let err = GpioError::DataPinCount { expected: 4, actual: 8 };
        assert_eq!(err.to_string(), "expected 4 data pins, got 8");
    }
}
