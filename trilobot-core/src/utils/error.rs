//! Error types shared by every Trilobot controller.
//!
//! Leaf errors from `embedded-hal` implementations are folded into their
//! `ErrorKind` so that one non-generic `Error` covers GPIO, PWM and I2C.

use alloc::vec::Vec;
use core::fmt;

use embedded_hal::{digital, i2c, pwm};

/// Errors that can occur when driving Trilobot peripherals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The caller passed a value that is rejected rather than clamped.
    InvalidInput(InvalidInput),
    /// A GPIO line read or write failed.
    Gpio(digital::ErrorKind),
    /// A PWM duty-cycle write failed.
    Pwm(pwm::ErrorKind),
    /// An I2C bus write failed.
    I2c(i2c::ErrorKind),
    /// The board could not hand out the requested pin.
    PinUnavailable(u8),
    /// The board could not open the requested I2C bus.
    BusUnavailable(u8),
    /// No ultrasound sample completed within its timeout.
    SensorTimeout,
    /// The caller's cancel token fired before the operation completed.
    Cancelled,
}

/// Inputs that are always rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidInput {
    /// The SN3218 takes exactly one value per channel.
    ChannelCount { expected: usize, actual: usize },
    /// A colour component outside 0..=255.
    ColorComponent { component: Component, value: i32 },
    /// A distance read needs at least one sample.
    ZeroSamples,
}

/// RGB component named in [`InvalidInput::ColorComponent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Red,
    Green,
    Blue,
}

impl Error {
    pub(crate) fn gpio<E: digital::Error>(e: E) -> Self {
        Self::Gpio(e.kind())
    }

    pub(crate) fn pwm<E: pwm::Error>(e: E) -> Self {
        Self::Pwm(e.kind())
    }

    pub(crate) fn i2c<E: i2c::Error>(e: E) -> Self {
        Self::I2c(e.kind())
    }
}

impl From<InvalidInput> for Error {
    fn from(e: InvalidInput) -> Self {
        Self::InvalidInput(e)
    }
}

impl fmt::Display for Error {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::InvalidInput(e) => write!(f, "invalid input: {e}"),
            Self::Gpio(kind) => write!(f, "GPIO failure: {kind:?}"),
            Self::Pwm(kind) => write!(f, "PWM failure: {kind:?}"),
            Self::I2c(kind) => write!(f, "I2C failure: {kind:?}"),
            Self::PinUnavailable(pin) => write!(f, "pin {pin} unavailable"),
            Self::BusUnavailable(bus) => write!(f, "I2C bus {bus} unavailable"),
            Self::SensorTimeout => write!(f, "ultrasound sensor timed out"),
            Self::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl fmt::Display for InvalidInput {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::ChannelCount { expected, actual } => {
                write!(f, "expected {expected} channel values, got {actual}")
            }
            Self::ColorComponent { component, value } => {
                write!(f, "{component:?} component {value} outside 0..=255")
            }
            Self::ZeroSamples => write!(f, "sample count must be at least 1"),
        }
    }
}

/// Controller named in a [`TeardownError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    Motors,
    Buttons,
    Underlights,
    Ultrasound,
}

/// Every shutdown step that failed while closing a `Robot`.
///
/// Teardown keeps going after a failure, so more than one controller may be
/// listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownError {
    pub failures: Vec<(Subsystem, Error)>,
}

impl fmt::Display for TeardownError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "teardown failed for")?;
        for (subsystem, error) in &self.failures {
            write!(f, " [{subsystem:?}: {error}]")?;
        }
        Ok(())
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
