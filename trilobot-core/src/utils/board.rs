//! Board abstraction: the handle controllers use to open their leaves.
//!
//! A `Board` is the explicit stand-in for a GPIO/PWM/I2C controller. It is
//! passed by `&mut` into each controller's `open`, which requests exactly the
//! pins listed in [`pins`](super::pins). Implementations for a real SBC wrap
//! their HAL (for example `rppal`, which implements the `embedded-hal` traits);
//! the integration tests provide a simulated board.

use embedded_hal::{
    digital::{InputPin, OutputPin},
    i2c::I2c,
    pwm::SetDutyCycle,
};
use embedded_hal_async::digital::Wait;

use super::error::Result;

/// Opens GPIO lines, PWM channels and I2C buses by number.
///
/// Each pin is opened at most once; implementations should return
/// [`Error::PinUnavailable`](super::Error::PinUnavailable) when a pin is
/// already claimed.
pub trait Board {
    type Output: OutputPin;
    type Input: InputPin + Wait;
    type Pwm: SetDutyCycle;
    type I2c: I2c;

    /// Open `pin` as a push-pull output, initially low.
    fn output(
        &mut self,
        pin: u8,
    ) -> Result<Self::Output>;

    /// Open `pin` as a floating input.
    fn input(
        &mut self,
        pin: u8,
    ) -> Result<Self::Input>;

    /// Open `pin` as an input with the internal pull-up enabled.
    fn input_pull_up(
        &mut self,
        pin: u8,
    ) -> Result<Self::Input>;

    /// Start a PWM channel on `pin` at `frequency_hz` with `duty` in [0, 1].
    fn pwm(
        &mut self,
        pin: u8,
        frequency_hz: f64,
        duty: f64,
    ) -> Result<Self::Pwm>;

    /// Open I2C bus `bus`.
    fn i2c(
        &mut self,
        bus: u8,
    ) -> Result<Self::I2c>;
}
