//! Module Exports
//!
//! Peripheral controllers of the Trilobot and the `Robot` facade that owns
//! them.
//!
//! - `motors`: dual H-bridge drive of the left and right wheels.
//! - `buttons`: A/B/X/Y gesture detection and button LEDs.
//! - `sn3218`: I2C protocol of the 18-channel LED driver.
//! - `underlight`: six RGB underlights on top of the SN3218.
//! - `ultrasound`: trigger/echo distance sensor.

pub mod buttons;
pub mod motors;
pub mod sn3218;
pub mod ultrasound;
pub mod underlight;

use alloc::vec::Vec;

use embedded_hal::pwm::SetDutyCycle;
use serde::{Deserialize, Serialize};

use crate::utils::{
    board::Board,
    config::RobotConfig,
    error::{Error, Result, Subsystem, TeardownError},
};

use buttons::{ButtonInput, ButtonLedCommand};
use motors::{MotorCommand, MotorDriver};
use ultrasound::UltrasoundSensor;
use underlight::{LightCommand, UnderlightDriver};

/// Write a duty fraction, clamped to [0, 1], to a PWM channel.
pub(crate) fn set_fraction<P: SetDutyCycle>(
    pwm: &mut P,
    fraction: f64,
) -> Result<()> {
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    let max = pwm.max_duty_cycle();
    let duty = libm::round(fraction * max as f64) as u16;
    pwm.set_duty_cycle(duty).map_err(Error::pwm)
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "ct", rename_all = "snake_case")] // ct = command type
pub enum RobotCommand {
    M(MotorCommand),
    L(LightCommand),
    B(ButtonLedCommand),
}

/// Parse one JSON command, e.g. `{"ct":"m","mc":"forward","speed":0.5}`.
pub fn parse_command(json: &[u8]) -> core::result::Result<RobotCommand, serde_json::Error> {
    serde_json::from_slice(json)
}

/// Every Trilobot peripheral, opened from one `Board`.
pub struct Robot<B: Board> {
    pub motors: MotorDriver<B::Output, B::Pwm>,
    pub buttons: ButtonInput<B::Input, B::Pwm>,
    pub underlights: UnderlightDriver<B::I2c>,
    pub ultrasound: UltrasoundSensor<B::Output, B::Input>,
}

impl<B: Board> Robot<B> {
    /// Open every controller. Each pin and the I2C bus is claimed exactly once.
    pub fn new(
        board: &mut B,
        config: RobotConfig,
    ) -> Result<Self> {
        let buttons = ButtonInput::open(board, config.buttons)?;
        let motors = MotorDriver::open(board)?;
        let underlights = UnderlightDriver::open(board)?;
        let ultrasound = UltrasoundSensor::open(board, config.ultrasound)?;

        tracing::info!("Robot ready");
        Ok(Self {
            motors,
            buttons,
            underlights,
            ultrasound,
        })
    }

    /// Route a command to the controller it names.
    pub fn execute(
        &mut self,
        command: RobotCommand,
    ) -> Result<()> {
        tracing::debug!(?command, "executing");
        match command {
            RobotCommand::M(c) => self.motors.execute(c),
            RobotCommand::L(c) => self.underlights.execute(c),
            RobotCommand::B(c) => self.buttons.execute(c),
        }
    }

    /// Shut every controller down, continuing past failures.
    ///
    /// Button watchers must have been cancelled before closing.
    pub fn close(mut self) -> core::result::Result<(), TeardownError> {
        let steps = [
            (Subsystem::Motors, self.motors.disable()),
            (Subsystem::Buttons, self.buttons.shutdown()),
            (Subsystem::Underlights, self.underlights.shutdown()),
            (Subsystem::Ultrasound, self.ultrasound.shutdown()),
        ];

        let failures: Vec<(Subsystem, Error)> = steps
            .into_iter()
            .filter_map(|(subsystem, result)| result.err().map(|e| (subsystem, e)))
            .inspect(|(subsystem, e)| tracing::error!(?subsystem, %e, "teardown step failed"))
            .collect();

        if failures.is_empty() {
            tracing::info!("Robot closed");
            Ok(())
        } else {
            Err(TeardownError { failures })
        }
    }
}
