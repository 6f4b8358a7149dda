//! Motor control for the Trilobot's DRV8833 dual H-bridge.
//!
//! Each motor is driven by two software-PWM legs plus one shared enable line.
//! Speeds are clamped to [-1, 1] rather than rejected. Commands arrive as
//! `MotorCommand` values (serialised with tag `"mc"`).

use embassy_time::{Duration, Timer};
use embedded_hal::{digital::OutputPin, pwm::SetDutyCycle};
use serde::{Deserialize, Serialize};

use super::set_fraction;
use crate::utils::{
    board::Board,
    error::{Error, Result},
    pins,
};

/// Logical motor identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorId {
    Left,
    Right,
}

impl MotorId {
    pub const ALL: [MotorId; 2] = [MotorId::Left, MotorId::Right];

    fn index(self) -> usize {
        self as usize
    }
}

/// Motor command variants for direct speed control and canned maneuvers.
///
/// Serialized as JSON with tag `"mc"`. Maneuver speeds are in [0, 1].
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "mc", rename_all = "snake_case")]
pub enum MotorCommand {
    SetSpeed { motor: MotorId, speed: f64 },
    SetBoth { speed: f64 },
    Forward { speed: f64 },
    Backward { speed: f64 },
    TurnLeft { speed: f64 },
    TurnRight { speed: f64 },
    CurveForwardLeft { speed: f64 },
    CurveForwardRight { speed: f64 },
    CurveBackwardLeft { speed: f64 },
    CurveBackwardRight { speed: f64 },
    /// Brake both motors.
    Stop,
    /// Cut the enable line and let both motors spin freely.
    Coast,
}

/// The two PWM legs of one H-bridge channel.
pub struct PwmPinPair<P> {
    pub positive: P,
    pub negative: P,
}

/// Convert a signed speed into `(positive, negative)` leg duty cycles.
///
/// Complementary drive: one leg always sits at full duty, the other sets the
/// effective speed. Zero brakes (1, 0) rather than coasting. NaN brakes too.
pub fn duty_cycles(speed: f64) -> (f64, f64) {
    let speed = saturate(speed);

    if speed > 0.0 {
        (1.0, 1.0 - speed)
    } else if speed < 0.0 {
        (1.0 + speed, 1.0)
    } else {
        (1.0, 0.0)
    }
}

fn saturate(speed: f64) -> f64 {
    if speed.is_nan() {
        0.0
    } else {
        speed.clamp(-1.0, 1.0)
    }
}

/// Drives the left and right motors through four PWM legs and an enable line.
pub struct MotorDriver<EN, P> {
    enable: EN,
    motors: [PwmPinPair<P>; 2],
    speeds: [f64; 2],
}

impl<EN, P> MotorDriver<EN, P>
where
    EN: OutputPin,
    P: SetDutyCycle,
{
    /// Build a driver over already-opened pins.
    pub fn new(
        enable: EN,
        left: PwmPinPair<P>,
        right: PwmPinPair<P>,
    ) -> Self {
        Self {
            enable,
            motors: [left, right],
            speeds: [0.0; 2],
        }
    }

    /// Open the enable line and the four motor legs on the Trilobot pin map.
    pub fn open<B>(board: &mut B) -> Result<Self>
    where
        B: Board<Output = EN, Pwm = P>,
    {
        let enable = board.output(pins::MOTOR_EN_PIN)?;
        let freq = pins::MOTOR_PWM_FREQUENCY_HZ;

        // The left motor is mounted mirrored, so its legs are swapped.
        let left = PwmPinPair {
            positive: board.pwm(pins::MOTOR_LEFT_N, freq, 0.0)?,
            negative: board.pwm(pins::MOTOR_LEFT_P, freq, 0.0)?,
        };
        let right = PwmPinPair {
            positive: board.pwm(pins::MOTOR_RIGHT_P, freq, 0.0)?,
            negative: board.pwm(pins::MOTOR_RIGHT_N, freq, 0.0)?,
        };

        tracing::info!("Motor driver opened");
        Ok(Self::new(enable, left, right))
    }

    /// Set the speed of one motor, clamped to [-1, 1].
    pub fn set_speed(
        &mut self,
        motor: MotorId,
        speed: f64,
    ) -> Result<()> {
        let speed = saturate(speed);
        let (positive, negative) = duty_cycles(speed);

        self.enable.set_high().map_err(Error::gpio)?;

        let pair = &mut self.motors[motor.index()];
        set_fraction(&mut pair.positive, positive)?;
        set_fraction(&mut pair.negative, negative)?;

        self.speeds[motor.index()] = speed;
        tracing::debug!(?motor, speed, "motor speed set");
        Ok(())
    }

    /// Set both motors to the same speed.
    pub fn set_both(
        &mut self,
        speed: f64,
    ) -> Result<()> {
        self.set_speed(MotorId::Left, speed)?;
        self.set_speed(MotorId::Right, speed)
    }

    /// Drive the enable line low and zero every leg, letting the motors coast.
    ///
    /// Every write is attempted even after one fails; the first error is
    /// returned.
    pub fn disable(&mut self) -> Result<()> {
        let mut result = self.enable.set_low().map_err(Error::gpio);

        for pair in self.motors.iter_mut() {
            result = result.and(set_fraction(&mut pair.positive, 0.0));
            result = result.and(set_fraction(&mut pair.negative, 0.0));
        }
        self.speeds = [0.0; 2];

        match &result {
            Ok(()) => tracing::debug!("motors disabled"),
            Err(e) => tracing::warn!(?e, "motors disabled with errors"),
        }
        result
    }

    /// Last speed applied to `motor` (0 after `disable`).
    pub fn speed(
        &self,
        motor: MotorId,
    ) -> f64 {
        self.speeds[motor.index()]
    }

    pub fn forward(
        &mut self,
        speed: f64,
    ) -> Result<()> {
        self.set_both(speed)
    }

    pub fn backward(
        &mut self,
        speed: f64,
    ) -> Result<()> {
        self.set_both(-speed)
    }

    pub fn turn_left(
        &mut self,
        speed: f64,
    ) -> Result<()> {
        self.set_speed(MotorId::Left, -speed)?;
        self.set_speed(MotorId::Right, speed)
    }

    pub fn turn_right(
        &mut self,
        speed: f64,
    ) -> Result<()> {
        self.set_speed(MotorId::Left, speed)?;
        self.set_speed(MotorId::Right, -speed)
    }

    pub fn curve_forward_left(
        &mut self,
        speed: f64,
    ) -> Result<()> {
        self.set_speed(MotorId::Left, 0.0)?;
        self.set_speed(MotorId::Right, speed)
    }

    pub fn curve_forward_right(
        &mut self,
        speed: f64,
    ) -> Result<()> {
        self.set_speed(MotorId::Left, speed)?;
        self.set_speed(MotorId::Right, 0.0)
    }

    pub fn curve_backward_left(
        &mut self,
        speed: f64,
    ) -> Result<()> {
        self.set_speed(MotorId::Left, 0.0)?;
        self.set_speed(MotorId::Right, -speed)
    }

    pub fn curve_backward_right(
        &mut self,
        speed: f64,
    ) -> Result<()> {
        self.set_speed(MotorId::Left, -speed)?;
        self.set_speed(MotorId::Right, 0.0)
    }

    /// Brake both motors sharply.
    pub fn stop(&mut self) -> Result<()> {
        self.set_both(0.0)
    }

    /// Let both motors spin down freely.
    pub fn coast(&mut self) -> Result<()> {
        self.disable()
    }

    /// Execute a `MotorCommand`.
    pub fn execute(
        &mut self,
        command: MotorCommand,
    ) -> Result<()> {
        match command {
            MotorCommand::SetSpeed { motor, speed } => self.set_speed(motor, speed),
            MotorCommand::SetBoth { speed } => self.set_both(speed),
            MotorCommand::Forward { speed } => self.forward(speed),
            MotorCommand::Backward { speed } => self.backward(speed),
            MotorCommand::TurnLeft { speed } => self.turn_left(speed),
            MotorCommand::TurnRight { speed } => self.turn_right(speed),
            MotorCommand::CurveForwardLeft { speed } => self.curve_forward_left(speed),
            MotorCommand::CurveForwardRight { speed } => self.curve_forward_right(speed),
            MotorCommand::CurveBackwardLeft { speed } => self.curve_backward_left(speed),
            MotorCommand::CurveBackwardRight { speed } => self.curve_backward_right(speed),
            MotorCommand::Stop => self.stop(),
            MotorCommand::Coast => self.coast(),
        }
    }

    /// Run both motors at full speed for `interval`, then coast.
    pub async fn motor_test(
        &mut self,
        interval: Duration,
    ) -> Result<()> {
        self.set_both(1.0)?;
        Timer::after(interval).await;
        self.disable()
    }

    /// Give back the enable line and the left/right leg pairs.
    pub fn release(self) -> (EN, PwmPinPair<P>, PwmPinPair<P>) {
        let [left, right] = self.motors;
        (self.enable, left, right)
    }
}
