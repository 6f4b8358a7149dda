mod common;

use common::{underlight_init, SimBoard, PWM_MAX};
use embedded_hal_mock::eh1::i2c::Mock as I2cMock;
use proptest::prelude::*;
use trilobot_core::utils::{
    controllers::{
        motors::{duty_cycles, MotorDriver, MotorId},
        underlight::{LightId, UnderlightDriver},
    },
    math::color::{gamma_encode, hsv_to_rgb, normalize},
    pins, Error,
};

fn light() -> impl Strategy<Value = LightId> {
    prop::sample::select(LightId::ALL.to_vec())
}

proptest! {
    #[test]
    fn motor_speed_clamps_silently(speed in -100.0f64..100.0) {
        let mut board = SimBoard::new();
        let mut motors = MotorDriver::open(&mut board).unwrap();

        prop_assert!(motors.set_speed(MotorId::Right, speed).is_ok());
        let applied = motors.speed(MotorId::Right);
        prop_assert!((-1.0..=1.0).contains(&applied));
        if (-1.0..=1.0).contains(&speed) {
            prop_assert_eq!(applied, speed);
        }

        let (p, n) = duty_cycles(applied);
        let expect = |f: f64| (f * PWM_MAX as f64).round() / PWM_MAX as f64;
        prop_assert_eq!(board.pwm_fraction(pins::MOTOR_RIGHT_P), expect(p));
        prop_assert_eq!(board.pwm_fraction(pins::MOTOR_RIGHT_N), expect(n));
    }

    #[test]
    fn one_leg_always_full(speed in -1.0f64..=1.0) {
        let (p, n) = duty_cycles(speed);
        prop_assert!(p == 1.0 || n == 1.0);
        prop_assert!((0.0..=1.0).contains(&p) && (0.0..=1.0).contains(&n));
    }

    #[test]
    fn gamma_is_monotonic(a in 0u8..=255, b in 0u8..=255) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(gamma_encode(normalize(lo)) <= gamma_encode(normalize(hi)));
    }

    #[test]
    fn hsv_value_bounds_channels(h in -720.0f64..720.0, s in 0.0f64..=1.0, v in 0.0f64..=1.0) {
        let c = hsv_to_rgb(h, s, v);
        let top = (v * 255.0).round() as u8;
        prop_assert_eq!(c.r.max(c.g).max(c.b), top);
    }

    #[test]
    fn out_of_range_rgb_is_rejected(
        light in light(),
        r in -300i32..600,
        g in -300i32..600,
        b in -300i32..600,
    ) {
        let mut lights = UnderlightDriver::new(I2cMock::new(&underlight_init())).unwrap();
        lights.set_underlight(LightId::FrontRight, 1, 2, 3, false).unwrap();
        let before = *lights.frame();

        let result = lights.set_underlight(light, r, g, b, false);
        let valid = [r, g, b].iter().all(|c| (0..=255).contains(c));

        if valid {
            prop_assert!(result.is_ok());
            prop_assert_eq!(lights.color(light), (r as u8, g as u8, b as u8));
        } else {
            prop_assert!(matches!(result, Err(Error::InvalidInput(_))));
            prop_assert_eq!(lights.frame(), &before);
        }
        lights.release().done();
    }
}
