//! Trilobot pin map (BCM numbering).
//!
//! These numbers are fixed by the board layout; the controllers open exactly
//! these lines through [`Board`](super::Board).

// User buttons, active low with pull-ups.
pub const BUTTON_A_PIN: u8 = 5;
pub const BUTTON_B_PIN: u8 = 6;
pub const BUTTON_X_PIN: u8 = 16;
pub const BUTTON_Y_PIN: u8 = 24;

// Onboard LEDs next to each button.
pub const LED_A_PIN: u8 = 23;
pub const LED_B_PIN: u8 = 22;
pub const LED_X_PIN: u8 = 17;
pub const LED_Y_PIN: u8 = 27;

// DRV8833 dual H-bridge.
pub const MOTOR_EN_PIN: u8 = 26;
pub const MOTOR_LEFT_P: u8 = 8;
pub const MOTOR_LEFT_N: u8 = 11;
pub const MOTOR_RIGHT_P: u8 = 10;
pub const MOTOR_RIGHT_N: u8 = 9;

// HC-SR04 ultrasound.
pub const ULTRA_TRIG_PIN: u8 = 13;
pub const ULTRA_ECHO_PIN: u8 = 25;

/// I2C bus the SN3218 underlight driver sits on.
pub const I2C_BUS: u8 = 1;

/// Software PWM frequency for the motor legs.
pub const MOTOR_PWM_FREQUENCY_HZ: f64 = 100.0;
/// Software PWM frequency for the button LEDs.
pub const LED_PWM_FREQUENCY_HZ: f64 = 2000.0;
