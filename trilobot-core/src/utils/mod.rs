//! Utility re-exports for the Trilobot.
//!
//! - `controllers`: motor, button, underlight and ultrasound drivers plus the
//!   `Robot` facade that owns them
//! - `math`: colour conversion and gamma correction
//! - `board`: the `Board` trait used to open pins and buses by number
//! - `pins`: the fixed Trilobot pin map

pub mod board;
pub mod cancel;
pub mod config;
pub mod controllers;
pub mod error;
pub mod math;
pub mod pins;

pub use board::Board;
pub use cancel::CancelToken;
pub use config::RobotConfig;
pub use controllers::{parse_command, Robot, RobotCommand};
pub use embassy_time::{Duration, Instant, Timer};
pub use error::{Error, InvalidInput, TeardownError};
