//! Colour helpers for the underlights.
//!
//! `hsv_to_rgb` is a pure pre-step for the RGB setters; `gamma_encode` maps a
//! linear intensity in [0, 1] onto the SN3218's PWM byte.
//!
//! # Example
//! ```rust
//! use trilobot_core::utils::math::color::{gamma_encode, hsv_to_rgb};
//! let red = hsv_to_rgb(0.0, 1.0, 1.0);
//! assert_eq!((red.r, red.g, red.b), (255, 0, 0));
//! assert_eq!(gamma_encode(1.0), 255);
//! ```

use libm;
use smart_leds_trait::RGB8;

/// Convert hue (degrees, wrapped into [0, 360)), saturation and value (both
/// clamped to [0, 1]) into an 8-bit RGB triple.
pub fn hsv_to_rgb(
    hue: f64,
    saturation: f64,
    value: f64,
) -> RGB8 {
    let mut h = libm::fmod(hue, 360.0);
    if h < 0.0 {
        h += 360.0;
    }
    let s = saturation.clamp(0.0, 1.0);
    let v = value.clamp(0.0, 1.0);

    let chroma = v * s;
    let sector = h / 60.0;
    let x = chroma * (1.0 - libm::fabs(libm::fmod(sector, 2.0) - 1.0));
    let m = v - chroma;

    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };

    RGB8 {
        r: to_byte(r + m),
        g: to_byte(g + m),
        b: to_byte(b + m),
    }
}

/// Gamma-correct a linear intensity: `round(256^value) - 1`.
///
/// 0.0 encodes to 0 and 1.0 to 255. Values outside [0, 1] saturate.
pub fn gamma_encode(value: f64) -> u8 {
    let v = value.clamp(0.0, 1.0);
    (libm::round(libm::pow(256.0, v)) - 1.0) as u8
}

/// Map a 0..=255 channel byte onto [0, 1].
pub fn normalize(byte: u8) -> f64 {
    byte as f64 / 255.0
}

fn to_byte(unit: f64) -> u8 {
    libm::round(unit.clamp(0.0, 1.0) * 255.0) as u8
}
