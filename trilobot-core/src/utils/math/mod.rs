//! Math Utilities
//!
//! - `color`: HSV conversion and SN3218 gamma encoding

pub mod color;
