//! Core drivers for the Trilobot wheeled robot on embedded-hal platforms.
//!
//! The crate is `no_std` + `alloc`; enable the `std` feature on a
//! single-board-computer host to pull in the std time driver.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod utils;
