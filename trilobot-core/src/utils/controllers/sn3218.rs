//! SN3218 18-channel constant-current LED driver, spoken to over I2C.
//!
//! Every command is a single register byte followed by data. The chip gives
//! no acknowledgement beyond the bus ACK, so a write that did not fail counts
//! as success. PWM values only take effect after an update latch.

use embedded_hal::i2c::I2c;

use crate::utils::{
    error::{Error, InvalidInput, Result},
    math::color::gamma_encode,
};

/// Fixed I2C address of the SN3218.
pub const I2C_ADDRESS: u8 = 0x54;
/// Number of PWM channels on the chip.
pub const CHANNEL_COUNT: usize = 18;
/// Mask enabling all 18 channels.
pub const ALL_CHANNELS: u32 = 0x3_FFFF;

const CMD_ENABLE_OUTPUT: u8 = 0x00;
const CMD_SET_PWM_VALUES: u8 = 0x01;
const CMD_ENABLE_LEDS: u8 = 0x13;
const CMD_UPDATE: u8 = 0x16;
const CMD_RESET: u8 = 0x17;

/// Protocol encoder for one SN3218 on an I2C bus.
pub struct Sn3218<I2C> {
    i2c: I2C,
}

impl<I2C> Sn3218<I2C>
where
    I2C: I2c,
{
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    fn write(
        &mut self,
        bytes: &[u8],
    ) -> Result<()> {
        self.i2c.write(I2C_ADDRESS, bytes).map_err(Error::i2c)
    }

    /// Turn the current outputs on.
    pub fn enable(&mut self) -> Result<()> {
        self.write(&[CMD_ENABLE_OUTPUT, 0x01])
    }

    /// Turn the outputs off; PWM registers keep their values.
    pub fn disable(&mut self) -> Result<()> {
        self.write(&[CMD_ENABLE_OUTPUT, 0x00])
    }

    /// Reset every internal register.
    pub fn reset(&mut self) -> Result<()> {
        self.write(&[CMD_RESET, 0xFF])
    }

    /// Latch the previously written PWM values and channel mask.
    pub fn update(&mut self) -> Result<()> {
        self.write(&[CMD_UPDATE, 0xFF])
    }

    /// Enable or disable each channel from the low 18 bits of `mask`
    /// (1 = on), six bits per data byte, then latch.
    pub fn enable_leds(
        &mut self,
        mask: u32,
    ) -> Result<()> {
        self.write(&[
            CMD_ENABLE_LEDS,
            (mask & 0x3F) as u8,
            ((mask >> 6) & 0x3F) as u8,
            ((mask >> 12) & 0x3F) as u8,
        ])?;
        self.update()
    }

    /// Gamma-correct 18 intensities in [0, 1] and output them.
    pub fn output(
        &mut self,
        values: &[f64],
    ) -> Result<()> {
        check_len(values.len())?;

        let mut buffer = [0u8; CHANNEL_COUNT];
        for (byte, &value) in buffer.iter_mut().zip(values) {
            *byte = gamma_encode(value);
        }
        self.output_raw(&buffer)
    }

    /// Output 18 PWM bytes as-is, bypassing gamma correction.
    pub fn output_raw(
        &mut self,
        values: &[u8],
    ) -> Result<()> {
        check_len(values.len())?;

        let mut frame = [0u8; CHANNEL_COUNT + 1];
        frame[0] = CMD_SET_PWM_VALUES;
        frame[1..].copy_from_slice(values);
        self.write(&frame)?;
        self.update()
    }

    /// Give back the I2C handle.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

fn check_len(actual: usize) -> Result<()> {
    if actual == CHANNEL_COUNT {
        Ok(())
    } else {
        Err(InvalidInput::ChannelCount {
            expected: CHANNEL_COUNT,
            actual,
        }
        .into())
    }
}
