//! Underlighting for the Trilobot: six RGB LEDs on one SN3218.
//!
//! The driver keeps an 18-slot frame of 0..=255 values. Setting a light only
//! touches its three slots; showing gamma-corrects the whole frame and pushes
//! it to the chip. Commands arrive as `LightCommand` values (tag `"lc"`).

use embassy_time::{Duration, Timer};
use embedded_hal::i2c::I2c;
use serde::{Deserialize, Serialize};

use super::sn3218::{Sn3218, ALL_CHANNELS, CHANNEL_COUNT};
use crate::utils::{
    board::Board,
    error::{Component, InvalidInput, Result},
    math::color::{hsv_to_rgb, normalize},
    pins,
};

/// Physical position of each underlight; the discriminant selects its
/// channel triplet `id * 3 .. id * 3 + 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightId {
    FrontRight = 0,
    FrontLeft = 1,
    MiddleLeft = 2,
    RearLeft = 3,
    RearRight = 4,
    MiddleRight = 5,
}

impl LightId {
    pub const ALL: [LightId; 6] = [
        LightId::FrontRight,
        LightId::FrontLeft,
        LightId::MiddleLeft,
        LightId::RearLeft,
        LightId::RearRight,
        LightId::MiddleRight,
    ];

    /// Index of this light's red channel.
    pub fn first_channel(self) -> usize {
        self as usize * 3
    }
}

pub const LIGHTS_LEFT: [LightId; 3] = [LightId::FrontLeft, LightId::MiddleLeft, LightId::RearLeft];
pub const LIGHTS_RIGHT: [LightId; 3] = [LightId::FrontRight, LightId::MiddleRight, LightId::RearRight];
pub const LIGHTS_FRONT: [LightId; 2] = [LightId::FrontRight, LightId::FrontLeft];
pub const LIGHTS_MIDDLE: [LightId; 2] = [LightId::MiddleRight, LightId::MiddleLeft];
pub const LIGHTS_REAR: [LightId; 2] = [LightId::RearRight, LightId::RearLeft];
pub const LIGHTS_LEFT_DIAGONAL: [LightId; 2] = [LightId::FrontLeft, LightId::RearRight];
pub const LIGHTS_RIGHT_DIAGONAL: [LightId; 2] = [LightId::FrontRight, LightId::RearLeft];

/// Underlight command variants.
///
/// Serialized as JSON with tag `"lc"`. Every variant shows immediately.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "lc", rename_all = "snake_case")]
pub enum LightCommand {
    Set { light: LightId, r: i32, g: i32, b: i32 },
    SetHsv { light: LightId, h: f64, s: f64, v: f64 },
    Fill { r: i32, g: i32, b: i32 },
    Clear { light: LightId },
    ClearAll,
    /// Re-show the cached frame.
    Show,
    /// Turn output off, keeping the frame.
    Off,
}

/// Six RGB underlights driven through an SN3218.
pub struct UnderlightDriver<I2C> {
    chip: Sn3218<I2C>,
    frame: [u8; CHANNEL_COUNT],
}

impl<I2C> UnderlightDriver<I2C>
where
    I2C: I2c,
{
    /// Reset the chip, load a dark frame, enable all channels and leave the
    /// output disabled.
    pub fn new(i2c: I2C) -> Result<Self> {
        let mut driver = Self {
            chip: Sn3218::new(i2c),
            frame: [0; CHANNEL_COUNT],
        };

        driver.chip.reset()?;
        driver.push_frame()?;
        driver.chip.enable_leds(ALL_CHANNELS)?;
        driver.chip.disable()?;

        tracing::info!("Underlight driver initialised");
        Ok(driver)
    }

    /// Open the Trilobot's I2C bus and initialise the underlights on it.
    pub fn open<B>(board: &mut B) -> Result<Self>
    where
        B: Board<I2c = I2C>,
    {
        let i2c = board.i2c(pins::I2C_BUS)?;
        Self::new(i2c)
    }

    /// Current frame, three bytes per light.
    pub fn frame(&self) -> &[u8; CHANNEL_COUNT] {
        &self.frame
    }

    /// Colour stored for `light`.
    pub fn color(
        &self,
        light: LightId,
    ) -> (u8, u8, u8) {
        let i = light.first_channel();
        (self.frame[i], self.frame[i + 1], self.frame[i + 2])
    }

    fn push_frame(&mut self) -> Result<()> {
        let mut values = [0.0f64; CHANNEL_COUNT];
        for (value, &byte) in values.iter_mut().zip(self.frame.iter()) {
            *value = normalize(byte);
        }
        self.chip.output(&values)
    }

    /// Output the stored frame and enable the chip.
    pub fn show_underlight(&mut self) -> Result<()> {
        self.push_frame()?;
        self.chip.enable()
    }

    /// Turn the underlights off, keeping the stored colours.
    pub fn disable_underlight(&mut self) -> Result<()> {
        self.chip.disable()
    }

    /// Set one light to an RGB colour. Each component must be in 0..=255;
    /// on error the frame is left untouched.
    pub fn set_underlight(
        &mut self,
        light: LightId,
        r: i32,
        g: i32,
        b: i32,
        show: bool,
    ) -> Result<()> {
        let rgb = validate_rgb(r, g, b)?;
        self.store(light, rgb);

        if show {
            self.show_underlight()?;
        }
        Ok(())
    }

    /// Set a group of lights to one colour with a single show.
    pub fn set_underlights(
        &mut self,
        lights: &[LightId],
        r: i32,
        g: i32,
        b: i32,
        show: bool,
    ) -> Result<()> {
        let rgb = validate_rgb(r, g, b)?;
        for &light in lights {
            self.store(light, rgb);
        }

        if show {
            self.show_underlight()?;
        }
        Ok(())
    }

    /// Set all six lights to one colour with a single show.
    pub fn fill_underlight(
        &mut self,
        r: i32,
        g: i32,
        b: i32,
        show: bool,
    ) -> Result<()> {
        self.set_underlights(&LightId::ALL, r, g, b, show)
    }

    pub fn clear_underlight(
        &mut self,
        light: LightId,
        show: bool,
    ) -> Result<()> {
        self.set_underlight(light, 0, 0, 0, show)
    }

    pub fn clear_all_underlight(
        &mut self,
        show: bool,
    ) -> Result<()> {
        self.fill_underlight(0, 0, 0, show)
    }

    fn store(
        &mut self,
        light: LightId,
        (r, g, b): (u8, u8, u8),
    ) {
        let i = light.first_channel();
        self.frame[i] = r;
        self.frame[i + 1] = g;
        self.frame[i + 2] = b;
    }

    /// Execute a `LightCommand`.
    pub fn execute(
        &mut self,
        command: LightCommand,
    ) -> Result<()> {
        match command {
            LightCommand::Set { light, r, g, b } => self.set_underlight(light, r, g, b, true),
            LightCommand::SetHsv { light, h, s, v } => {
                let c = hsv_to_rgb(h, s, v);
                self.set_underlight(light, c.r.into(), c.g.into(), c.b.into(), true)
            }
            LightCommand::Fill { r, g, b } => self.fill_underlight(r, g, b, true),
            LightCommand::Clear { light } => self.clear_underlight(light, true),
            LightCommand::ClearAll => self.clear_all_underlight(true),
            LightCommand::Show => self.show_underlight(),
            LightCommand::Off => self.disable_underlight(),
        }
    }

    /// Light everything mid-grey for `interval`, then clear.
    pub async fn test_underlight(
        &mut self,
        interval: Duration,
    ) -> Result<()> {
        self.fill_underlight(127, 127, 127, true)?;
        Timer::after(interval).await;
        self.clear_all_underlight(true)
    }

    /// Clear every light and disable output. Both steps are attempted; the
    /// first failure is returned.
    pub fn shutdown(&mut self) -> Result<()> {
        let cleared = self.clear_all_underlight(true);
        let disabled = self.chip.disable();
        cleared.and(disabled)
    }

    /// Give back the I2C handle.
    pub fn release(self) -> I2C {
        self.chip.release()
    }
}

fn validate_rgb(
    r: i32,
    g: i32,
    b: i32,
) -> Result<(u8, u8, u8)> {
    Ok((
        component(Component::Red, r)?,
        component(Component::Green, g)?,
        component(Component::Blue, b)?,
    ))
}

fn component(
    component: Component,
    value: i32,
) -> Result<u8> {
    u8::try_from(value).map_err(|_| InvalidInput::ColorComponent { component, value }.into())
}
