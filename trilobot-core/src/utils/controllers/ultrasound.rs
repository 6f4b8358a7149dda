//! HC-SR04 style ultrasonic ranging.
//!
//! One sample is a short trigger pulse followed by an echo pulse whose width
//! is the round-trip time of flight. A reading averages the samples that
//! completed; samples whose edges never arrive are dropped, not zero-filled.

use core::future::Future;

use embassy_futures::select::{select, Either};
use embassy_time::{with_timeout, Duration, Instant, Timer};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::digital::Wait;

use crate::utils::{
    board::Board,
    cancel::CancelToken,
    config::UltrasoundConfig,
    error::{Error, InvalidInput, Result},
    pins,
};

/// Speed of sound in air at roughly 20 °C.
pub const SPEED_OF_SOUND_CM_PER_MS: f64 = 34.3;

/// Sample count used by callers that have no better idea.
pub const DEFAULT_SAMPLES: usize = 3;

/// Convert the summed time of flight of `count` samples into an average
/// one-way distance in centimetres. `None` when nothing completed.
pub fn distance_cm(
    total: Duration,
    count: usize,
) -> Option<f64> {
    if count == 0 {
        return None;
    }
    let total_ms = total.as_micros() as f64 / 1000.0;
    Some(total_ms * SPEED_OF_SOUND_CM_PER_MS / (2 * count) as f64)
}

/// `timeout` from now, saturating at the end of time.
fn deadline_after(timeout: Duration) -> Instant {
    Instant::now().checked_add(timeout).unwrap_or(Instant::MAX)
}

async fn or_cancel<F: Future>(
    cancel: &CancelToken,
    fut: F,
) -> Result<F::Output> {
    match select(cancel.cancelled(), fut).await {
        Either::First(()) => Err(Error::Cancelled),
        Either::Second(output) => Ok(output),
    }
}

/// Trigger/echo ultrasonic distance sensor.
pub struct UltrasoundSensor<T, E> {
    trigger: T,
    echo: E,
    config: UltrasoundConfig,
}

impl<T, E> UltrasoundSensor<T, E>
where
    T: OutputPin,
    E: Wait,
{
    pub fn new(
        trigger: T,
        echo: E,
        config: UltrasoundConfig,
    ) -> Self {
        Self {
            trigger,
            echo,
            config,
        }
    }

    /// Open the trigger and echo lines on the Trilobot pin map.
    pub fn open<B>(
        board: &mut B,
        config: UltrasoundConfig,
    ) -> Result<Self>
    where
        B: Board<Output = T, Input = E>,
    {
        let mut trigger = board.output(pins::ULTRA_TRIG_PIN)?;
        trigger.set_low().map_err(Error::gpio)?;
        let echo = board.input(pins::ULTRA_ECHO_PIN)?;

        tracing::info!(?config, "Ultrasound sensor opened");
        Ok(Self::new(trigger, echo, config))
    }

    pub fn config(&self) -> &UltrasoundConfig {
        &self.config
    }

    /// Average distance in centimetres over up to `samples` pings.
    ///
    /// Stops early once the read timeout has passed. Fails with
    /// `SensorTimeout` if no sample completed and with `Cancelled` as soon as
    /// `cancel` fires.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn read_distance(
        &mut self,
        samples: usize,
        cancel: &CancelToken,
    ) -> Result<f64> {
        if samples == 0 {
            return Err(InvalidInput::ZeroSamples.into());
        }

        let read_deadline = deadline_after(self.config.read_timeout());
        let mut total = Duration::from_ticks(0);
        let mut completed = 0;

        for n in 0..samples {
            if n > 0 {
                or_cancel(cancel, Timer::after(self.config.sample_interval())).await?;
            }
            if Instant::now() >= read_deadline {
                tracing::warn!(taken = n, "read timeout reached");
                break;
            }

            match self.sample(cancel, read_deadline).await? {
                Some(elapsed) => {
                    tracing::debug!(elapsed_us = elapsed.as_micros(), "echo measured");
                    total += elapsed;
                    completed += 1;
                }
                None => tracing::warn!(sample = n, "echo timed out, sample discarded"),
            }
        }

        let distance = distance_cm(total, completed).ok_or(Error::SensorTimeout)?;
        tracing::debug!(distance, completed, "distance read");
        Ok(distance)
    }

    /// One ping. `Ok(None)` when an echo edge did not arrive in time.
    async fn sample(
        &mut self,
        cancel: &CancelToken,
        read_deadline: Instant,
    ) -> Result<Option<Duration>> {
        self.trigger.set_high().map_err(Error::gpio)?;
        let pulse = or_cancel(cancel, Timer::after(self.config.trigger_pulse())).await;
        self.trigger.set_low().map_err(Error::gpio)?;
        pulse?;

        let deadline = read_deadline.min(deadline_after(self.config.sample_timeout()));

        let remaining = deadline.saturating_duration_since(Instant::now());
        match or_cancel(cancel, with_timeout(remaining, self.echo.wait_for_rising_edge())).await? {
            Ok(edge) => edge.map_err(Error::gpio)?,
            Err(_) => return Ok(None),
        }
        let start = Instant::now();

        let remaining = deadline.saturating_duration_since(start);
        match or_cancel(cancel, with_timeout(remaining, self.echo.wait_for_falling_edge())).await? {
            Ok(edge) => edge.map_err(Error::gpio)?,
            Err(_) => return Ok(None),
        }
        let elapsed = Instant::now().saturating_duration_since(start);

        Ok(Some(
            elapsed
                .checked_sub(self.config.offset())
                .unwrap_or(Duration::from_ticks(0)),
        ))
    }

    /// Leave the trigger line low.
    pub fn shutdown(&mut self) -> Result<()> {
        self.trigger.set_low().map_err(Error::gpio)
    }

    /// Give back the trigger and echo lines.
    pub fn release(self) -> (T, E) {
        (self.trigger, self.echo)
    }
}
