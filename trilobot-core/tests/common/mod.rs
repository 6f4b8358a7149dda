//! Simulated leaves shared by the integration tests.
#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet, VecDeque},
    convert::Infallible,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use embassy_time::{Duration, Instant, Timer};
use embedded_hal::{
    digital::{self, ErrorKind, InputPin, OutputPin},
    pwm::{self, SetDutyCycle},
};
use embedded_hal_async::digital::Wait;
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};
use tracing_subscriber::EnvFilter;
use trilobot_core::utils::{error, Board, Error};

pub const PWM_MAX: u16 = 10_000;
pub const SN3218: u8 = 0x54;

/// Install a test-friendly subscriber once; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Create a write transaction for the SN3218.
pub fn write(data: Vec<u8>) -> I2cTrans {
    I2cTrans::write(SN3218, data)
}

/// PWM value block (register 0x01) followed by the update latch.
pub fn frame_writes(values: [u8; 18]) -> [I2cTrans; 2] {
    let mut bytes = vec![0x01];
    bytes.extend_from_slice(&values);
    [write(bytes), write(vec![0x16, 0xFF])]
}

/// Transactions issued by `UnderlightDriver::new`.
pub fn underlight_init() -> Vec<I2cTrans> {
    let mut t = vec![write(vec![0x17, 0xFF])];
    t.extend(frame_writes([0; 18]));
    t.push(write(vec![0x13, 0x3F, 0x3F, 0x3F]));
    t.push(write(vec![0x16, 0xFF]));
    t.push(write(vec![0x00, 0x00]));
    t
}

/// Transactions issued by `UnderlightDriver::shutdown` from any frame.
pub fn underlight_shutdown() -> Vec<I2cTrans> {
    let mut t = frame_writes([0; 18]).to_vec();
    t.push(write(vec![0x00, 0x01]));
    t.push(write(vec![0x00, 0x00]));
    t
}

/// PWM channel that remembers its last duty cycle and can be made to fail.
#[derive(Clone, Default)]
pub struct FakePwm {
    duty: Arc<Mutex<u16>>,
    broken: Arc<AtomicBool>,
}

impl FakePwm {
    pub fn duty(&self) -> u16 {
        *self.duty.lock().unwrap()
    }

    pub fn fraction(&self) -> f64 {
        self.duty() as f64 / PWM_MAX as f64
    }

    pub fn break_channel(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }
}

impl pwm::ErrorType for FakePwm {
    type Error = pwm::ErrorKind;
}

impl SetDutyCycle for FakePwm {
    fn max_duty_cycle(&self) -> u16 {
        PWM_MAX
    }

    fn set_duty_cycle(
        &mut self,
        duty: u16,
    ) -> Result<(), Self::Error> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(pwm::ErrorKind::Other);
        }
        *self.duty.lock().unwrap() = duty;
        Ok(())
    }
}

/// Output line that records every level written and can be made to fail.
#[derive(Clone, Default)]
pub struct FakeOutput {
    levels: Arc<Mutex<Vec<bool>>>,
    broken: Arc<AtomicBool>,
}

impl FakeOutput {
    pub fn levels(&self) -> Vec<bool> {
        self.levels.lock().unwrap().clone()
    }

    pub fn is_high(&self) -> bool {
        self.levels().last().copied().unwrap_or(false)
    }

    pub fn break_line(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    fn push(
        &mut self,
        level: bool,
    ) -> Result<(), ErrorKind> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(ErrorKind::Other);
        }
        self.levels.lock().unwrap().push(level);
        Ok(())
    }
}

impl digital::ErrorType for FakeOutput {
    type Error = ErrorKind;
}

impl OutputPin for FakeOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.push(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.push(true)
    }
}

/// Press the (active-low) button at `ms` after the script start.
pub fn press(ms: u64) -> (u64, bool) {
    (ms, true)
}

/// Release the button at `ms` after the script start.
pub fn release(ms: u64) -> (u64, bool) {
    (ms, false)
}

/// Input line that changes level at fixed offsets from a start instant.
///
/// `is_low` reports the scripted level at the current time. Edges are
/// delivered in order like a kernel event queue: an edge whose time has
/// passed fires immediately, and an edge is only consumed once delivered, so
/// dropping a pending wait loses nothing.
pub struct ScriptedInput {
    start: Instant,
    script: Vec<(u64, bool)>,
    next: usize,
    edge_low: bool,
}

impl ScriptedInput {
    /// A released button that never changes.
    pub fn idle() -> Self {
        Self::new(Instant::now(), &[])
    }

    pub fn new(
        start: Instant,
        script: &[(u64, bool)],
    ) -> Self {
        Self {
            start,
            script: script.to_vec(),
            next: 0,
            edge_low: false,
        }
    }

    fn low_now(&self) -> bool {
        let now = Instant::now();
        self.script
            .iter()
            .take_while(|(at, _)| self.start + Duration::from_millis(*at) <= now)
            .last()
            .map_or(false, |&(_, low)| low)
    }

    /// Wait for the next level change; returns the new level (true = low).
    async fn next_edge(&mut self) -> bool {
        loop {
            let Some(&(at, low)) = self.script.get(self.next) else {
                return core::future::pending().await;
            };
            Timer::at(self.start + Duration::from_millis(at)).await;
            self.next += 1;
            if low != self.edge_low {
                self.edge_low = low;
                return low;
            }
        }
    }
}

impl digital::ErrorType for ScriptedInput {
    type Error = Infallible;
}

impl InputPin for ScriptedInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.low_now())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.low_now())
    }
}

impl Wait for ScriptedInput {
    async fn wait_for_high(&mut self) -> Result<(), Self::Error> {
        if self.low_now() {
            while self.next_edge().await {}
        }
        Ok(())
    }

    async fn wait_for_low(&mut self) -> Result<(), Self::Error> {
        if !self.low_now() {
            while !self.next_edge().await {}
        }
        Ok(())
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), Self::Error> {
        while self.next_edge().await {}
        Ok(())
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), Self::Error> {
        while !self.next_edge().await {}
        Ok(())
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), Self::Error> {
        self.next_edge().await;
        Ok(())
    }
}

/// Echo line answering each trigger with a pulse of the scripted width.
/// `None` entries never answer, so that sample times out.
pub struct EchoPin {
    rise_delay: Duration,
    pulses: VecDeque<Option<Duration>>,
    width: Option<Duration>,
}

impl EchoPin {
    pub fn new(
        rise_delay: Duration,
        pulses: &[Option<Duration>],
    ) -> Self {
        Self {
            rise_delay,
            pulses: pulses.iter().copied().collect(),
            width: None,
        }
    }

    /// Pulses not yet consumed by a trigger.
    pub fn remaining(&self) -> usize {
        self.pulses.len()
    }
}

impl digital::ErrorType for EchoPin {
    type Error = Infallible;
}

impl Wait for EchoPin {
    async fn wait_for_high(&mut self) -> Result<(), Self::Error> {
        self.wait_for_rising_edge().await
    }

    async fn wait_for_low(&mut self) -> Result<(), Self::Error> {
        self.wait_for_falling_edge().await
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), Self::Error> {
        match self.pulses.front().copied() {
            Some(Some(width)) => {
                Timer::after(self.rise_delay).await;
                self.pulses.pop_front();
                self.width = Some(width);
                Ok(())
            }
            Some(None) => {
                self.pulses.pop_front();
                core::future::pending().await
            }
            None => core::future::pending().await,
        }
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), Self::Error> {
        match self.width.take() {
            Some(width) => {
                Timer::after(width).await;
                Ok(())
            }
            None => core::future::pending().await,
        }
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), Self::Error> {
        if self.width.is_some() {
            self.wait_for_falling_edge().await
        } else {
            self.wait_for_rising_edge().await
        }
    }
}

/// A board where every pin is simulated and the I2C bus, if any, is an
/// `embedded-hal-mock` shared with the test.
pub struct SimBoard {
    claimed: HashSet<u8>,
    outputs: HashMap<u8, FakeOutput>,
    pwms: HashMap<u8, (FakePwm, f64)>,
    scripts: HashMap<u8, ScriptedInput>,
    pull_ups: HashSet<u8>,
    i2c: Option<I2cMock>,
    i2c_handle: Option<I2cMock>,
}

impl SimBoard {
    /// A board without an I2C bus.
    pub fn new() -> Self {
        Self {
            claimed: HashSet::new(),
            outputs: HashMap::new(),
            pwms: HashMap::new(),
            scripts: HashMap::new(),
            pull_ups: HashSet::new(),
            i2c: None,
            i2c_handle: None,
        }
    }

    /// A board whose bus 1 expects exactly `expectations`.
    pub fn with_i2c(expectations: &[I2cTrans]) -> Self {
        let mock = I2cMock::new(expectations);
        Self {
            i2c: Some(mock.clone()),
            i2c_handle: Some(mock),
            ..Self::new()
        }
    }

    /// Assert every expected I2C transaction happened.
    pub fn i2c_done(&mut self) {
        if let Some(mock) = self.i2c_handle.as_mut() {
            mock.done();
        }
    }

    /// Script the input on `pin`; unscripted inputs stay idle.
    pub fn with_input(
        mut self,
        pin: u8,
        input: ScriptedInput,
    ) -> Self {
        self.scripts.insert(pin, input);
        self
    }

    pub fn output_pin(
        &self,
        pin: u8,
    ) -> &FakeOutput {
        &self.outputs[&pin]
    }

    pub fn pwm_fraction(
        &self,
        pin: u8,
    ) -> f64 {
        self.pwms[&pin].0.fraction()
    }

    pub fn pwm_frequency(
        &self,
        pin: u8,
    ) -> f64 {
        self.pwms[&pin].1
    }

    pub fn has_pull_up(
        &self,
        pin: u8,
    ) -> bool {
        self.pull_ups.contains(&pin)
    }

    pub fn claimed(&self) -> &HashSet<u8> {
        &self.claimed
    }

    fn claim(
        &mut self,
        pin: u8,
    ) -> error::Result<()> {
        if self.claimed.insert(pin) {
            Ok(())
        } else {
            Err(Error::PinUnavailable(pin))
        }
    }

    fn scripted(
        &mut self,
        pin: u8,
    ) -> ScriptedInput {
        self.scripts.remove(&pin).unwrap_or_else(ScriptedInput::idle)
    }
}

impl Board for SimBoard {
    type Output = FakeOutput;
    type Input = ScriptedInput;
    type Pwm = FakePwm;
    type I2c = I2cMock;

    fn output(
        &mut self,
        pin: u8,
    ) -> error::Result<FakeOutput> {
        self.claim(pin)?;
        let line = FakeOutput::default();
        self.outputs.insert(pin, line.clone());
        Ok(line)
    }

    fn input(
        &mut self,
        pin: u8,
    ) -> error::Result<ScriptedInput> {
        self.claim(pin)?;
        Ok(self.scripted(pin))
    }

    fn input_pull_up(
        &mut self,
        pin: u8,
    ) -> error::Result<ScriptedInput> {
        self.claim(pin)?;
        self.pull_ups.insert(pin);
        Ok(self.scripted(pin))
    }

    fn pwm(
        &mut self,
        pin: u8,
        frequency_hz: f64,
        duty: f64,
    ) -> error::Result<FakePwm> {
        self.claim(pin)?;
        let mut channel = FakePwm::default();
        let _ = channel.set_duty_cycle((duty.clamp(0.0, 1.0) * PWM_MAX as f64).round() as u16);
        self.pwms.insert(pin, (channel.clone(), frequency_hz));
        Ok(channel)
    }

    fn i2c(
        &mut self,
        bus: u8,
    ) -> error::Result<I2cMock> {
        match (bus, self.i2c.take()) {
            (1, Some(i2c)) => Ok(i2c),
            _ => Err(Error::BusUnavailable(bus)),
        }
    }
}
