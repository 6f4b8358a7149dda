//! User buttons A/B/X/Y with press, double-press and hold detection.
//!
//! ## Hardware
//!
//! Active-low momentary switches with pull-ups, each paired with a PWM-driven
//! LED. A watcher task per button awaits edges on the input line, lets the
//! contact settle for the debounce time, samples the level and feeds it to
//! that button's `ButtonState`.
//!
//! ## Gestures
//!
//! | Gesture      | Condition                                        | Event           |
//! |--------------|--------------------------------------------------|-----------------|
//! | Press        | every debounced falling edge                     | `Pressed`       |
//! | Double press | a press within the window of the previous press  | `DoublePressed` |
//! | Hold         | line stays asserted for the hold duration        | `HoldStarted`   |
//!
//! The second press of a double press raises both `Pressed` and
//! `DoublePressed`; the pair is then consumed, so a third quick press starts
//! a new pair.

use alloc::{sync::Arc, vec::Vec};
use core::{
    cell::RefCell,
    sync::atomic::{AtomicBool, Ordering},
};

use embassy_futures::select::{select, select4, Either, Either4};
use embassy_sync::{
    blocking_mutex::{raw::CriticalSectionRawMutex, Mutex as BlockingMutex},
    mutex::Mutex,
};
use embassy_time::{Duration, Instant, Timer};
use embedded_hal::{digital::InputPin, pwm::SetDutyCycle};
use embedded_hal_async::digital::Wait;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::set_fraction;
use crate::utils::{
    board::Board,
    cancel::CancelToken,
    config::ButtonConfig,
    error::{Error, Result},
    pins,
};

/// User button identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonId {
    A,
    B,
    X,
    Y,
}

impl ButtonId {
    pub const ALL: [ButtonId; 4] = [ButtonId::A, ButtonId::B, ButtonId::X, ButtonId::Y];

    fn index(self) -> usize {
        self as usize
    }

    /// Input pin of this button.
    pub fn pin(self) -> u8 {
        match self {
            ButtonId::A => pins::BUTTON_A_PIN,
            ButtonId::B => pins::BUTTON_B_PIN,
            ButtonId::X => pins::BUTTON_X_PIN,
            ButtonId::Y => pins::BUTTON_Y_PIN,
        }
    }

    /// PWM pin of the LED next to this button.
    pub fn led_pin(self) -> u8 {
        match self {
            ButtonId::A => pins::LED_A_PIN,
            ButtonId::B => pins::LED_B_PIN,
            ButtonId::X => pins::LED_X_PIN,
            ButtonId::Y => pins::LED_Y_PIN,
        }
    }
}

/// Notifications a handler can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonEvent {
    Pressed,
    DoublePressed,
    HoldStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldState {
    /// The hold duration elapsed with the button still down.
    Started,
    /// The button was released after a hold started.
    Completed,
    /// The watcher stopped while a hold was in progress.
    Canceled,
}

/// Everything one state transition produced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Gestures {
    pub pressed: bool,
    pub double_pressed: bool,
    pub hold: Option<HoldState>,
}

/// Gesture state machine for one button. Time is passed in, so the machine
/// itself never touches a clock.
#[derive(Debug, Default, Clone)]
pub struct ButtonState {
    asserted: bool,
    pressed_at: Option<Instant>,
    last_press: Option<Instant>,
    holding: bool,
}

impl ButtonState {
    pub const fn new() -> Self {
        Self {
            asserted: false,
            pressed_at: None,
            last_press: None,
            holding: false,
        }
    }

    /// Debounced line level (true = button down).
    pub fn is_asserted(&self) -> bool {
        self.asserted
    }

    pub fn is_holding(&self) -> bool {
        self.holding
    }

    /// Adopt the line level without raising events. A button already down
    /// at startup is ignored until it is released.
    pub fn sync_level(
        &mut self,
        asserted: bool,
    ) {
        self.asserted = asserted;
        self.pressed_at = None;
    }

    /// Feed a debounced level sampled at `now`.
    pub fn on_level(
        &mut self,
        asserted: bool,
        now: Instant,
        config: &ButtonConfig,
    ) -> Gestures {
        let mut gestures = Gestures::default();
        if asserted == self.asserted {
            return gestures;
        }
        self.asserted = asserted;

        if asserted {
            self.pressed_at = Some(now);
            gestures.pressed = true;
            match self.last_press {
                Some(prev)
                    if now.saturating_duration_since(prev) <= config.double_press_window() =>
                {
                    gestures.double_pressed = true;
                    self.last_press = None;
                }
                _ => self.last_press = Some(now),
            }
        } else {
            self.pressed_at = None;
            if self.holding {
                self.holding = false;
                gestures.hold = Some(HoldState::Completed);
            }
        }
        gestures
    }

    /// When a hold would start if the button stays down.
    pub fn hold_deadline(
        &self,
        config: &ButtonConfig,
    ) -> Option<Instant> {
        match self.pressed_at {
            Some(at) if !self.holding => {
                Some(at.checked_add(config.hold()).unwrap_or(Instant::MAX))
            }
            _ => None,
        }
    }

    /// Check the hold deadline at `now`.
    pub fn on_hold_deadline(
        &mut self,
        now: Instant,
        config: &ButtonConfig,
    ) -> Gestures {
        let mut gestures = Gestures::default();
        if let Some(deadline) = self.hold_deadline(config) {
            if now >= deadline {
                self.holding = true;
                gestures.hold = Some(HoldState::Started);
            }
        }
        gestures
    }

    /// Abandon any in-progress press.
    pub fn cancel(&mut self) -> Gestures {
        self.pressed_at = None;
        let mut gestures = Gestures::default();
        if self.holding {
            self.holding = false;
            gestures.hold = Some(HoldState::Canceled);
        }
        gestures
    }
}

/// Handle returned by `subscribe`; pass it to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u32);

type Handler = Arc<dyn Fn(ButtonId) + Send + Sync>;

struct Subscriber {
    event: ButtonEvent,
    button: Option<ButtonId>,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u32,
    subscribers: HashMap<Subscription, Subscriber>,
}

impl Registry {
    fn insert(
        &mut self,
        subscriber: Subscriber,
    ) -> Subscription {
        let id = Subscription(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.subscribers.insert(id, subscriber);
        id
    }

    fn matching(
        &self,
        event: ButtonEvent,
        button: ButtonId,
    ) -> Vec<Handler> {
        self.subscribers
            .values()
            .filter(|s| s.event == event && s.button.map_or(true, |b| b == button))
            .map(|s| s.handler.clone())
            .collect()
    }
}

/// LED command variants for the four button LEDs.
///
/// Serialized as JSON with tag `"bc"`. Brightness is clamped to [0, 1].
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "bc", rename_all = "snake_case")]
pub enum ButtonLedCommand {
    Set { button: ButtonId, brightness: f64 },
    All { brightness: f64 },
}

/// Brightness for an on/off LED request.
pub fn led_level(on: bool) -> f64 {
    if on {
        1.0
    } else {
        0.0
    }
}

struct Channel<P> {
    pin: P,
    state: ButtonState,
}

/// The four user buttons, their LEDs and the subscriber registry.
///
/// Every method takes `&self`: watchers, LED writes and subscriptions can run
/// from concurrent tasks.
pub struct ButtonInput<P, L> {
    channels: [Mutex<CriticalSectionRawMutex, Channel<P>>; 4],
    holding: [AtomicBool; 4],
    leds: BlockingMutex<CriticalSectionRawMutex, RefCell<[L; 4]>>,
    registry: BlockingMutex<CriticalSectionRawMutex, RefCell<Registry>>,
    config: ButtonConfig,
}

impl<P, L> ButtonInput<P, L>
where
    P: InputPin + Wait,
    L: SetDutyCycle,
{
    /// Build over already-opened pins, ordered A, B, X, Y.
    pub fn new(
        buttons: [P; 4],
        leds: [L; 4],
        config: ButtonConfig,
    ) -> Self {
        Self {
            channels: buttons.map(|pin| {
                Mutex::new(Channel {
                    pin,
                    state: ButtonState::new(),
                })
            }),
            holding: core::array::from_fn(|_| AtomicBool::new(false)),
            leds: BlockingMutex::new(RefCell::new(leds)),
            registry: BlockingMutex::new(RefCell::new(Registry::default())),
            config,
        }
    }

    /// Open the button inputs (pull-up) and LED channels on the Trilobot pin map.
    pub fn open<B>(
        board: &mut B,
        config: ButtonConfig,
    ) -> Result<Self>
    where
        B: Board<Input = P, Pwm = L>,
    {
        let buttons = [
            board.input_pull_up(ButtonId::A.pin())?,
            board.input_pull_up(ButtonId::B.pin())?,
            board.input_pull_up(ButtonId::X.pin())?,
            board.input_pull_up(ButtonId::Y.pin())?,
        ];
        let freq = pins::LED_PWM_FREQUENCY_HZ;
        let leds = [
            board.pwm(ButtonId::A.led_pin(), freq, 0.0)?,
            board.pwm(ButtonId::B.led_pin(), freq, 0.0)?,
            board.pwm(ButtonId::X.led_pin(), freq, 0.0)?,
            board.pwm(ButtonId::Y.led_pin(), freq, 0.0)?,
        ];

        tracing::info!(?config, "Buttons opened");
        Ok(Self::new(buttons, leds, config))
    }

    pub fn config(&self) -> &ButtonConfig {
        &self.config
    }

    /// Subscribe `handler` to `event` on every button.
    pub fn subscribe<F>(
        &self,
        event: ButtonEvent,
        handler: F,
    ) -> Subscription
    where
        F: Fn(ButtonId) + Send + Sync + 'static,
    {
        self.add_subscriber(event, None, Arc::new(handler))
    }

    /// Subscribe `handler` to `event` on one button only.
    pub fn subscribe_button<F>(
        &self,
        button: ButtonId,
        event: ButtonEvent,
        handler: F,
    ) -> Subscription
    where
        F: Fn(ButtonId) + Send + Sync + 'static,
    {
        self.add_subscriber(event, Some(button), Arc::new(handler))
    }

    fn add_subscriber(
        &self,
        event: ButtonEvent,
        button: Option<ButtonId>,
        handler: Handler,
    ) -> Subscription {
        self.registry.lock(|r| {
            r.borrow_mut().insert(Subscriber {
                event,
                button,
                handler,
            })
        })
    }

    /// Remove a subscription. Returns `false` if it was already removed.
    pub fn unsubscribe(
        &self,
        subscription: Subscription,
    ) -> bool {
        self.registry
            .lock(|r| r.borrow_mut().subscribers.remove(&subscription).is_some())
    }

    /// Whether `button` is currently in a hold.
    pub fn is_holding(
        &self,
        button: ButtonId,
    ) -> bool {
        self.holding[button.index()].load(Ordering::Acquire)
    }

    fn notify(
        &self,
        event: ButtonEvent,
        button: ButtonId,
    ) {
        // Handlers run outside the lock so they may (un)subscribe.
        let handlers = self.registry.lock(|r| r.borrow().matching(event, button));
        for handler in handlers {
            handler(button);
        }
    }

    fn dispatch(
        &self,
        button: ButtonId,
        gestures: Gestures,
    ) {
        if let Some(hold) = gestures.hold {
            self.holding[button.index()].store(hold == HoldState::Started, Ordering::Release);
            tracing::debug!(?button, ?hold, "hold state changed");
        }
        if gestures.pressed {
            tracing::debug!(?button, "pressed");
            self.notify(ButtonEvent::Pressed, button);
        }
        if gestures.double_pressed {
            tracing::debug!(?button, "double pressed");
            self.notify(ButtonEvent::DoublePressed, button);
        }
        if gestures.hold == Some(HoldState::Started) {
            self.notify(ButtonEvent::HoldStarted, button);
        }
    }

    async fn watch_edges(
        &self,
        button: ButtonId,
    ) -> Result<()> {
        let mut channel = self.channels[button.index()].lock().await;
        let Channel { pin, state } = &mut *channel;

        let asserted = pin.is_low().map_err(Error::gpio)?;
        state.sync_level(asserted);

        loop {
            let deadline = state.hold_deadline(&self.config);
            let hold_timer = async {
                match deadline {
                    Some(at) => Timer::at(at).await,
                    None => core::future::pending::<()>().await,
                }
            };

            let gestures = match select(pin.wait_for_any_edge(), hold_timer).await {
                Either::First(edge) => {
                    edge.map_err(Error::gpio)?;
                    Timer::after(self.config.debounce()).await;
                    let asserted = pin.is_low().map_err(Error::gpio)?;
                    state.on_level(asserted, Instant::now(), &self.config)
                }
                Either::Second(()) => state.on_hold_deadline(Instant::now(), &self.config),
            };
            self.dispatch(button, gestures);
        }
    }

    async fn cancel_hold(
        &self,
        button: ButtonId,
    ) {
        let gestures = self.channels[button.index()].lock().await.state.cancel();
        self.dispatch(button, gestures);
    }

    /// Watch one button until `cancel` fires or its line fails.
    pub async fn watch(
        &self,
        button: ButtonId,
        cancel: &CancelToken,
    ) -> Result<()> {
        let result = match select(cancel.cancelled(), self.watch_edges(button)).await {
            Either::First(()) => Ok(()),
            Either::Second(result) => result,
        };
        self.cancel_hold(button).await;
        result
    }

    /// Watch all four buttons until `cancel` fires or any line fails.
    pub async fn run(
        &self,
        cancel: &CancelToken,
    ) -> Result<()> {
        let watchers = select4(
            self.watch_edges(ButtonId::A),
            self.watch_edges(ButtonId::B),
            self.watch_edges(ButtonId::X),
            self.watch_edges(ButtonId::Y),
        );
        let result = match select(cancel.cancelled(), watchers).await {
            Either::First(()) => Ok(()),
            Either::Second(
                Either4::First(r) | Either4::Second(r) | Either4::Third(r) | Either4::Fourth(r),
            ) => r,
        };
        if let Err(e) = &result {
            tracing::error!(?e, "button watcher failed");
        }
        for button in ButtonId::ALL {
            self.cancel_hold(button).await;
        }
        result
    }

    /// Set a button LED brightness, clamped to [0, 1].
    pub fn set_led(
        &self,
        button: ButtonId,
        brightness: f64,
    ) -> Result<()> {
        self.leds
            .lock(|leds| set_fraction(&mut leds.borrow_mut()[button.index()], brightness))
    }

    /// Set every button LED to the same brightness.
    ///
    /// A failing channel does not stop the others; the first error is
    /// returned.
    pub fn set_all_leds(
        &self,
        brightness: f64,
    ) -> Result<()> {
        ButtonId::ALL
            .into_iter()
            .fold(Ok(()), |result, button| result.and(self.set_led(button, brightness)))
    }

    /// Turn all LEDs on, wait `interval` without blocking other tasks, then
    /// turn them off.
    pub async fn blink_leds(
        &self,
        interval: Duration,
    ) -> Result<()> {
        self.set_all_leds(1.0)?;
        Timer::after(interval).await;
        self.set_all_leds(0.0)
    }

    /// Execute a `ButtonLedCommand`.
    pub fn execute(
        &self,
        command: ButtonLedCommand,
    ) -> Result<()> {
        match command {
            ButtonLedCommand::Set { button, brightness } => self.set_led(button, brightness),
            ButtonLedCommand::All { brightness } => self.set_all_leds(brightness),
        }
    }

    /// Cancel any holds and turn the LEDs off.
    ///
    /// Watchers should be stopped first; a button whose watcher is still
    /// running only has its holding flag cleared.
    pub fn shutdown(&self) -> Result<()> {
        for button in ButtonId::ALL {
            if let Ok(mut channel) = self.channels[button.index()].try_lock() {
                channel.state.cancel();
            }
            self.holding[button.index()].store(false, Ordering::Release);
        }
        self.set_all_leds(0.0)
    }

    /// Give back the button inputs and LED channels, ordered A, B, X, Y.
    pub fn release(self) -> ([P; 4], [L; 4]) {
        let buttons = self.channels.map(|c| c.into_inner().pin);
        (buttons, self.leds.into_inner().into_inner())
    }
}
