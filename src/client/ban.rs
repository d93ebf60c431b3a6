//! Ban notification state machine
//!
//! ```text
//! Idle --userbanned--> Notified(15) --tick--> Notified(14) ... Notified(1) --tick--> Terminated
//!                        ^    |
//!                        +----+ userbanned (reset to 15, new countdown)
//! Notified(n) --acknowledge--> Terminated
//! ```
//!
//! Entering `Terminated` invalidates the session exactly once. At most one
//! countdown task exists per machine; a fresh ban cancels the old one before
//! starting the next.

use std::ops::ControlFlow;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::countdown::{CountdownTask, MIN_TICK_PERIOD};
use super::invalidator::SessionInvalidator;
use crate::protocol::{normalize_event_name, payload_text, HubEvent, USER_ACTIVATED, USER_BANNED};

/// Grace period between a ban notification and forced logout
pub const DEFAULT_COUNTDOWN_SECONDS: u32 = 15;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// The ban currently shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanNotification {
    pub message: String,
    pub countdown_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BanState {
    Idle,
    Notified(BanNotification),
    Terminated,
}

/// Reaction to `useractivated`.
///
/// What reactivation should do on the client is not decided yet; the default
/// hook does nothing and no state transition happens.
pub trait ActivationHook: Send + Sync {
    fn on_activated(&self, message: &str);
}

/// Default activation hook: no-op
pub struct IgnoreActivation;

impl ActivationHook for IgnoreActivation {
    fn on_activated(&self, message: &str) {
        debug!(message, "account reactivated");
    }
}

enum Tick {
    Continue,
    Terminate,
    Stale,
}

struct Inner {
    state: BanState,
    countdown: Option<CountdownTask>,
    /// Bumped for every countdown; ticks from older countdowns are ignored
    generation: u64,
    torn_down: bool,
}

impl Inner {
    fn accepts_events(&self) -> bool {
        !self.torn_down && self.state != BanState::Terminated
    }

    fn tick(&mut self, generation: u64) -> Tick {
        if self.torn_down || generation != self.generation {
            return Tick::Stale;
        }

        let remaining = match &self.state {
            BanState::Notified(ban) => ban.countdown_seconds,
            _ => return Tick::Stale,
        };

        if remaining > 1 {
            if let BanState::Notified(ban) = &mut self.state {
                ban.countdown_seconds = remaining - 1;
            }
            Tick::Continue
        } else {
            self.state = BanState::Terminated;
            Tick::Terminate
        }
    }
}

/// Client-side reaction to forced account status pushes
pub struct BanNotificationStateMachine {
    inner: Arc<Mutex<Inner>>,
    invalidator: Arc<dyn SessionInvalidator>,
    activation: Arc<dyn ActivationHook>,
    countdown_seconds: u32,
    tick_period: Duration,
}

impl BanNotificationStateMachine {
    pub fn new(invalidator: Arc<dyn SessionInvalidator>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: BanState::Idle,
                countdown: None,
                generation: 0,
                torn_down: false,
            })),
            invalidator,
            activation: Arc::new(IgnoreActivation),
            countdown_seconds: DEFAULT_COUNTDOWN_SECONDS,
            tick_period: TICK_PERIOD,
        }
    }

    /// Override the countdown length (at least one tick) and tick period
    /// (at least [`MIN_TICK_PERIOD`])
    pub fn with_countdown(mut self, seconds: u32, tick_period: Duration) -> Self {
        self.countdown_seconds = seconds.max(1);
        self.tick_period = tick_period.max(MIN_TICK_PERIOD);
        self
    }

    pub fn with_activation_hook(mut self, hook: Arc<dyn ActivationHook>) -> Self {
        self.activation = hook;
        self
    }

    /// Feed a pushed event; names other than the ban/activation pair are ignored
    pub fn handle_event(&self, event: &HubEvent) {
        match normalize_event_name(&event.event).as_str() {
            USER_BANNED => self.on_banned(payload_text(&event.payload)),
            USER_ACTIVATED => self.on_activated(&payload_text(&event.payload)),
            other => debug!(event = other, "ignoring event"),
        }
    }

    /// Enter (or re-enter) `Notified` with a full countdown.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_banned(&self, message: impl Into<String>) {
        let message = message.into();
        let mut inner = self.inner.lock();
        if !inner.accepts_events() {
            debug!("ignoring ban notification after termination");
            return;
        }

        if let Some(mut previous) = inner.countdown.take() {
            previous.cancel();
        }

        inner.generation += 1;
        let generation = inner.generation;
        info!(message = %message, countdown = self.countdown_seconds, "account banned, countdown started");

        inner.state = BanState::Notified(BanNotification {
            message,
            countdown_seconds: self.countdown_seconds,
        });
        inner.countdown = Some(self.spawn_countdown(generation));
    }

    /// Pass `useractivated` to the activation hook; no state change
    pub fn on_activated(&self, message: &str) {
        if !self.inner.lock().accepts_events() {
            return;
        }
        self.activation.on_activated(message);
    }

    /// User confirmed the ban dialog: terminate now
    pub fn acknowledge(&self) {
        let terminated = {
            let mut inner = self.inner.lock();
            if inner.torn_down || !matches!(inner.state, BanState::Notified(_)) {
                false
            } else {
                if let Some(mut countdown) = inner.countdown.take() {
                    countdown.cancel();
                }
                inner.state = BanState::Terminated;
                true
            }
        };

        if terminated {
            info!("ban acknowledged, invalidating session");
            self.invalidator.invalidate();
        }
    }

    /// Stop reacting: cancel any pending countdown and ignore further input.
    ///
    /// A visible notification is dismissed (`Idle`); `Terminated` stays.
    pub fn teardown(&self) {
        let mut inner = self.inner.lock();
        if inner.torn_down {
            return;
        }
        inner.torn_down = true;

        if let Some(mut countdown) = inner.countdown.take() {
            countdown.cancel();
        }
        if matches!(inner.state, BanState::Notified(_)) {
            inner.state = BanState::Idle;
        }
        debug!("ban state machine torn down");
    }

    pub fn state(&self) -> BanState {
        self.inner.lock().state.clone()
    }

    /// Seconds left before forced logout, while notified
    pub fn remaining_seconds(&self) -> Option<u32> {
        match &self.inner.lock().state {
            BanState::Notified(ban) => Some(ban.countdown_seconds),
            _ => None,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.lock().state == BanState::Terminated
    }

    fn spawn_countdown(&self, generation: u64) -> CountdownTask {
        let inner: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        let invalidator = self.invalidator.clone();

        CountdownTask::start(self.tick_period, move || {
            let Some(inner) = inner.upgrade() else {
                return ControlFlow::Break(());
            };

            // Take the finished task out under the lock, drop it after releasing
            let (tick, finished) = {
                let mut guard = inner.lock();
                let tick = guard.tick(generation);
                let finished = match tick {
                    Tick::Terminate => guard.countdown.take(),
                    _ => None,
                };
                (tick, finished)
            };

            match tick {
                Tick::Continue => ControlFlow::Continue(()),
                Tick::Terminate => {
                    info!("ban countdown elapsed, invalidating session");
                    invalidator.invalidate();
                    drop(finished);
                    ControlFlow::Break(())
                }
                Tick::Stale => ControlFlow::Break(()),
            }
        })
    }
}

impl Drop for BanNotificationStateMachine {
    fn drop(&mut self) {
        self.teardown();
    }
}
