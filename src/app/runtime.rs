//! The cooperative main-loop cycle.
//!
//! [`Device`] bundles the dispatcher with the ports it is driven by and runs
//! one cycle at a time, always in the same order:
//!
//! 1. messaging housekeeping (poll + at most one command)
//! 2. button debounce + manual pulse
//! 3. telemetry cadences
//! 4. reconnect check
//!
//! `main` calls [`Device::cycle`] in a loop and restarts the chip when it
//! returns [`Outcome::Restart`].

use log::info;

use super::dispatcher::{Dispatcher, Outcome};
use super::ports::{
    ActuatorPort, ClockPort, EventSink, InputPort, MessagingPort, NetworkPort, StoragePort,
};
use super::connectivity::{ConnectionState, ReconnectPolicy};
use crate::config::DeviceConfig;

pub struct Device<S, N, M, K, B, A, C, E>
where
    S: StoragePort,
    N: NetworkPort,
    M: MessagingPort,
    K: StoragePort,
    B: InputPort,
    A: ActuatorPort,
    C: ClockPort,
    E: EventSink,
{
    pub dispatcher: Dispatcher<S, N, M, K>,
    pub button: B,
    pub actuator: A,
    pub clock: C,
    pub sink: E,
    reconnect: ReconnectPolicy,
}

impl<S, N, M, K, B, A, C, E> Device<S, N, M, K, B, A, C, E>
where
    S: StoragePort,
    N: NetworkPort,
    M: MessagingPort,
    K: StoragePort,
    B: InputPort,
    A: ActuatorPort,
    C: ClockPort,
    E: EventSink,
{
    pub fn new(
        dispatcher: Dispatcher<S, N, M, K>,
        button: B,
        actuator: A,
        clock: C,
        sink: E,
        config: &DeviceConfig,
    ) -> Self {
        Self {
            dispatcher,
            button,
            actuator,
            clock,
            sink,
            reconnect: ReconnectPolicy::new(config.reconnect_interval_ms),
        }
    }

    /// Load counters, park the output, and make the boot-time connect.
    pub fn start(&mut self) -> ConnectionState {
        self.actuator.set_output(false);
        self.actuator.set_indicator(false);
        self.dispatcher.start(&mut self.sink);

        let state = self.dispatcher.link_mut().connect(&mut self.clock, &mut self.sink);
        self.reconnect.note_attempt(self.clock.now_ms());
        info!("Device: boot connect finished in {:?}", state);
        state
    }

    /// Run one cycle.
    pub fn cycle(&mut self) -> Outcome {
        // 1. Messaging housekeeping.
        if let Some(cmd) = self.dispatcher.poll(&mut self.sink) {
            let outcome = self.dispatcher.handle_command(
                cmd,
                &mut self.actuator,
                &mut self.clock,
                &mut self.sink,
            );
            if outcome == Outcome::Restart {
                return outcome;
            }
        }

        // 2. Button.
        self.button.update(self.clock.now_ms());
        if self.button.pressed() {
            self.dispatcher
                .handle_button_press(&mut self.actuator, &mut self.clock, &mut self.sink);
        }

        // 3. Telemetry.
        let now = self.clock.now_ms();
        self.dispatcher.tick_telemetry(now, &mut self.sink);

        // 4. Reconnect.
        let now = self.clock.now_ms();
        if self.reconnect.due(now, self.dispatcher.link().is_connected()) {
            info!("Device: reconnecting");
            self.dispatcher
                .link_mut()
                .connect(&mut self.clock, &mut self.sink);
        }

        Outcome::Continue
    }
}
