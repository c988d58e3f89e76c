//! Command dispatcher: the state machine behind the command topic and the button.
//!
//! [`Dispatcher`] owns the counter store, the connectivity manager and the
//! telemetry scheduler.  Hardware, clock and event sink are injected at
//! call sites, so the whole state machine runs against mocks.
//!
//! ```text
//!   Command / button ──▶ ┌────────────────────────────┐ ──▶ device-state, burst-counter
//!                        │         Dispatcher         │
//!     ActuatorPort ◀──── │ Idle · Pulsing · Resetting │ ──▶ EventSink
//!                        └────────────────────────────┘
//! ```
//!
//! Every sequence runs to completion before the next command is read.
//! Storage and publish failures are reported and stepped over; they never
//! cut a sequence short.

use log::{info, warn};

use super::commands::{Command, PulseRequest, PulseSource};
use super::connectivity::ConnectivityManager;
use super::counter::CounterStore;
use super::events::AppEvent;
use super::ports::{ActuatorPort, ClockPort, EventSink, MessagingPort, NetworkPort, StoragePort};
use crate::config::DeviceConfig;
use crate::error::Fault;
use crate::telemetry::TelemetryScheduler;

/// Labels published on `device-state` outside of a command's own label.
pub const STATE_ON: &str = "on";
pub const STATE_OFF: &str = "off";
pub const STATE_GONE: &str = "gone";

/// Steps of the `reset-all` farewell, in order.  The last one is `gone`.
pub const FAREWELL_STEPS: [&str; 5] = ["reset-all", "so-long", "and-thanks", "for-all-the-fish", STATE_GONE];

// ───────────────────────────────────────────────────────────────
// State
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Pulsing,
    ResettingCounter,
    ResettingConfig,
}

/// What the caller must do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    /// Credentials are gone; restart the device now.
    Restart,
}

/// Which counters a reset zeroes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResetScope {
    Instance,
    All,
}

#[derive(Debug, Clone, Copy)]
struct Timings {
    pulse_ms: u32,
    settle_ms: u32,
    farewell_step_ms: u32,
    restart_ms: u32,
}

// ───────────────────────────────────────────────────────────────
// Dispatcher
// ───────────────────────────────────────────────────────────────

pub struct Dispatcher<S, N, M, K>
where
    S: StoragePort,
    N: NetworkPort,
    M: MessagingPort,
    K: StoragePort,
{
    store: CounterStore<S>,
    link: ConnectivityManager<N, M, K>,
    telemetry: TelemetryScheduler,
    timings: Timings,
    state: DispatchState,
}

impl<S, N, M, K> Dispatcher<S, N, M, K>
where
    S: StoragePort,
    N: NetworkPort,
    M: MessagingPort,
    K: StoragePort,
{
    pub fn new(
        store: CounterStore<S>,
        link: ConnectivityManager<N, M, K>,
        telemetry: TelemetryScheduler,
        config: &DeviceConfig,
    ) -> Self {
        Self {
            store,
            link,
            telemetry,
            timings: Timings {
                pulse_ms: config.pulse_duration_ms,
                settle_ms: config.settle_delay_ms,
                farewell_step_ms: config.farewell_step_ms,
                restart_ms: config.restart_delay_ms,
            },
            state: DispatchState::Idle,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load the counters.  Call once before the first cycle.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        let report = self.store.load();
        if let Some(f) = report.fault {
            sink.emit(&AppEvent::Fault(f));
        }
        sink.emit(&AppEvent::CountersChanged(report.counters));
        info!(
            "Dispatcher: started (instance={}, overall={}, storage {:?})",
            report.counters.instance,
            report.counters.overall,
            self.store.health()
        );
    }

    // ── Triggers ──────────────────────────────────────────────

    /// Process one inbound command to completion.
    pub fn handle_command(
        &mut self,
        cmd: Command,
        hw: &mut impl ActuatorPort,
        clock: &mut impl ClockPort,
        sink: &mut impl EventSink,
    ) -> Outcome {
        if cmd == Command::Unrecognized {
            sink.emit(&AppEvent::CommandIgnored(cmd));
            return Outcome::Continue;
        }
        if cmd == Command::Update {
            sink.emit(&AppEvent::CommandAccepted(cmd));
            let raw = self.store.raw();
            self.telemetry.publish_now(&mut self.link, &raw, sink);
            return Outcome::Continue;
        }
        if self.state != DispatchState::Idle {
            warn!("Dispatcher: '{}' ignored in {:?}", cmd.label(), self.state);
            sink.emit(&AppEvent::CommandIgnored(cmd));
            return Outcome::Continue;
        }

        sink.emit(&AppEvent::CommandAccepted(cmd));
        match cmd {
            Command::On => {
                let req = PulseRequest { source: PulseSource::Remote, duration_ms: self.timings.pulse_ms };
                self.pulse(req, hw, clock, sink);
                Outcome::Continue
            }
            Command::ResetInstanceCounter => {
                self.reset_counter(cmd, ResetScope::Instance, clock, sink);
                Outcome::Continue
            }
            Command::ResetAllCounter => {
                self.reset_counter(cmd, ResetScope::All, clock, sink);
                Outcome::Continue
            }
            Command::ResetConfig => self.reset_config(clock, sink),
            Command::ResetAll => self.reset_all(clock, sink),
            Command::Update | Command::Unrecognized => Outcome::Continue,
        }
    }

    /// Debounced press of the manual button.
    pub fn handle_button_press(
        &mut self,
        hw: &mut impl ActuatorPort,
        clock: &mut impl ClockPort,
        sink: &mut impl EventSink,
    ) {
        if self.state != DispatchState::Idle {
            return;
        }
        let req = PulseRequest { source: PulseSource::Manual, duration_ms: self.timings.pulse_ms };
        self.pulse(req, hw, clock, sink);
    }

    // ── Sequences ─────────────────────────────────────────────

    /// `on` → output for the pulse duration → count → snapshot and counter → `off`.
    fn pulse(
        &mut self,
        req: PulseRequest,
        hw: &mut impl ActuatorPort,
        clock: &mut impl ClockPort,
        sink: &mut impl EventSink,
    ) {
        self.transition(DispatchState::Pulsing, sink);
        info!("PULSE | {:?} for {} ms", req.source, req.duration_ms);

        // Status goes out before the blocking wait.
        let r = self.link.publish_state(STATE_ON);
        report(r, sink);

        hw.set_output(true);
        hw.set_indicator(true);
        clock.delay_ms(req.duration_ms);
        hw.set_output(false);
        hw.set_indicator(false);

        let r = self.store.record_activation();
        report(r, sink);
        sink.emit(&AppEvent::CountersChanged(self.store.counters()));

        let raw = self.store.raw();
        self.telemetry.publish_now(&mut self.link, &raw, sink);
        let r = self.link.publish_state(STATE_OFF);
        report(r, sink);

        sink.emit(&AppEvent::PulseCompleted { source: req.source, duration_ms: req.duration_ms });
        self.transition(DispatchState::Idle, sink);
    }

    fn reset_counter(
        &mut self,
        cmd: Command,
        scope: ResetScope,
        clock: &mut impl ClockPort,
        sink: &mut impl EventSink,
    ) {
        self.transition(DispatchState::ResettingCounter, sink);

        let r = self.link.publish_state(cmd.label());
        report(r, sink);

        let r = match scope {
            ResetScope::Instance => self.store.reset_instance(),
            ResetScope::All => self.store.reset_all(),
        };
        report(r, sink);
        sink.emit(&AppEvent::CountersChanged(self.store.counters()));

        let raw = self.store.raw();
        self.telemetry.publish_now(&mut self.link, &raw, sink);

        clock.delay_ms(self.timings.settle_ms);
        let r = self.link.publish_state(STATE_OFF);
        report(r, sink);

        // Forced reconnect cycle.
        info!("Dispatcher: cycling broker session after counter reset");
        self.link.disconnect(sink);
        self.link.connect(clock, sink);

        self.transition(DispatchState::Idle, sink);
    }

    fn reset_config(&mut self, clock: &mut impl ClockPort, sink: &mut impl EventSink) -> Outcome {
        self.transition(DispatchState::ResettingConfig, sink);

        let r = self.link.publish_state(Command::ResetConfig.label());
        report(r, sink);
        clock.delay_ms(self.timings.settle_ms);
        let r = self.link.publish_state(STATE_GONE);
        report(r, sink);

        self.forget_and_restart(clock, sink)
    }

    fn reset_all(&mut self, clock: &mut impl ClockPort, sink: &mut impl EventSink) -> Outcome {
        self.transition(DispatchState::ResettingConfig, sink);

        for (i, step) in FAREWELL_STEPS.iter().enumerate() {
            if i > 0 {
                clock.delay_ms(self.timings.farewell_step_ms);
            }
            let r = self.link.publish_state(step);
            report(r, sink);
        }

        let r = self.store.reset_all();
        report(r, sink);
        sink.emit(&AppEvent::CountersChanged(self.store.counters()));

        self.forget_and_restart(clock, sink)
    }

    fn forget_and_restart(&mut self, clock: &mut impl ClockPort, sink: &mut impl EventSink) -> Outcome {
        let r = self.link.forget_credentials();
        report(r, sink);
        clock.delay_ms(self.timings.restart_ms);
        sink.emit(&AppEvent::Restarting);
        Outcome::Restart
    }

    fn transition(&mut self, next: DispatchState, sink: &mut impl EventSink) {
        if self.state != next {
            let from = self.state;
            self.state = next;
            sink.emit(&AppEvent::StateChanged { from, to: next });
        }
    }

    // ── Per-cycle helpers ─────────────────────────────────────

    /// Messaging housekeeping; yields at most one command.
    pub fn poll(&mut self, sink: &mut impl EventSink) -> Option<Command> {
        self.link.poll(sink)
    }

    pub fn tick_telemetry(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        self.telemetry.tick(now_ms, &mut self.link, sink);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn store(&self) -> &CounterStore<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut CounterStore<S> {
        &mut self.store
    }

    pub fn link(&self) -> &ConnectivityManager<N, M, K> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut ConnectivityManager<N, M, K> {
        &mut self.link
    }

    pub fn telemetry(&self) -> &TelemetryScheduler {
        &self.telemetry
    }
}

/// Surface a stepped-over failure to the sink.
fn report(result: Result<(), Fault>, sink: &mut impl EventSink) {
    if let Err(f) = result {
        sink.emit(&AppEvent::Fault(f));
    }
}
