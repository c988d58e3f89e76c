//! Spray power-supply driver (logic-level MOSFET).
//!
//! HIGH energises the spray mechanism.  The driver is a dumb actuator: pulse
//! timing lives in the dispatcher.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives a [`GpioPin`](super::hw_init::GpioPin).
//! On host/test: any `embedded-hal` output pin, usually a recording fake.

use embedded_hal::digital::OutputPin;
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SprayState {
    Idle,
    Spraying,
}

pub struct SprayDriver<P: OutputPin> {
    pin: P,
    state: SprayState,
}

impl<P: OutputPin> SprayDriver<P> {
    /// Takes ownership of the pin and drives it to the idle level.
    pub fn new(mut pin: P) -> Self {
        if pin.set_low().is_err() {
            warn!("Spray: failed to park output low");
        }
        Self { pin, state: SprayState::Idle }
    }

    pub fn set(&mut self, active: bool) {
        let r = if active { self.pin.set_high() } else { self.pin.set_low() };
        if r.is_err() {
            warn!("Spray: output write failed (active={})", active);
        }
        self.state = if active { SprayState::Spraying } else { SprayState::Idle };
    }

    pub fn state(&self) -> SprayState {
        self.state
    }

    pub fn is_spraying(&self) -> bool {
        self.state == SprayState::Spraying
    }
}
