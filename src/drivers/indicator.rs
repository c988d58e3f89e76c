//! Active-low indicator LED.
//!
//! Mirrors the spray output: lit while spraying.

use embedded_hal::digital::OutputPin;
use log::warn;

pub struct IndicatorLed<P: OutputPin> {
    pin: P,
    lit: bool,
}

impl<P: OutputPin> IndicatorLed<P> {
    pub fn new(mut pin: P) -> Self {
        if pin.set_high().is_err() {
            warn!("Indicator: failed to park LED off");
        }
        Self { pin, lit: false }
    }

    pub fn set(&mut self, on: bool) {
        // LOW lights the LED.
        let r = if on { self.pin.set_low() } else { self.pin.set_high() };
        if r.is_err() {
            warn!("Indicator: write failed");
        }
        self.lit = on;
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }
}
