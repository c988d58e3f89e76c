//! Polled, debounced button driver.
//!
//! ## Hardware
//!
//! Active-low momentary switch with pull-up.  The pin is sampled once per
//! main-loop cycle; a level change must stay stable for the debounce
//! interval before it is accepted.
//!
//! ## Press detection
//!
//! | Raw level | Stable for       | Debounced | `pressed()`            |
//! |-----------|------------------|-----------|------------------------|
//! | HIGH→LOW  | ≥ `debounce_ms`  | down      | `true` for that cycle  |
//! | LOW→HIGH  | ≥ `debounce_ms`  | up        | `false`                |
//!
//! Holding the button does not repeat.

use embedded_hal::digital::InputPin;
use log::{debug, warn};

use crate::app::ports::InputPort;

pub struct ButtonDriver<P: InputPin> {
    pin: P,
    debounce_ms: u32,
    /// Debounced level: `true` = held down.
    stable_down: bool,
    /// Last raw sample and when it first appeared.
    raw_down: bool,
    raw_since_ms: u64,
    pressed: bool,
}

impl<P: InputPin> ButtonDriver<P> {
    pub fn new(pin: P, debounce_ms: u32) -> Self {
        Self {
            pin,
            debounce_ms,
            stable_down: false,
            raw_down: false,
            raw_since_ms: 0,
            pressed: false,
        }
    }

    pub fn is_down(&self) -> bool {
        self.stable_down
    }

    fn sample(&mut self) -> bool {
        match self.pin.is_low() {
            Ok(low) => low,
            Err(_) => {
                warn!("Button: pin read failed, treating as released");
                false
            }
        }
    }
}

impl<P: InputPin> InputPort for ButtonDriver<P> {
    fn update(&mut self, now_ms: u64) {
        self.pressed = false;

        let down = self.sample();
        if down != self.raw_down {
            self.raw_down = down;
            self.raw_since_ms = now_ms;
        }

        let settled = now_ms.wrapping_sub(self.raw_since_ms) >= u64::from(self.debounce_ms);
        if settled && self.raw_down != self.stable_down {
            self.stable_down = self.raw_down;
            if self.stable_down {
                debug!("Button: pressed");
                self.pressed = true;
            }
        }
    }

    fn pressed(&self) -> bool {
        self.pressed
    }
}
