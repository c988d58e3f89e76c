//! Hardware adapter: bridges the spray output and indicator to
//! [`ActuatorPort`].
//!
//! This is the only module in the system that drives actuator pins.  On
//! non-espidf targets the underlying pins are cfg-gated simulation stubs or
//! test fakes.

use embedded_hal::digital::OutputPin;

use crate::app::ports::ActuatorPort;
use crate::drivers::indicator::IndicatorLed;
use crate::drivers::spray::SprayDriver;

/// Concrete adapter that combines the actuators behind the port trait.
pub struct HardwareAdapter<O: OutputPin, L: OutputPin> {
    spray: SprayDriver<O>,
    led: IndicatorLed<L>,
}

impl<O: OutputPin, L: OutputPin> HardwareAdapter<O, L> {
    pub fn new(spray: SprayDriver<O>, led: IndicatorLed<L>) -> Self {
        Self { spray, led }
    }

    pub fn spray(&self) -> &SprayDriver<O> {
        &self.spray
    }

    pub fn led(&self) -> &IndicatorLed<L> {
        &self.led
    }
}

impl<O: OutputPin, L: OutputPin> ActuatorPort for HardwareAdapter<O, L> {
    fn set_output(&mut self, active: bool) {
        self.spray.set(active);
    }

    fn set_indicator(&mut self, on: bool) {
        self.led.set(on);
    }
}
