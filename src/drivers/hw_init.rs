//! One-shot GPIO initialization and raw pin access.
//!
//! Configures the spray output, the indicator LED and the button input using
//! raw ESP-IDF sys calls.  Called once from `main()` before the loop starts.
//! [`GpioPin`] exposes a configured pin through the `embedded-hal` digital
//! traits so the drivers stay generic.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
        }
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the loop; single-threaded.
    unsafe {
        init_gpio_outputs()?;
        init_gpio_inputs()?;
    }
    info!("hw_init: GPIO configured (spray={}, led={}, button={})",
        pins::SPRAY_POWER_GPIO, pins::INDICATOR_LED_GPIO, pins::BUTTON_GPIO);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    // (pin, idle level): spray off = LOW, active-low LED off = HIGH.
    let outputs = [(pins::SPRAY_POWER_GPIO, 0), (pins::INDICATOR_LED_GPIO, 1)];

    for &(pin, idle) in &outputs {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
        unsafe { gpio_set_level(pin, idle) };
    }
    Ok(())
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    let btn_cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::BUTTON_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&btn_cfg) };
    if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
    Ok(())
}

// ── Raw access ────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: read-only register access on an already-configured input pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

/// Simulation: inputs idle HIGH (pull-up, button released).
#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: pin was configured as output in init_gpio_outputs(). Main-loop only.
    unsafe { gpio_set_level(pin, if high { 1 } else { 0 }); }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

/// Reboot the chip.  Does not return on target.
#[cfg(target_os = "espidf")]
pub fn restart() -> ! {
    info!("hw_init: restarting");
    esp_idf_svc::hal::reset::restart()
}

#[cfg(not(target_os = "espidf"))]
pub fn restart() -> ! {
    log::info!("hw_init(sim): restart requested, exiting");
    std::process::exit(0)
}

// ── embedded-hal bridge ───────────────────────────────────────

/// A GPIO configured by [`init_peripherals`], by number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioPin(pub i32);

impl ErrorType for GpioPin {
    type Error = Infallible;
}

impl OutputPin for GpioPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        gpio_write(self.0, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        gpio_write(self.0, true);
        Ok(())
    }
}

impl InputPin for GpioPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(gpio_read(self.0))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!gpio_read(self.0))
    }
}
