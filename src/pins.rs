//! GPIO pin assignments for the fragrancer board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Spray power supply (logic-level MOSFET)
// ---------------------------------------------------------------------------

/// Digital output: HIGH = spray mechanism powered.
pub const SPRAY_POWER_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Indicator LED
// ---------------------------------------------------------------------------

/// On-board LED, active-low (LOW = lit).
pub const INDICATOR_LED_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// User button (active-low with internal pull-up)
// ---------------------------------------------------------------------------

/// Momentary push-button for a manual spray.
pub const BUTTON_GPIO: i32 = 5;
