//! Concrete implementations of the port traits.
//!
//! | Adapter     | Implements      | Connects to                  |
//! |-------------|-----------------|------------------------------|
//! | `hardware`  | ActuatorPort    | Spray output, indicator LED  |
//! | `log_sink`  | EventSink       | Serial log output            |
//! | `mqtt`      | MessagingPort   | ESP-IDF MQTT client          |
//! | `nvs`       | ConfigPort      | NVS / in-memory store        |
//! |             | StoragePort     |                              |
//! | `time`      | ClockPort       | ESP32 system timer           |
//! | `wifi`      | NetworkPort     | ESP-IDF WiFi STA             |

pub mod device_id;
pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod time;
pub(crate) mod utils;
pub mod wifi;
