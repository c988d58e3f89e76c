//! Air-fragrancer firmware entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   ButtonDriver   LogEventSink   Esp32Time     │
//! │  (Actuator)        (Input)        (EventSink)    (Clock)       │
//! │  WifiAdapter       MqttAdapter    NvsAdapter                   │
//! │  (Network)         (Messaging)    (Config + Storage)           │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  Device: Dispatcher · ConnectivityManager ·            │    │
//! │  │          CounterStore · TelemetryScheduler             │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use fragrancer::adapters::device_id;
use fragrancer::adapters::hardware::HardwareAdapter;
use fragrancer::adapters::log_sink::LogEventSink;
use fragrancer::adapters::mqtt::MqttAdapter;
use fragrancer::adapters::nvs::NvsAdapter;
use fragrancer::adapters::time::Esp32TimeAdapter;
use fragrancer::adapters::wifi::WifiAdapter;
use fragrancer::app::connectivity::ConnectivityManager;
use fragrancer::app::counter::CounterStore;
use fragrancer::app::credentials::CredentialStore;
use fragrancer::app::dispatcher::{Dispatcher, Outcome};
use fragrancer::app::ports::ConfigPort;
use fragrancer::app::runtime::Device;
use fragrancer::app::topics::DeviceTopics;
use fragrancer::config::DeviceConfig;
use fragrancer::drivers::button::ButtonDriver;
use fragrancer::drivers::hw_init::{self, GpioPin};
use fragrancer::drivers::indicator::IndicatorLed;
use fragrancer::drivers::spray::SprayDriver;
use fragrancer::pins;
use fragrancer::telemetry::TelemetryScheduler;

/// Main-loop pacing between cycles.
const CYCLE_DELAY_MS: u32 = 10;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    let mac = device_id::read_mac();

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let partition = EspDefaultNvsPartition::take()?;
    let nvs = NvsAdapter::new(partition.clone());
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            DeviceConfig::default()
        }
    };
    let identifier = device_id::identifier(&config.firmware_prefix, &mac);

    info!("╔══════════════════════════════════════╗");
    info!("║  Air Fragrancer v{:<20}║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");
    info!("Device: {}", identifier);
    info!(
        "Pins: spray={} led={} button={}",
        pins::SPRAY_POWER_GPIO,
        pins::INDICATOR_LED_GPIO,
        pins::BUTTON_GPIO
    );

    // ── 3. Initialise hardware peripherals ────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        error!("HAL init failed: {}, restarting", e);
        FreeRtos::delay_ms(config.restart_delay_ms);
        hw_init::restart();
    }

    // ── 4. Credentials (written by provisioning) ──────────────
    let mut credentials = CredentialStore::new(nvs.clone());
    let creds = match credentials.load() {
        Ok(Some(c)) => Some(c.clone()),
        Ok(None) => {
            warn!("No broker credentials provisioned; running offline");
            None
        }
        Err(e) => {
            warn!("Credential load failed ({}); running offline", e);
            None
        }
    };

    // ── 5. Network + messaging adapters ───────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let mut wifi = WifiAdapter::new(peripherals.modem, sysloop, Some(partition), &identifier)
        .map_err(|e| anyhow::anyhow!("WiFi init failed: {}", e))?;
    let broker_url = match &creds {
        Some(c) => {
            if let Err(e) = wifi.set_credentials(&c.wifi_ssid, &c.wifi_password) {
                warn!("Stored WiFi credentials rejected: {}", e);
            }
            c.broker_url()
        }
        None => heapless::String::new(),
    };
    let mqtt = MqttAdapter::new(&broker_url);

    let topic_id = device_id::topic_id(&mac);
    let topics = DeviceTopics::new(&config.topic_prefix, &topic_id)
        .map_err(|e| anyhow::anyhow!("topic layout: {}", e))?;
    info!("Topics: command={} state={}", topics.command, topics.command_state);

    // ── 6. Domain wiring ──────────────────────────────────────
    let link = ConnectivityManager::new(wifi, mqtt, credentials, topics, &identifier, &config);
    let dispatcher = Dispatcher::new(
        CounterStore::new(nvs),
        link,
        TelemetryScheduler::new(&config),
        &config,
    );
    let hardware = HardwareAdapter::new(
        SprayDriver::new(GpioPin(pins::SPRAY_POWER_GPIO)),
        IndicatorLed::new(GpioPin(pins::INDICATOR_LED_GPIO)),
    );
    let button = ButtonDriver::new(GpioPin(pins::BUTTON_GPIO), config.debounce_ms);

    let mut device = Device::new(
        dispatcher,
        button,
        hardware,
        Esp32TimeAdapter::new(),
        LogEventSink::new(),
        &config,
    );

    // ── 7. Boot connect ───────────────────────────────────────
    device.start();
    info!("Entering main loop");

    // ── 8. Main loop ──────────────────────────────────────────
    loop {
        if device.cycle() == Outcome::Restart {
            hw_init::restart();
        }
        FreeRtos::delay_ms(CYCLE_DELAY_MS);
    }
}
