//! Wi-Fi station-mode adapter.
//!
//! Implements [`NetworkPort`] for the Wi-Fi station link.
//! Retry spacing is not handled here; the connectivity manager and the
//! reconnect policy decide when to call [`NetworkPort::connect`] again.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::BlockingWifi` over `EspWifi`.
//! - **all other targets**: in-memory simulation with scripted failures.

use log::{info, warn};

use crate::adapters::utils::{is_valid_ssid, is_valid_wpa_password};
use crate::app::ports::{LinkError, LinkInfo, NetworkPort};

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    nvs::EspDefaultNvsPartition,
    wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi},
};

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    /// Simulation: link state.
    #[cfg(not(target_os = "espidf"))]
    sim_connected: bool,
    /// Simulation: number of upcoming connects that fail.
    #[cfg(not(target_os = "espidf"))]
    sim_failures: u32,
    /// Simulation: total connect() calls.
    #[cfg(not(target_os = "espidf"))]
    sim_connects: u32,
}

impl WifiAdapter {
    /// Bring up the Wi-Fi driver in station mode.  Does not connect.
    #[cfg(target_os = "espidf")]
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        hostname: &str,
    ) -> Result<Self, LinkError> {
        let mut esp_wifi = EspWifi::new(modem, sysloop.clone(), nvs).map_err(|e| {
            warn!("WiFi: driver init failed: {}", e);
            LinkError::Driver
        })?;
        if let Err(e) = esp_wifi.sta_netif_mut().set_hostname(hostname) {
            warn!("WiFi: hostname '{}' rejected: {}", hostname, e);
        }
        let wifi = BlockingWifi::wrap(esp_wifi, sysloop).map_err(|_| LinkError::Driver)?;
        info!("WiFi: driver ready (hostname '{}')", hostname);
        Ok(Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            wifi,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            sim_connected: false,
            sim_failures: 0,
            sim_connects: 0,
        }
    }

    /// Set the station credentials used by the next connect.
    pub fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        if !is_valid_ssid(ssid) || !is_valid_wpa_password(password) {
            return Err(LinkError::InvalidCredentials);
        }
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|_| LinkError::InvalidCredentials)?;
        self.password.clear();
        self.password.push_str(password).map_err(|_| LinkError::InvalidCredentials)?;
        info!("WiFi: credentials updated (SSID='{}')", self.ssid);
        Ok(())
    }

    /// Simulation: make the next `n` connects fail.
    #[cfg(not(target_os = "espidf"))]
    pub fn fail_next_connects(&mut self, n: u32) {
        self.sim_failures = n;
    }

    /// Simulation: drop the link as if the AP went away.
    #[cfg(not(target_os = "espidf"))]
    pub fn drop_link(&mut self) {
        self.sim_connected = false;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn connect_count(&self) -> u32 {
        self.sim_connects
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), LinkError> {
        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let cfg = Configuration::Client(ClientConfiguration {
            ssid: self.ssid.as_str().try_into().map_err(|_| LinkError::InvalidCredentials)?,
            password: self.password.as_str().try_into().map_err(|_| LinkError::InvalidCredentials)?,
            auth_method,
            ..Default::default()
        });
        self.wifi.set_configuration(&cfg).map_err(|_| LinkError::Driver)?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|_| LinkError::Driver)?;
        }
        self.wifi.connect().map_err(|e| {
            warn!("WiFi: association failed: {}", e);
            LinkError::ConnectionFailed
        })?;
        self.wifi.wait_netif_up().map_err(|_| LinkError::Timeout)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), LinkError> {
        self.sim_connects = self.sim_connects.wrapping_add(1);
        if self.sim_failures > 0 {
            self.sim_failures -= 1;
            warn!("WiFi(sim): scripted failure (attempt {})", self.sim_connects);
            return Err(LinkError::ConnectionFailed);
        }
        self.sim_connected = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi: disconnect failed: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.sim_connected = false;
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_connected
    }

    #[cfg(target_os = "espidf")]
    fn platform_ip(&self, out: &mut heapless::String<16>) {
        use core::fmt::Write;
        if let Ok(info) = self.wifi.wifi().sta_netif().get_ip_info() {
            let _ = write!(out, "{}", info.ip);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_ip(&self, out: &mut heapless::String<16>) {
        let _ = out.push_str("192.168.4.2");
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> i8 {
        let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
        // SAFETY: ap_info is a valid out-pointer; the driver is started.
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        if ret == esp_idf_svc::sys::ESP_OK { ap_info.rssi } else { 0 }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> i8 {
        -60
    }

    #[cfg(target_os = "espidf")]
    fn platform_forget(&mut self) -> Result<(), LinkError> {
        // An empty client configuration overwrites the one the driver
        // persisted in NVS.
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration::default()))
            .map_err(|_| LinkError::Driver)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_forget(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// NetworkPort
// ───────────────────────────────────────────────────────────────

impl NetworkPort for WifiAdapter {
    fn connect(&mut self) -> Result<(), LinkError> {
        if self.ssid.is_empty() {
            return Err(LinkError::NoCredentials);
        }
        if self.platform_is_connected() {
            return Ok(());
        }

        info!("WiFi: connecting to '{}'", self.ssid);
        match self.platform_connect() {
            Ok(()) => {
                info!("WiFi: connected (RSSI={})", self.platform_rssi());
                Ok(())
            }
            Err(e) => {
                warn!("WiFi: connection failed: {}", e);
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        info!("WiFi: disconnected");
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    fn link_info(&self) -> Option<LinkInfo> {
        if !self.platform_is_connected() {
            return None;
        }
        let mut info = LinkInfo { ssid: self.ssid.clone(), rssi: self.platform_rssi(), ..Default::default() };
        self.platform_ip(&mut info.ip);
        Some(info)
    }

    fn forget_credentials(&mut self) -> Result<(), LinkError> {
        self.ssid.clear();
        self.password.clear();
        self.platform_forget()?;
        info!("WiFi: station credentials erased");
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
