//! Device identity derived from the ESP32 factory MAC address.
//!
//! The chip id is the low 24 bits of the factory MAC in uppercase hex,
//! without leading zeros (`EFCAFE`).  From it:
//! - topic id: `EFCAFE` (the `<id>` segment of every topic)
//! - identifier: `esp32-air-fragrancer-EFCAFE` (MQTT client id, Wi-Fi hostname)

use core::fmt::Write;

/// Fixed-size identifier string.
pub type DeviceIdString = heapless::String<64>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Low 24 bits of the MAC.
pub fn chip_id(mac: &MacAddress) -> u32 {
    (u32::from(mac[3]) << 16) | (u32::from(mac[4]) << 8) | u32::from(mac[5])
}

/// Topic id: chip id in uppercase hex.
pub fn topic_id(mac: &MacAddress) -> heapless::String<8> {
    let mut id = heapless::String::new();
    let _ = write!(id, "{:X}", chip_id(mac));
    id
}

/// `<firmware_prefix>-<CHIPID>`.  A prefix too long for the buffer is cut.
pub fn identifier(firmware_prefix: &str, mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    if write!(id, "{}-{:X}", firmware_prefix, chip_id(mac)).is_err() {
        id.clear();
        let _ = write!(id, "{:X}", chip_id(mac));
    }
    id
}
