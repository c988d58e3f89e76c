//! Shared validation helpers for credentials and names.
//!
//! Used by [`BrokerCredentials`](crate::config::BrokerCredentials),
//! [`DeviceConfig`](crate::config::DeviceConfig) and the Wi-Fi adapter.

/// Every byte is in `0x20..=0x7E` (space through tilde).
pub(crate) fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// 1–32 printable ASCII bytes.
pub(crate) fn is_valid_ssid(ssid: &str) -> bool {
    !ssid.is_empty() && ssid.len() <= 32 && is_printable_ascii(ssid)
}

/// Empty (open network) or 8–64 bytes (WPA2 passphrase / PSK hex).
pub(crate) fn is_valid_wpa_password(password: &str) -> bool {
    password.is_empty() || (8..=64).contains(&password.len())
}
