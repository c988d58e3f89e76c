//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the fragrancer.
//!
//! - Namespaces: `fragrancer` (device config), `counter` (A/B counter
//!   slots), `auth` (broker credentials).  Each subsystem owns its own.
//! - Config validation: fields are range-checked before persistence and
//!   again after decode.
//! - Handles are cheap to clone and share one backing store, so the counter
//!   store and the credential store can each own an adapter.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::DeviceConfig;

#[cfg(not(target_os = "espidf"))]
use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
};

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

const CONFIG_NAMESPACE: &str = "fragrancer";
const CONFIG_KEY: &str = "devcfg";
const MAX_CONFIG_BLOB: usize = 256;

#[derive(Clone)]
pub struct NvsAdapter {
    #[cfg(target_os = "espidf")]
    partition: EspDefaultNvsPartition,
    #[cfg(not(target_os = "espidf"))]
    store: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    /// Simulation: error every operation returns while set.
    #[cfg(not(target_os = "espidf"))]
    fault: Rc<Cell<Option<StorageError>>>,
}

impl NvsAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(partition: EspDefaultNvsPartition) -> Self {
        info!("NvsAdapter: ESP-IDF default partition");
        Self { partition }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        info!("NvsAdapter: simulation backend");
        Self {
            store: Rc::new(RefCell::new(HashMap::new())),
            fault: Rc::new(Cell::new(None)),
        }
    }

    /// Simulation: make every clone of this store fail with `fault`
    /// (`None` restores normal operation).
    #[cfg(not(target_os = "espidf"))]
    pub fn inject_fault(&self, fault: Option<StorageError>) {
        self.fault.set(fault);
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    #[cfg(not(target_os = "espidf"))]
    fn check(&self) -> Result<(), StorageError> {
        match self.fault.get() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Open a namespace read-write.  Opening fails only when the partition
    /// itself is unusable.
    #[cfg(target_os = "espidf")]
    fn open(&self, namespace: &str) -> Result<EspNvs<NvsDefault>, StorageError> {
        EspNvs::new(self.partition.clone(), namespace, true).map_err(|e| {
            warn!("NvsAdapter: open '{}' failed: {}", namespace, e);
            StorageError::Unavailable
        })
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for NvsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// ConfigPort
// ───────────────────────────────────────────────────────────────

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        let mut buf = [0u8; MAX_CONFIG_BLOB];
        let len = match self.read(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                return Ok(DeviceConfig::default());
            }
            Err(e) => {
                warn!("NvsAdapter: config read failed: {}", e);
                return Err(ConfigError::IoError);
            }
        };

        let cfg: DeviceConfig = postcard::from_bytes(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        info!("NvsAdapter: loaded config ({} bytes)", len);
        Ok(cfg)
    }

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_CONFIG_BLOB {
            return Err(ConfigError::IoError);
        }
        // ConfigPort::save takes &self; the handle is shared anyway.
        let mut handle = self.clone();
        handle.write(CONFIG_NAMESPACE, CONFIG_KEY, &bytes).map_err(|e| {
            warn!("NvsAdapter: config write failed: {}", e);
            ConfigError::IoError
        })?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// StoragePort
// ───────────────────────────────────────────────────────────────

impl StoragePort for NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.check()?;
        match self.store.borrow().get(&Self::composite_key(namespace, key)) {
            Some(data) if data.len() > buf.len() => Err(StorageError::Corrupted),
            Some(data) => {
                buf[..data.len()].copy_from_slice(data);
                Ok(data.len())
            }
            None => Err(StorageError::NotFound),
        }
    }

    #[cfg(target_os = "espidf")]
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let nvs = self.open(namespace)?;
        match nvs.get_raw(key, buf) {
            Ok(Some(data)) => Ok(data.len()),
            Ok(None) => Err(StorageError::NotFound),
            Err(e) => {
                warn!("NvsAdapter: read {}/{} failed: {}", namespace, key, e);
                Err(StorageError::IoError)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.check()?;
        self.store
            .borrow_mut()
            .insert(Self::composite_key(namespace, key), data.to_vec());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let mut nvs = self.open(namespace)?;
        nvs.set_raw(key, data).map(|_| ()).map_err(|e| {
            warn!("NvsAdapter: write {}/{} failed: {}", namespace, key, e);
            if e.code() == esp_idf_svc::sys::ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                StorageError::Full
            } else {
                StorageError::IoError
            }
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.store.borrow_mut().remove(&Self::composite_key(namespace, key));
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let mut nvs = self.open(namespace)?;
        nvs.remove(key).map(|_| ()).map_err(|e| {
            warn!("NvsAdapter: delete {}/{} failed: {}", namespace, key, e);
            StorageError::IoError
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.check().is_ok() && self.store.borrow().contains_key(&Self::composite_key(namespace, key))
    }

    #[cfg(target_os = "espidf")]
    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.open(namespace)
            .ok()
            .and_then(|nvs| nvs.contains(key).ok())
            .unwrap_or(false)
    }
}
