//! Broker / network credential record.
//!
//! The record is written by the provisioning collaborator and read here at
//! boot.  [`CredentialStore::commit`] writes the record and then adopts the
//! value decoded back from storage, so the credentials in memory are always
//! the ones a reboot would see.

use log::{info, warn};

use super::ports::{ConfigError, StorageError, StoragePort};
use crate::config::BrokerCredentials;

pub const CRED_NAMESPACE: &str = "auth";
const CRED_KEY: &str = "broker";
const MAX_RECORD_LEN: usize = 512;

pub struct CredentialStore<K: StoragePort> {
    storage: K,
    current: Option<BrokerCredentials>,
}

impl<K: StoragePort> CredentialStore<K> {
    pub fn new(storage: K) -> Self {
        Self { storage, current: None }
    }

    /// Read the persisted record.  A missing or invalid record leaves the
    /// store empty.
    pub fn load(&mut self) -> Result<Option<&BrokerCredentials>, ConfigError> {
        let loaded = match self.read_back() {
            Ok(creds) => {
                info!("Credentials: loaded (ssid='{}', broker={})", creds.wifi_ssid, creds.broker_host);
                Some(creds)
            }
            Err(ConfigError::NotFound) => {
                info!("Credentials: none stored");
                None
            }
            Err(e) => {
                warn!("Credentials: stored record unusable: {}", e);
                self.current = None;
                return Err(e);
            }
        };
        self.current = loaded;
        Ok(self.current.as_ref())
    }

    /// Validate, persist, and adopt the persisted value.
    pub fn commit(&mut self, creds: &BrokerCredentials) -> Result<&BrokerCredentials, ConfigError> {
        creds.validate()?;
        let bytes = serde_json::to_vec(creds).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_RECORD_LEN {
            return Err(ConfigError::ValidationFailed("credential record too large"));
        }
        self.storage
            .write(CRED_NAMESPACE, CRED_KEY, &bytes)
            .map_err(|_| ConfigError::IoError)?;

        let stored = self.read_back()?;
        if &stored != creds {
            warn!("Credentials: read-back differs from committed record");
            return Err(ConfigError::Corrupted);
        }
        info!("Credentials: committed (ssid='{}')", stored.wifi_ssid);
        Ok(self.current.insert(stored))
    }

    /// Remove the record.  The in-memory copy is dropped even if the
    /// delete fails.
    pub fn erase(&mut self) -> Result<(), StorageError> {
        self.current = None;
        self.storage.delete(CRED_NAMESPACE, CRED_KEY)?;
        info!("Credentials: erased");
        Ok(())
    }

    pub fn get(&self) -> Option<&BrokerCredentials> {
        self.current.as_ref()
    }

    fn read_back(&self) -> Result<BrokerCredentials, ConfigError> {
        let mut buf = [0u8; MAX_RECORD_LEN];
        let len = match self.storage.read(CRED_NAMESPACE, CRED_KEY, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => return Err(ConfigError::NotFound),
            Err(_) => return Err(ConfigError::IoError),
        };
        let creds: BrokerCredentials =
            serde_json::from_slice(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
        creds.validate()?;
        Ok(creds)
    }
}
