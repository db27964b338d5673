//! Durable slot for the session record.
//!
//! One JSON document per storage key, shaped
//! `{"state":{"privateKey":..,"walletAddress":..,"expiresAt":..,"credentialId":..},"version":0}`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::StoreError;

pub const ENVELOPE_VERSION: u32 = 0;

/// String-keyed item storage, like a browser's localStorage.
pub trait SessionStorage: Send {
    fn get_item(&self, name: &str) -> Result<Option<String>, StoreError>;
    fn set_item(&self, name: &str, value: &str) -> Result<(), StoreError>;
    fn remove_item(&self, name: &str) -> Result<(), StoreError>;
}

/// Wiped on drop: `private_key` holds the hex key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub private_key: Option<String>,
    pub wallet_address: Option<String>,
    pub expires_at: Option<u64>,
    pub credential_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<S> {
    state: S,
    version: u32,
}

pub(crate) fn encode(state: &PersistedState) -> Result<String, StoreError> {
    serde_json::to_string(&Envelope { state, version: ENVELOPE_VERSION })
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

pub(crate) fn decode(raw: &str) -> Result<PersistedState, StoreError> {
    let envelope: Envelope<PersistedState> =
        serde_json::from_str(raw).map_err(|e| StoreError::Serialization(e.to_string()))?;
    if envelope.version != ENVELOPE_VERSION {
        return Err(StoreError::Corrupt(format!("unknown envelope version {}", envelope.version)));
    }
    Ok(envelope.state)
}

/// One `<name>.json` file per item under `dir`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl SessionStorage for FileStorage {
    fn get_item(&self, name: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path(name)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, name: &str, value: &str) -> Result<(), StoreError> {
        // Readers see the old record or the new one, never a partial write.
        let path = self.path(name);
        let tmp = path.with_extension("json.tmp");
        write_private(&tmp, value.as_bytes())?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove_item(&self, name: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn write_private(path: &std::path::Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)
}

#[cfg(not(unix))]
fn write_private(path: &std::path::Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, bytes)
}

/// Process-local storage. Clones share the same items.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.items
            .lock()
            .map_err(|_| StoreError::Corrupt("memory storage mutex poisoned".into()))
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, name: &str) -> Result<Option<String>, StoreError> {
        Ok(self.items()?.get(name).cloned())
    }

    fn set_item(&self, name: &str, value: &str) -> Result<(), StoreError> {
        self.items()?.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, name: &str) -> Result<(), StoreError> {
        self.items()?.remove(name);
        Ok(())
    }
}
