//! The ephemeral key store.
//!
//! Holds at most one derived key with its address, the credential it came
//! from, and an absolute expiry. The expiry is drawn uniformly from
//! `[MIN_TTL, MAX_TTL)` on every write and never extended by reads. A read at
//! or past the expiry clears the key (keeping the credential id) and returns
//! nothing. Persisted state gets the same check on load, before it is trusted.

pub mod clock;
pub mod persist;
pub mod watch;

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::authn::CredentialId;
use crate::derive::{Address, DeriveError, DerivedKey};
use clock::Clock;
use persist::{PersistedState, SessionStorage};

pub use clock::{ManualClock, SystemClock};
pub use persist::{FileStorage, MemoryStorage};
pub use watch::{ExpiryWatch, format_countdown, spawn_expiry_watch};

/// Well-known storage key for the session record.
pub const STORAGE_KEY: &str = "biokey-session";
pub const MIN_TTL: Duration = Duration::from_secs(5 * 60);
pub const MAX_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialize: {0}")]
    Serialization(String),
    #[error("Corrupt: {0}")]
    Corrupt(String),
    #[error("invalid TTL window {min:?}..{max:?}")]
    InvalidTtl { min: Duration, max: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    min: Duration,
    max: Duration,
}

impl TtlPolicy {
    pub fn new(min: Duration, max: Duration) -> Result<Self, StoreError> {
        if min.is_zero() || min > max {
            return Err(StoreError::InvalidTtl { min, max });
        }
        Ok(Self { min, max })
    }

    /// Uniform over `[min, max)`, in whole milliseconds.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let (lo, hi) = (self.min.as_millis() as u64, self.max.as_millis() as u64);
        if lo == hi {
            return self.min;
        }
        Duration::from_millis(rng.gen_range(lo..hi))
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self { min: MIN_TTL, max: MAX_TTL }
    }
}

/// An unlocked key. Handed out by reference while valid; clones are the caller's to guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    key: DerivedKey,
    address: Address,
    credential_id: CredentialId,
    expires_at: u64,
}

impl SessionRecord {
    pub fn key(&self) -> &DerivedKey {
        &self.key
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn credential_id(&self) -> &CredentialId {
        &self.credential_id
    }

    /// Absolute expiry, milliseconds since the Unix epoch.
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    pub fn signing_key(&self) -> Result<k256::ecdsa::SigningKey, DeriveError> {
        self.key.signing_key()
    }

    /// What an external signer or broadcaster consumes.
    pub fn handoff(&self) -> KeyHandoff {
        KeyHandoff {
            signing_key: self.key.to_hex().to_string(),
            address: self.address.to_checksum(),
            credential_id: self.credential_id.to_hex(),
            expires_at: self.expires_at,
        }
    }
}

#[derive(Debug, Serialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct KeyHandoff {
    pub signing_key: String,
    pub address: String,
    pub credential_id: String,
    pub expires_at: u64,
}

#[derive(Debug)]
enum KeyState {
    Empty,
    Active(SessionRecord),
}

pub struct KeyStore {
    state: KeyState,
    credential_id: Option<CredentialId>,
    storage: Box<dyn SessionStorage>,
    clock: Arc<dyn Clock>,
    ttl: TtlPolicy,
}

impl KeyStore {
    /// Restore from `storage`, discarding a persisted key that is expired or unusable.
    pub fn load(storage: Box<dyn SessionStorage>, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let mut store = Self {
            state: KeyState::Empty,
            credential_id: None,
            storage,
            clock,
            ttl: TtlPolicy::default(),
        };

        let Some(raw) = store.storage.get_item(STORAGE_KEY)? else {
            return Ok(store);
        };
        let persisted = match persist::decode(&raw) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping unreadable session record");
                store.storage.remove_item(STORAGE_KEY)?;
                return Ok(store);
            }
        };

        store.credential_id = persisted
            .credential_id
            .as_deref()
            .and_then(|s| CredentialId::from_hex(s).ok());

        match store.restore(&persisted) {
            Ok(Some(record)) => {
                tracing::info!(
                    address = %record.address,
                    remaining_ms = record.expires_at.saturating_sub(store.clock.now_ms()),
                    "Session key restored"
                );
                store.state = KeyState::Active(record);
            }
            Ok(None) => {}
            Err(reason) => {
                tracing::info!(reason, "Discarding persisted session key");
                store.save(None)?;
            }
        }
        Ok(store)
    }

    pub fn with_ttl(mut self, ttl: TtlPolicy) -> Self {
        self.ttl = ttl;
        self
    }

    fn restore(&self, p: &PersistedState) -> Result<Option<SessionRecord>, &'static str> {
        let Some(key_hex) = p.private_key.as_deref() else {
            if p.wallet_address.is_some() || p.expires_at.is_some() {
                return Err("partial record");
            }
            return Ok(None);
        };
        let expires_at = p.expires_at.ok_or("key without expiry")?;
        if self.clock.now_ms() >= expires_at {
            return Err("expired");
        }
        let credential_id = self.credential_id.clone().ok_or("key without credential")?;
        let key = DerivedKey::from_hex(key_hex).map_err(|_| "unparseable key")?;
        let address = key.address().map_err(|_| "unparseable key")?;
        let stored = p.wallet_address.as_deref().map(Address::parse);
        if !matches!(stored, Some(Ok(a)) if a == address) {
            return Err("address mismatch");
        }
        Ok(Some(SessionRecord { key, address, credential_id, expires_at }))
    }

    fn save(&self, record: Option<&SessionRecord>) -> Result<(), StoreError> {
        let credential_id = record.map(|r| &r.credential_id).or(self.credential_id.as_ref());
        let state = PersistedState {
            private_key: record.map(|r| r.key.to_hex().to_string()),
            wallet_address: record.map(|r| r.address.to_checksum()),
            expires_at: record.map(|r| r.expires_at),
            credential_id: credential_id.map(CredentialId::to_hex),
        };
        let mut encoded = persist::encode(&state)?;
        let result = self.storage.set_item(STORAGE_KEY, &encoded);
        encoded.zeroize();
        result
    }

    /// Store a freshly derived key. Always starts a new TTL window.
    pub fn write(
        &mut self,
        key: DerivedKey,
        address: Address,
        credential_id: CredentialId,
    ) -> Result<SessionRecord, StoreError> {
        let ttl = self.ttl.sample(&mut rand::thread_rng());
        let record = SessionRecord {
            key,
            address,
            credential_id,
            expires_at: self.clock.now_ms() + ttl.as_millis() as u64,
        };
        self.save(Some(&record))?;
        tracing::info!(
            address = %record.address,
            credential = %record.credential_id,
            ttl_secs = ttl.as_secs(),
            "Session key stored"
        );
        self.credential_id = Some(record.credential_id.clone());
        self.state = KeyState::Active(record.clone());
        Ok(record)
    }

    /// The live record, or None. Expires the key first if its time is up.
    pub fn read(&mut self) -> Result<Option<&SessionRecord>, StoreError> {
        self.expire_if_due()?;
        Ok(match &self.state {
            KeyState::Active(record) => Some(record),
            KeyState::Empty => None,
        })
    }

    /// Clear an expired key. Returns true if one was cleared.
    pub fn expire_if_due(&mut self) -> Result<bool, StoreError> {
        let due = matches!(&self.state, KeyState::Active(r) if self.clock.now_ms() >= r.expires_at);
        if due {
            self.clear_key_only()?;
            tracing::info!("Session key expired");
        }
        Ok(due)
    }

    /// Forget the key but keep the credential id for the next assertion.
    pub fn clear_key_only(&mut self) -> Result<(), StoreError> {
        self.save(None)?;
        self.state = KeyState::Empty;
        Ok(())
    }

    /// Forget everything, including which credential to assert against.
    pub fn clear_all(&mut self) -> Result<(), StoreError> {
        self.storage.remove_item(STORAGE_KEY)?;
        self.state = KeyState::Empty;
        self.credential_id = None;
        Ok(())
    }

    /// Time left on the active key, zero once due. Does not clear anything.
    pub fn remaining_ttl(&self) -> Option<Duration> {
        match &self.state {
            KeyState::Active(r) => Some(Duration::from_millis(
                r.expires_at.saturating_sub(self.clock.now_ms()),
            )),
            KeyState::Empty => None,
        }
    }

    pub fn credential_id(&self) -> Option<&CredentialId> {
        self.credential_id.as_ref()
    }
}
