//! Assertion gateway: the seam between the key lifecycle and whatever platform
//! authenticator produces PRF secrets.

pub mod options;
pub mod simulated;
pub mod soft;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub use simulated::SimulatedAuthenticator;
pub use soft::SoftAuthenticator;

/// Label hashed into the application-wide PRF salt. Changing it changes every derived key.
pub const PRF_SALT_LABEL: &str = "OnRamp-Hackathon-Biometric-Salt-v1";

/// The fixed 32-byte salt sent as `prf.eval.first` on every enroll and assert.
pub fn prf_salt() -> [u8; 32] {
    Sha256::digest(PRF_SALT_LABEL.as_bytes()).into()
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthnError {
    #[error("platform authenticator unsupported: {0}")]
    UnsupportedCapability(String),
    #[error("user cancelled verification")]
    UserCancelled,
    #[error("credential creation failed: {0}")]
    CreationFailed(String),
    #[error("no matching credential")]
    NoCredential,
    #[error("authenticator returned no PRF secret")]
    PrfUnavailable,
    #[error("platform error: {0}")]
    Platform(String),
}

/// Opaque identifier of an enrolled credential. Hex on every text boundary.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CredentialId(Vec<u8>);

impl CredentialId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(s.trim_start_matches("0x")).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialId({})", self.to_hex())
    }
}

impl Serialize for CredentialId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CredentialId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// PRF output for one credential under [`prf_salt`]. Never persisted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HardwareSecret(Vec<u8>);

impl HardwareSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for HardwareSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HardwareSecret({} bytes)", self.0.len())
    }
}

/// What a successful enroll or assert hands back.
#[derive(Debug, Clone)]
pub struct Assertion {
    pub credential_id: CredentialId,
    pub secret: HardwareSecret,
}

/// Platform authenticator capability. Implementations hold no session state.
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    /// Create a new discoverable credential bound to `label` and evaluate the PRF on it.
    async fn enroll(&self, label: &str) -> Result<Assertion, AuthnError>;

    /// Authenticate. With `known` set, only that credential may answer.
    async fn assert(&self, known: Option<&CredentialId>) -> Result<Assertion, AuthnError>;
}

#[async_trait::async_trait]
impl<A: Authenticator + ?Sized> Authenticator for std::sync::Arc<A> {
    async fn enroll(&self, label: &str) -> Result<Assertion, AuthnError> {
        (**self).enroll(label).await
    }

    async fn assert(&self, known: Option<&CredentialId>) -> Result<Assertion, AuthnError> {
        (**self).assert(known).await
    }
}
