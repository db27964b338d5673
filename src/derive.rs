//! Hardware secret to secp256k1 signing key, and the key's Ethereum address.
//!
//! The transform is pure: normalise the secret to 32 bytes (truncate or
//! right-pad with zeros), read it as a big-endian integer, reduce modulo the
//! curve order, and reject zero. No randomness enters, so the same PRF output
//! always yields the same key.

use std::fmt;

use k256::ecdsa::SigningKey;
use k256::elliptic_curve::ops::Reduce;
use k256::{FieldBytes, Scalar, U256};
use sha3::{Digest, Keccak256};
use zeroize::Zeroizing;

use crate::authn::HardwareSecret;

/// secp256k1 private keys are 32-byte big-endian scalars.
pub const KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum DeriveError {
    #[error("secret reduces to zero modulo the curve order")]
    ZeroScalar,
    #[error("secret is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("key rejected by curve: {0}")]
    InvalidKey(String),
}

/// A derived private key in `[1, n-1]`. Wiped on drop.
#[derive(Clone)]
pub struct DerivedKey(Zeroizing<[u8; KEY_LEN]>);

impl DerivedKey {
    /// Accept already-derived key bytes, e.g. from persisted state. Same range check as derivation.
    pub fn from_bytes(bytes: &[u8; KEY_LEN]) -> Result<Self, DeriveError> {
        let key = Self(Zeroizing::new(*bytes));
        key.signing_key()?;
        Ok(key)
    }

    pub fn from_hex(s: &str) -> Result<Self, DeriveError> {
        let raw = Zeroizing::new(hex::decode(s.trim_start_matches("0x"))?);
        let bytes: [u8; KEY_LEN] = raw
            .as_slice()
            .try_into()
            .map_err(|_| DeriveError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", raw.len())))?;
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// `0x`-prefixed lowercase hex, the persisted and exported form.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("0x{}", hex::encode(*self.0)))
    }

    pub fn signing_key(&self) -> Result<SigningKey, DeriveError> {
        SigningKey::from_bytes(FieldBytes::from_slice(self.0.as_slice()))
            .map_err(|e| DeriveError::InvalidKey(e.to_string()))
    }

    pub fn address(&self) -> Result<Address, DeriveError> {
        Ok(Address::of(&self.signing_key()?))
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

impl PartialEq for DerivedKey {
    fn eq(&self, other: &Self) -> bool {
        *self.0 == *other.0
    }
}

impl Eq for DerivedKey {}

/// Truncate or right-pad with zero bytes to exactly [`KEY_LEN`].
pub fn normalize(secret: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    let len = secret.len().min(KEY_LEN);
    out[..len].copy_from_slice(&secret[..len]);
    out
}

pub fn derive(secret: &HardwareSecret) -> Result<DerivedKey, DeriveError> {
    derive_bytes(secret.as_bytes())
}

pub fn derive_bytes(secret: &[u8]) -> Result<DerivedKey, DeriveError> {
    let normalized = normalize(secret);
    // 2^256 < 2n, so one reduction of a 256-bit value is the full `mod n`.
    let scalar = <Scalar as Reduce<U256>>::reduce_bytes(FieldBytes::from_slice(normalized.as_slice()));
    if bool::from(scalar.is_zero()) {
        return Err(DeriveError::ZeroScalar);
    }
    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    out.copy_from_slice(scalar.to_bytes().as_slice());
    Ok(DerivedKey(out))
}

/// Derive from a hex-encoded secret, normalising by decoded length.
pub fn derive_from_hex(secret_hex: &str) -> Result<DerivedKey, DeriveError> {
    let raw = Zeroizing::new(hex::decode(secret_hex.trim_start_matches("0x"))?);
    derive_bytes(&raw)
}

/// 20-byte Ethereum address: last 20 bytes of Keccak-256 over the uncompressed public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 20]);

impl Address {
    pub fn of(key: &SigningKey) -> Self {
        let point = key.verifying_key().to_encoded_point(false);
        let hash = Keccak256::digest(&point.as_bytes()[1..]);
        let mut out = [0u8; 20];
        out.copy_from_slice(&hash[12..]);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// EIP-55 mixed-case checksum encoding with `0x` prefix.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = Keccak256::digest(lower.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> if i % 2 == 0 { 4 } else { 0 }) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Parse a `0x`-prefixed or bare hex address. Checksum case is not enforced.
    pub fn parse(s: &str) -> Result<Self, DeriveError> {
        let raw = hex::decode(s.trim_start_matches("0x"))?;
        let bytes: [u8; 20] = raw
            .as_slice()
            .try_into()
            .map_err(|_| DeriveError::InvalidKey(format!("address must be 20 bytes, got {}", raw.len())))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}
