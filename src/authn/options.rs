use std::time::Duration;

use sha2::{Digest, Sha256};

use super::{CredentialId, prf_salt};
use crate::config::UV_TIMEOUT_SECS;

pub const COSE_ES256: i64 = -7;
pub const COSE_RS256: i64 = -257;

/// Domain separator WebAuthn prepends before hashing a PRF input into an hmac-secret salt.
const PRF_CONTEXT: &[u8] = b"WebAuthn PRF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Platform,
    CrossPlatform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserVerification {
    Required,
    Preferred,
    Discouraged,
}

#[derive(Debug, Clone)]
pub struct RelyingParty {
    pub id: String,
    pub name: String,
}

impl RelyingParty {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }

    pub fn id_hash(&self) -> [u8; 32] {
        Sha256::digest(self.id.as_bytes()).into()
    }
}

#[derive(Debug, Clone)]
pub struct UserEntity {
    pub id: Vec<u8>,
    pub name: String,
    pub display_name: String,
}

/// `navigator.credentials.create` shaped options.
#[derive(Debug, Clone)]
pub struct CreationOptions {
    pub rp: RelyingParty,
    pub user: UserEntity,
    pub pub_key_cred_params: Vec<i64>,
    pub timeout: Duration,
    pub attachment: Option<Attachment>,
    pub user_verification: UserVerification,
    pub require_resident_key: bool,
    pub prf_first: [u8; 32],
}

impl CreationOptions {
    /// Options every enrollment uses: ES256/RS256, platform attachment, resident key,
    /// required verification, PRF under the application salt.
    pub fn for_label(rp: &RelyingParty, label: &str) -> Self {
        Self {
            rp: rp.clone(),
            user: UserEntity {
                id: label.as_bytes().to_vec(),
                name: label.to_string(),
                display_name: label.to_string(),
            },
            pub_key_cred_params: vec![COSE_ES256, COSE_RS256],
            timeout: Duration::from_secs(UV_TIMEOUT_SECS),
            attachment: Some(Attachment::Platform),
            user_verification: UserVerification::Required,
            require_resident_key: true,
            prf_first: prf_salt(),
        }
    }

    pub fn alg_ok(&self) -> bool {
        self.pub_key_cred_params.contains(&COSE_ES256)
    }
}

/// `navigator.credentials.get` shaped options.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub rp_id: String,
    pub allow_credentials: Vec<CredentialId>,
    pub timeout: Duration,
    pub user_verification: UserVerification,
    pub prf_first: [u8; 32],
}

impl RequestOptions {
    /// An empty allow list lets the platform pick any discoverable credential.
    pub fn for_credential(rp: &RelyingParty, known: Option<&CredentialId>) -> Self {
        Self {
            rp_id: rp.id.clone(),
            allow_credentials: known.cloned().into_iter().collect(),
            timeout: Duration::from_secs(UV_TIMEOUT_SECS),
            user_verification: UserVerification::Required,
            prf_first: prf_salt(),
        }
    }
}

/// Map a PRF input to the salt an hmac-secret capable authenticator evaluates.
pub fn prf_to_hmac_salt(input: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(PRF_CONTEXT);
    hasher.update([0x00]);
    hasher.update(input);
    hasher.finalize().into()
}
