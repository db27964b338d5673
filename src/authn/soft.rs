//! A platform authenticator living on this host.
//!
//! Credentials are discoverable, encrypted at rest, and carry a random
//! hmac-secret seed. The PRF output for a credential is
//! `HMAC-SHA-256(seed, prf_to_hmac_salt(prf.eval.first))`, so one credential
//! under one salt always yields the same secret.

use std::sync::{Arc, Mutex, MutexGuard};

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use super::options::{
    Attachment, CreationOptions, RelyingParty, RequestOptions, UserVerification, prf_to_hmac_salt,
};
use super::{Assertion, Authenticator, AuthnError, CredentialId, HardwareSecret};
use crate::credentials::credential::RECORD_VERSION;
use crate::credentials::{CredentialRecord, CredentialStore};
use crate::uv::{self, UserVerified, UserVerifier};

type HmacSha256 = Hmac<Sha256>;

const CREDENTIAL_ID_LEN: usize = 16;
const PRF_SEED_LEN: usize = 32;

pub struct SoftAuthenticator<V> {
    rp: RelyingParty,
    credentials: Arc<Mutex<CredentialStore>>,
    verifier: V,
}

impl<V: UserVerifier> SoftAuthenticator<V> {
    pub fn new(rp: RelyingParty, credentials: Arc<Mutex<CredentialStore>>, verifier: V) -> Self {
        Self { rp, credentials, verifier }
    }

    fn store(&self) -> Result<MutexGuard<'_, CredentialStore>, AuthnError> {
        self.credentials
            .lock()
            .map_err(|_| AuthnError::Platform("credential store mutex poisoned".into()))
    }

    pub async fn make_credential(&self, opts: CreationOptions) -> Result<Assertion, AuthnError> {
        self.verifier.check_available()?;
        if !opts.alg_ok() {
            return Err(AuthnError::CreationFailed("ES256 not offered in pubKeyCredParams".into()));
        }
        if opts.user_verification != UserVerification::Required {
            return Err(AuthnError::CreationFailed("PRF needs userVerification: required".into()));
        }
        if opts.attachment == Some(Attachment::CrossPlatform) {
            return Err(AuthnError::UnsupportedCapability(
                "only a platform authenticator is available".into(),
            ));
        }

        let prompt = uv::prompt::enroll_prompt(&opts.rp, &opts.user.display_name);
        let proof = self.verifier.verify(&prompt, opts.timeout).await?;
        tracing::info!(rp = %opts.rp.id, "User verified for enrollment");

        let mut rng = rand::thread_rng();
        let mut credential_id = [0u8; CREDENTIAL_ID_LEN];
        rng.fill_bytes(&mut credential_id);
        let mut seed = vec![0u8; PRF_SEED_LEN];
        rng.fill_bytes(&mut seed);

        let created_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let secret = evaluate_prf(&seed, &opts.prf_first, &proof)?;
        let record = CredentialRecord {
            version: RECORD_VERSION,
            credential_id: credential_id.to_vec(),
            rp_id: opts.rp.id.clone(),
            rp_id_hash: opts.rp.id_hash().to_vec(),
            user_id: opts.user.id,
            user_name: opts.user.name,
            user_display: opts.user.display_name,
            prf_seed: Some(seed),
            created_at,
            discoverable: opts.require_resident_key,
        };
        self.store()?
            .add(record)
            .map_err(|e| AuthnError::CreationFailed(e.to_string()))?;

        let credential_id = CredentialId::new(credential_id.to_vec());
        tracing::info!(credential = %credential_id, "Credential created");
        Ok(Assertion { credential_id, secret })
    }

    pub async fn get_assertion(&self, opts: RequestOptions) -> Result<Assertion, AuthnError> {
        self.verifier.check_available()?;
        if opts.user_verification != UserVerification::Required {
            return Err(AuthnError::Platform("PRF needs userVerification: required".into()));
        }
        let rp_id_hash = self.rp.id_hash();

        let record = {
            let store = self.store()?;
            let found = if opts.allow_credentials.is_empty() {
                store.latest_for_rp(&rp_id_hash)
            } else {
                opts.allow_credentials
                    .iter()
                    .find_map(|id| store.get(id.as_bytes(), &rp_id_hash))
            };
            found.cloned().ok_or(AuthnError::NoCredential)?
        };

        let prompt = uv::prompt::assert_prompt(&opts.rp_id, &record.user_display);
        let proof = self.verifier.verify(&prompt, opts.timeout).await?;
        tracing::info!(credential = %record.id_hex(), "User verified for assertion");

        let seed = record.prf_seed.as_deref().ok_or(AuthnError::PrfUnavailable)?;
        Ok(Assertion {
            credential_id: CredentialId::new(record.credential_id.clone()),
            secret: evaluate_prf(seed, &opts.prf_first, &proof)?,
        })
    }

    /// Delete a credential so it can no longer answer assertions.
    pub fn remove_credential(&self, id: &CredentialId) -> Result<bool, AuthnError> {
        self.store()?
            .remove(id.as_bytes())
            .map_err(|e| AuthnError::Platform(e.to_string()))
    }
}

fn evaluate_prf(
    seed: &[u8],
    prf_input: &[u8; 32],
    _uv: &UserVerified,
) -> Result<HardwareSecret, AuthnError> {
    let mut mac = HmacSha256::new_from_slice(seed)
        .map_err(|e| AuthnError::Platform(format!("hmac-secret: {e}")))?;
    mac.update(&prf_to_hmac_salt(prf_input));
    Ok(HardwareSecret::new(mac.finalize().into_bytes().to_vec()))
}

#[async_trait::async_trait]
impl<V: UserVerifier> Authenticator for SoftAuthenticator<V> {
    async fn enroll(&self, label: &str) -> Result<Assertion, AuthnError> {
        self.make_credential(CreationOptions::for_label(&self.rp, label)).await
    }

    async fn assert(&self, known: Option<&CredentialId>) -> Result<Assertion, AuthnError> {
        self.get_assertion(RequestOptions::for_credential(&self.rp, known)).await
    }
}
