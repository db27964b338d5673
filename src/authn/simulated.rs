//! Scripted authenticator for tests and demos.
//!
//! Each enrolled credential gets a random id and a PRF secret that is a pure
//! function of that id, so asserting the same credential twice yields the same
//! secret. Failures can be queued per operation and are consumed in order.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rand::RngCore;
use sha2::{Digest, Sha256};

use super::{Assertion, Authenticator, AuthnError, CredentialId, HardwareSecret, prf_salt};

#[derive(Default)]
struct SimState {
    credentials: Vec<(CredentialId, Vec<u8>)>,
    assert_failures: VecDeque<AuthnError>,
    enroll_failures: VecDeque<AuthnError>,
}

#[derive(Default)]
pub struct SimulatedAuthenticator {
    state: Mutex<SimState>,
    enroll_calls: AtomicUsize,
    assert_calls: AtomicUsize,
    delay: Option<Duration>,
}

impl SimulatedAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-enroll a credential with an explicit secret.
    pub fn with_credential(self, id: CredentialId, secret: impl Into<Vec<u8>>) -> Self {
        self.lock().credentials.push((id, secret.into()));
        self
    }

    /// Hold every prompt open for `delay`, like a user taking time at the biometric sensor.
    pub fn with_prompt_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_next_assert(&self, err: AuthnError) {
        self.lock().assert_failures.push_back(err);
    }

    pub fn fail_next_enroll(&self, err: AuthnError) {
        self.lock().enroll_failures.push_back(err);
    }

    pub fn enroll_calls(&self) -> usize {
        self.enroll_calls.load(Ordering::SeqCst)
    }

    pub fn assert_calls(&self) -> usize {
        self.assert_calls.load(Ordering::SeqCst)
    }

    pub fn credential_ids(&self) -> Vec<CredentialId> {
        self.lock().credentials.iter().map(|(id, _)| id.clone()).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        // Test double: a poisoned lock means a test already panicked.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    async fn prompt(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn secret_for(id: &CredentialId) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(id.as_bytes());
        hasher.update(prf_salt());
        hasher.finalize().to_vec()
    }
}

#[async_trait::async_trait]
impl Authenticator for SimulatedAuthenticator {
    async fn enroll(&self, label: &str) -> Result<Assertion, AuthnError> {
        self.enroll_calls.fetch_add(1, Ordering::SeqCst);
        self.prompt().await;
        let mut state = self.lock();
        if let Some(err) = state.enroll_failures.pop_front() {
            return Err(err);
        }
        let mut raw = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut raw);
        let id = CredentialId::new(raw.to_vec());
        let secret = Self::secret_for(&id);
        state.credentials.push((id.clone(), secret.clone()));
        tracing::debug!(credential = %id, label, "simulated enroll");
        Ok(Assertion { credential_id: id, secret: HardwareSecret::new(secret) })
    }

    async fn assert(&self, known: Option<&CredentialId>) -> Result<Assertion, AuthnError> {
        self.assert_calls.fetch_add(1, Ordering::SeqCst);
        self.prompt().await;
        let mut state = self.lock();
        if let Some(err) = state.assert_failures.pop_front() {
            return Err(err);
        }
        let found = match known {
            Some(id) => state.credentials.iter().find(|(c, _)| c == id),
            None => state.credentials.last(),
        };
        let (id, secret) = found.ok_or(AuthnError::NoCredential)?;
        Ok(Assertion {
            credential_id: id.clone(),
            secret: HardwareSecret::new(secret.clone()),
        })
    }
}
