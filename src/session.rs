//! Session orchestrator: decides, per key request, between the cached key,
//! an assertion against the remembered credential, and a fresh enrollment.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::authn::{Authenticator, AuthnError, CredentialId};
use crate::derive::{self, Address};
use crate::error::{Error, Result};
use crate::keystore::{KeyStore, SessionRecord, StoreError, format_countdown};

/// When a failed assertion falls through to enrolling a new credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Any assertion failure enrolls.
    #[default]
    Always,
    /// Only a missing credential or missing PRF output enrolls; cancellations
    /// and platform errors are surfaced so a transient fault never mints a
    /// duplicate credential.
    OnlyWhenAbsent,
}

impl FallbackPolicy {
    fn should_enroll(self, err: &AuthnError) -> bool {
        match self {
            Self::Always => true,
            Self::OnlyWhenAbsent => {
                matches!(err, AuthnError::NoCredential | AuthnError::PrfUnavailable)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Cached,
    Asserted,
    Enrolled,
}

#[derive(Debug, Clone)]
pub struct Unlocked {
    pub record: SessionRecord,
    pub source: KeySource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub address: Option<Address>,
    pub remaining: Option<Duration>,
    pub credential_id: Option<CredentialId>,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address {
            Some(address) => write!(f, "Unlocked {address} ({} left)", format_countdown(self.remaining)),
            None => f.write_str("Ready"),
        }
    }
}

pub struct Session<A> {
    authenticator: A,
    store: Arc<Mutex<KeyStore>>,
    label: String,
    policy: FallbackPolicy,
    prompt_gate: tokio::sync::Mutex<()>,
}

impl<A: Authenticator> Session<A> {
    pub fn new(authenticator: A, store: KeyStore, label: impl Into<String>) -> Self {
        Self {
            authenticator,
            store: Arc::new(Mutex::new(store)),
            label: label.into(),
            policy: FallbackPolicy::default(),
            prompt_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> Arc<Mutex<KeyStore>> {
        Arc::clone(&self.store)
    }

    pub fn authenticator(&self) -> &A {
        &self.authenticator
    }

    fn with_store<T>(&self, f: impl FnOnce(&mut KeyStore) -> Result<T, StoreError>) -> Result<T> {
        let mut guard = self
            .store
            .lock()
            .map_err(|_| Error::Internal("key store mutex poisoned".into()))?;
        Ok(f(&mut guard)?)
    }

    /// Return a usable key, prompting the authenticator only when the cache is empty.
    ///
    /// Calls are serialized: a second caller waits for the first prompt to
    /// finish and then usually finds the key cached.
    pub async fn obtain_key(&self) -> Result<Unlocked> {
        let _turn = self.prompt_gate.lock().await;

        if let Some(record) = self.with_store(|s| Ok(s.read()?.cloned()))? {
            tracing::debug!(address = %record.address(), "Using cached session key");
            return Ok(Unlocked { record, source: KeySource::Cached });
        }

        let known = self.with_store(|s| Ok(s.credential_id().cloned()))?;
        let (assertion, source) = match self.authenticator.assert(known.as_ref()).await {
            Ok(assertion) => (assertion, KeySource::Asserted),
            Err(e) if self.policy.should_enroll(&e) => {
                tracing::info!(error = %e, "Assertion failed, enrolling a new credential");
                let assertion = self
                    .authenticator
                    .enroll(&self.label)
                    .await
                    .map_err(Error::from_enrollment)?;
                (assertion, KeySource::Enrolled)
            }
            Err(e) => return Err(e.into()),
        };

        match &known {
            Some(prev) if *prev != assertion.credential_id => tracing::info!(
                previous = %prev,
                current = %assertion.credential_id,
                "Credential id changed"
            ),
            None => tracing::info!(current = %assertion.credential_id, "Credential id learned"),
            _ => {}
        }

        let key = derive::derive(&assertion.secret)?;
        let address = key.address()?;
        let credential_id = assertion.credential_id;
        let record = self.with_store(move |s| s.write(key, address, credential_id))?;
        Ok(Unlocked { record, source })
    }

    /// The live key, if any, without prompting.
    pub fn current(&self) -> Result<Option<SessionRecord>> {
        self.with_store(|s| Ok(s.read()?.cloned()))
    }

    pub fn status(&self) -> Result<Status> {
        self.with_store(|s| {
            let record = s.read()?.cloned();
            Ok(Status {
                address: record.as_ref().map(SessionRecord::address),
                remaining: s.remaining_ttl(),
                credential_id: s.credential_id().cloned(),
            })
        })
    }

    /// Log out: drop the key, remember the credential.
    pub fn lock(&self) -> Result<()> {
        self.with_store(KeyStore::clear_key_only)
    }

    /// Forget this device entirely. Returns the credential id that was remembered.
    pub fn forget(&self) -> Result<Option<CredentialId>> {
        self.with_store(|s| {
            let previous = s.credential_id().cloned();
            s.clear_all()?;
            Ok(previous)
        })
    }
}
