//! User verification in front of every PRF evaluation.

pub(crate) mod pinentry;
pub(crate) mod prompt;

pub use pinentry::PinentryVerifier;
pub use prompt::UvPrompt;

use std::time::Duration;

use crate::authn::AuthnError;

/// Proof that the user approved the current operation. PRF evaluation demands one.
pub struct UserVerified {
    pub(crate) _private: (),
}

impl UserVerified {
    /// Construct a proof for use in tests only.
    /// Do not use in production code: this bypasses user verification.
    #[doc(hidden)]
    pub fn test_only() -> Self {
        Self { _private: () }
    }
}

#[async_trait::async_trait]
pub trait UserVerifier: Send + Sync {
    /// Err(UnsupportedCapability) when this host cannot prompt at all.
    fn check_available(&self) -> Result<(), AuthnError>;

    async fn verify(&self, prompt: &UvPrompt, timeout: Duration) -> Result<UserVerified, AuthnError>;
}
