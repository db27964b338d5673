use std::time::Duration;

use super::{UserVerified, UserVerifier, UvPrompt};
use crate::authn::AuthnError;

/// Confirms through a pinentry dialog. Any answer other than OK counts as cancel.
#[derive(Debug, Clone)]
pub struct PinentryVerifier {
    binary: String,
}

impl PinentryVerifier {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

#[async_trait::async_trait]
impl UserVerifier for PinentryVerifier {
    fn check_available(&self) -> Result<(), AuthnError> {
        std::process::Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|_| ())
            .map_err(|e| {
                AuthnError::UnsupportedCapability(format!("pinentry '{}' unavailable: {e}", self.binary))
            })
    }

    async fn verify(&self, prompt: &UvPrompt, timeout: Duration) -> Result<UserVerified, AuthnError> {
        let title = prompt.title.clone();
        let description = prompt.description.clone();
        let bin = self.binary.clone();

        let join = tokio::task::spawn_blocking(move || {
            match pinentry::PassphraseInput::with_binary(&bin) {
                None => Err(pinentry::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "pinentry binary not found",
                ))),
                Some(mut input) => input
                    .with_title(&title)
                    .with_description(&description)
                    .with_ok("Confirm")
                    .with_cancel("Deny")
                    .interact()
                    .map(|_| ()),
            }
        });

        match tokio::time::timeout(timeout, join).await {
            Err(_) => {
                tracing::info!(timeout_secs = timeout.as_secs(), "User verification timed out");
                Err(AuthnError::UserCancelled)
            }
            Ok(Err(e)) => Err(AuthnError::Platform(format!("pinentry task failed: {e}"))),
            Ok(Ok(Err(pinentry::Error::Io(e)))) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AuthnError::UnsupportedCapability(e.to_string()))
            }
            Ok(Ok(Err(_))) => Err(AuthnError::UserCancelled),
            Ok(Ok(Ok(()))) => Ok(UserVerified { _private: () }),
        }
    }
}
