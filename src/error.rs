use crate::authn::AuthnError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported platform: {0}")]
    UnsupportedCapability(String),
    #[error("user cancelled verification")]
    UserCancelled,
    #[error("credential creation failed: {0}")]
    CreationFailed(String),
    #[error("assertion failed: {0}")]
    Assertion(AuthnError),
    #[error("key derivation failed: {0}")]
    DerivationFailed(#[from] crate::derive::DeriveError),
    #[error("Key store: {0}")]
    Store(#[from] crate::keystore::StoreError),
    #[error("Credentials: {0}")]
    Credentials(#[from] crate::credentials::CredentialError),
    #[error("{0}")]
    Internal(String),
}

impl From<AuthnError> for Error {
    fn from(e: AuthnError) -> Self {
        match e {
            AuthnError::UnsupportedCapability(msg) => Self::UnsupportedCapability(msg),
            AuthnError::UserCancelled => Self::UserCancelled,
            AuthnError::CreationFailed(msg) => Self::CreationFailed(msg),
            other => Self::Assertion(other),
        }
    }
}

impl Error {
    /// Fold a failed enrollment. Never yields `Assertion`.
    pub fn from_enrollment(e: AuthnError) -> Self {
        match e {
            AuthnError::UnsupportedCapability(msg) => Self::UnsupportedCapability(msg),
            AuthnError::PrfUnavailable => {
                Self::UnsupportedCapability("authenticator created a credential without PRF output".into())
            }
            AuthnError::UserCancelled => Self::UserCancelled,
            AuthnError::CreationFailed(msg) | AuthnError::Platform(msg) => Self::CreationFailed(msg),
            AuthnError::NoCredential => Self::CreationFailed(AuthnError::NoCredential.to_string()),
        }
    }

    /// Whether repeating the same user action can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UserCancelled | Self::CreationFailed(_) | Self::Assertion(_))
    }

    /// Short message for the person at the keyboard.
    pub fn user_message(&self) -> String {
        match self {
            Self::UnsupportedCapability(_) => {
                "This device doesn't support biometric key derivation (PRF). Use a supported platform authenticator.".into()
            }
            Self::UserCancelled => "Verification cancelled. Try again.".into(),
            Self::CreationFailed(_) => "Couldn't create a credential on this device. Try again.".into(),
            Self::Assertion(_) => "Couldn't verify with your authenticator. Try again.".into(),
            Self::DerivationFailed(_) => {
                "This credential can't produce a valid key. Forget this device and enroll again.".into()
            }
            Self::Store(e) => format!("Local session storage failed: {e}"),
            Self::Credentials(e) => format!("Local credential storage failed: {e}"),
            Self::Internal(e) => format!("Internal error: {e}"),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
