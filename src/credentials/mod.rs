//! Encrypted on-disk credentials for the soft platform authenticator.

pub mod credential;
pub mod device_key;
pub mod disk;
pub mod index;

pub use credential::CredentialRecord;
pub use index::CredentialStore;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialize: {0}")]
    Serialization(String),
    #[error("Encrypt: {0}")]
    Encryption(String),
    #[error("Corrupt: {0}")]
    Corrupt(String),
}
