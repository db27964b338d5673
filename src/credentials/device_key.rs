use rand::RngCore;
use std::path::Path;

use super::CredentialError;

/// Load the 32-byte key that encrypts credential files, creating it on first use.
pub fn load_or_create(path: &Path) -> Result<[u8; 32], CredentialError> {
    if path.exists() {
        let bytes = std::fs::read(path)?;
        return bytes
            .as_slice()
            .try_into()
            .map_err(|_| CredentialError::Corrupt(format!("{} is not 32 bytes", path.display())));
    }

    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    write_private(path, &key)?;
    tracing::info!(path = %path.display(), "Created device key");
    Ok(key)
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> Result<(), CredentialError> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = std::fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> Result<(), CredentialError> {
    std::fs::write(path, bytes)?;
    Ok(())
}
