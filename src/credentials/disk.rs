use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

use super::{CredentialError, CredentialRecord};

/// File layout: MAGIC || nonce(12) || AES-256-GCM(CBOR(record)), MAGIC bound as AAD.
pub const MAGIC: &[u8; 4] = b"BKC1";
const NONCE_LEN: usize = 12;
const EXTENSION: &str = "cred";

pub fn record_path(dir: &Path, credential_id: &[u8]) -> PathBuf {
    dir.join(format!("{}.{EXTENSION}", hex::encode(credential_id)))
}

fn cipher(key: &[u8; 32]) -> Result<Aes256Gcm, CredentialError> {
    Aes256Gcm::new_from_slice(key).map_err(|e| CredentialError::Encryption(e.to_string()))
}

pub(crate) fn seal(key: &[u8; 32], record: &CredentialRecord) -> Result<Vec<u8>, CredentialError> {
    let mut body = Zeroizing::new(Vec::new());
    ciborium::into_writer(record, &mut *body)
        .map_err(|e| CredentialError::Serialization(e.to_string()))?;

    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher(key)?
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: body.as_slice(), aad: MAGIC })
        .map_err(|e| CredentialError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(MAGIC.len() + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub(crate) fn open(key: &[u8; 32], bytes: &[u8]) -> Result<CredentialRecord, CredentialError> {
    let rest = bytes
        .strip_prefix(MAGIC.as_slice())
        .ok_or_else(|| CredentialError::Corrupt("bad magic".into()))?;
    if rest.len() < NONCE_LEN {
        return Err(CredentialError::Corrupt("file too short".into()));
    }
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
    let body = Zeroizing::new(
        cipher(key)?
            .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad: MAGIC })
            .map_err(|e| CredentialError::Encryption(e.to_string()))?,
    );
    ciborium::from_reader(body.as_slice()).map_err(|e| CredentialError::Serialization(e.to_string()))
}

pub(crate) fn write_record(
    key: &[u8; 32],
    dir: &Path,
    record: &CredentialRecord,
) -> Result<(), CredentialError> {
    let sealed = seal(key, record)?;
    std::fs::write(record_path(dir, &record.credential_id), sealed)?;
    Ok(())
}

pub(crate) fn delete_record(dir: &Path, credential_id: &[u8]) -> Result<(), CredentialError> {
    std::fs::remove_file(record_path(dir, credential_id))?;
    Ok(())
}

/// Every readable record in `dir`. Unreadable files are logged and skipped.
pub(crate) fn load_all(key: &[u8; 32], dir: &Path) -> Result<Vec<CredentialRecord>, CredentialError> {
    let mut records = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(records),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            continue;
        }
        match std::fs::read(&path).map_err(CredentialError::from).and_then(|b| open(key, &b)) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable credential"),
        }
    }
    Ok(records)
}
