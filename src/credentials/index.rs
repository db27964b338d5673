use std::path::PathBuf;

use super::{CredentialError, CredentialRecord, disk};

/// In-memory view of the credential directory; every mutation goes to disk first.
pub struct CredentialStore {
    key: [u8; 32],
    dir: PathBuf,
    records: Vec<CredentialRecord>,
}

impl CredentialStore {
    pub fn load(key: [u8; 32], dir: PathBuf) -> Result<Self, CredentialError> {
        let mut records = disk::load_all(&key, &dir)?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Self { key, dir, records })
    }

    pub fn add(&mut self, record: CredentialRecord) -> Result<(), CredentialError> {
        disk::write_record(&self.key, &self.dir, &record)?;
        self.records.retain(|r| r.credential_id != record.credential_id);
        self.records.insert(0, record);
        self.records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(())
    }

    /// Allow-list lookup: the id must belong to `rp_id_hash`.
    pub fn get(&self, credential_id: &[u8], rp_id_hash: &[u8]) -> Option<&CredentialRecord> {
        self.records
            .iter()
            .find(|r| r.credential_id == credential_id && r.rp_id_hash == rp_id_hash)
    }

    /// Discoverable lookup: most recently created resident credential for the RP.
    pub fn latest_for_rp(&self, rp_id_hash: &[u8]) -> Option<&CredentialRecord> {
        self.records
            .iter()
            .find(|r| r.discoverable && r.rp_id_hash == rp_id_hash)
    }

    pub fn remove(&mut self, credential_id: &[u8]) -> Result<bool, CredentialError> {
        let Some(pos) = self.records.iter().position(|r| r.credential_id == credential_id) else {
            return Ok(false);
        };
        disk::delete_record(&self.dir, credential_id)?;
        self.records.remove(pos);
        Ok(true)
    }

    pub fn credential_count(&self) -> usize {
        self.records.len()
    }
}
