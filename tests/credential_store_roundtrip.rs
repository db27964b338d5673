use biokey::credentials::credential::RECORD_VERSION;
use biokey::credentials::{CredentialRecord, CredentialStore, disk};
use sha2::{Digest, Sha256};

fn rp_hash(rp_id: &str) -> Vec<u8> {
    Sha256::digest(rp_id.as_bytes()).to_vec()
}

fn make_record(rp_id: &str, credential_id: &[u8; 16], created_at: u64, discoverable: bool) -> CredentialRecord {
    CredentialRecord {
        version: RECORD_VERSION,
        credential_id: credential_id.to_vec(),
        rp_id: rp_id.to_string(),
        rp_id_hash: rp_hash(rp_id),
        user_id: b"alice".to_vec(),
        user_name: "alice".into(),
        user_display: "alice".into(),
        prf_seed: Some(vec![0x5eu8; 32]),
        created_at,
        discoverable,
    }
}

#[test]
fn test_record_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let key = [0xabu8; 32];
    let id = [0x01u8; 16];

    {
        let mut store = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
        store.add(make_record("biokey.local", &id, 1_700_000_000, true)).unwrap();
    }

    let store = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
    assert_eq!(store.credential_count(), 1);
    let loaded = store.get(&id, &rp_hash("biokey.local")).expect("credential not found");
    assert_eq!(loaded.user_name, "alice");
    assert_eq!(loaded.prf_seed.as_deref(), Some(&[0x5eu8; 32][..]));
    assert_eq!(loaded.created_at, 1_700_000_000);
    assert_eq!(loaded.id_hex(), hex::encode(id));
}

#[test]
fn test_file_on_disk_is_not_plaintext() {
    let dir = tempfile::tempdir().unwrap();
    let key = [0x10u8; 32];
    let id = [0x02u8; 16];
    let mut store = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
    store.add(make_record("biokey.local", &id, 1, true)).unwrap();

    let raw = std::fs::read(disk::record_path(dir.path(), &id)).unwrap();
    assert!(raw.starts_with(disk::MAGIC));
    assert!(!raw.windows(5).any(|w| w == b"alice"));
}

#[test]
fn test_get_requires_matching_rp() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = CredentialStore::load([0x20u8; 32], dir.path().to_path_buf()).unwrap();
    let id = [0x03u8; 16];
    store.add(make_record("biokey.local", &id, 1, true)).unwrap();

    assert!(store.get(&id, &rp_hash("biokey.local")).is_some());
    assert!(store.get(&id, &rp_hash("other.example")).is_none());
    assert!(store.latest_for_rp(&rp_hash("other.example")).is_none());
}

#[test]
fn test_latest_for_rp_prefers_newest_discoverable() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = CredentialStore::load([0x30u8; 32], dir.path().to_path_buf()).unwrap();
    store.add(make_record("biokey.local", &[0x11u8; 16], 1_000, true)).unwrap();
    store.add(make_record("biokey.local", &[0x22u8; 16], 3_000, false)).unwrap();
    store.add(make_record("biokey.local", &[0x33u8; 16], 2_000, true)).unwrap();

    let latest = store.latest_for_rp(&rp_hash("biokey.local")).unwrap();
    assert_eq!(latest.credential_id, vec![0x33u8; 16]);

    // Same ordering after a reload.
    let store = CredentialStore::load([0x30u8; 32], dir.path().to_path_buf()).unwrap();
    let latest = store.latest_for_rp(&rp_hash("biokey.local")).unwrap();
    assert_eq!(latest.credential_id, vec![0x33u8; 16]);
}

#[test]
fn test_remove_deletes_file() {
    let dir = tempfile::tempdir().unwrap();
    let key = [0xefu8; 32];
    let id = [0x42u8; 16];

    let mut store = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
    store.add(make_record("biokey.local", &id, 1_000, true)).unwrap();

    assert!(store.remove(&id).unwrap());
    assert_eq!(store.credential_count(), 0);
    assert!(!store.remove(&id).unwrap());
    assert!(!disk::record_path(dir.path(), &id).exists());

    let reloaded = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
    assert_eq!(reloaded.credential_count(), 0);
}

#[test]
fn test_wrong_device_key_skips_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = CredentialStore::load([0x11u8; 32], dir.path().to_path_buf()).unwrap();
    store.add(make_record("biokey.local", &[0x55u8; 16], 1_000, true)).unwrap();
    drop(store);

    let other = CredentialStore::load([0x22u8; 32], dir.path().to_path_buf()).unwrap();
    assert_eq!(other.credential_count(), 0, "file sealed under another key must be skipped");
}

#[test]
fn test_truncated_file_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("deadbeef.cred"), b"BKC1short").unwrap();

    let store = CredentialStore::load([0xaau8; 32], dir.path().to_path_buf()).unwrap();
    assert_eq!(store.credential_count(), 0);
}

#[test]
fn test_unrelated_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"ignore me").unwrap();
    std::fs::write(dir.path().join("biokey-session.json"), b"{}").unwrap();

    let store = CredentialStore::load([0xbbu8; 32], dir.path().to_path_buf()).unwrap();
    assert_eq!(store.credential_count(), 0);
}

#[test]
fn test_corrupt_neighbour_does_not_hide_valid_record() {
    let dir = tempfile::tempdir().unwrap();
    let key = [0xccu8; 32];
    let id = [0x77u8; 16];

    let mut store = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
    store.add(make_record("biokey.local", &id, 2_000, true)).unwrap();
    drop(store);

    std::fs::write(dir.path().join("garbage.cred"), b"not encrypted at all, just bytes").unwrap();

    let reloaded = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
    assert_eq!(reloaded.credential_count(), 1);
    assert!(reloaded.get(&id, &rp_hash("biokey.local")).is_some());
}

#[test]
fn test_missing_directory_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::load([0x01u8; 32], dir.path().join("not-yet")).unwrap();
    assert_eq!(store.credential_count(), 0);
}
