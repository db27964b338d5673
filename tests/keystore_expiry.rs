use std::sync::Arc;
use std::time::Duration;

use biokey::authn::CredentialId;
use biokey::derive::{self, Address, DerivedKey};
use biokey::keystore::clock::Clock;
use biokey::keystore::persist::SessionStorage;
use biokey::keystore::{
    FileStorage, KeyStore, MAX_TTL, MIN_TTL, ManualClock, MemoryStorage, STORAGE_KEY, TtlPolicy,
};

const T0: u64 = 1_700_000_000_000;

fn key(seed: u8) -> (DerivedKey, Address) {
    let key = derive::derive_bytes(&[seed; 32]).unwrap();
    let address = key.address().unwrap();
    (key, address)
}

fn cred(tag: u8) -> CredentialId {
    CredentialId::new(vec![tag; 16])
}

fn fresh_store() -> (KeyStore, Arc<ManualClock>, MemoryStorage) {
    let clock = Arc::new(ManualClock::new(T0));
    let storage = MemoryStorage::new();
    let store = KeyStore::load(Box::new(storage.clone()), clock.clone()).unwrap();
    (store, clock, storage)
}

fn stored_json(storage: &MemoryStorage) -> serde_json::Value {
    let raw = storage.get_item(STORAGE_KEY).unwrap().expect("item present");
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn test_every_write_lands_in_ttl_window() {
    let (mut store, clock, _storage) = fresh_store();
    let min = MIN_TTL.as_millis() as u64;
    let max = MAX_TTL.as_millis() as u64;
    for i in 0..1000u32 {
        let (k, a) = key((i % 250) as u8 + 1);
        let now = clock.now_ms();
        let record = store.write(k, a, cred(1)).unwrap();
        let ttl = record.expires_at() - now;
        assert!(ttl >= min && ttl < max, "ttl {ttl}ms outside window");
        clock.advance(Duration::from_millis(7));
    }
}

#[test]
fn test_read_before_expiry_returns_record() {
    let (mut store, clock, _storage) = fresh_store();
    let (k, a) = key(3);
    let written = store.write(k, a, cred(1)).unwrap();

    clock.set(written.expires_at() - 1);
    let read = store.read().unwrap().cloned().expect("still live");
    assert_eq!(read, written);
    assert_eq!(store.remaining_ttl(), Some(Duration::from_millis(1)));
}

#[test]
fn test_read_at_expiry_clears_key_keeps_credential() {
    let (mut store, clock, storage) = fresh_store();
    let (k, a) = key(4);
    let written = store.write(k, a, cred(9)).unwrap();

    clock.set(written.expires_at());
    assert!(store.read().unwrap().is_none());
    assert!(store.read().unwrap().is_none());
    assert_eq!(store.remaining_ttl(), None);
    assert_eq!(store.credential_id(), Some(&cred(9)));

    let json = stored_json(&storage);
    assert!(json["state"]["privateKey"].is_null());
    assert!(json["state"]["walletAddress"].is_null());
    assert!(json["state"]["expiresAt"].is_null());
    assert_eq!(json["state"]["credentialId"], cred(9).to_hex());
}

#[test]
fn test_reads_never_extend_expiry() {
    let (mut store, clock, _storage) = fresh_store();
    let (k, a) = key(5);
    let written = store.write(k, a, cred(1)).unwrap();
    for _ in 0..10 {
        clock.advance(Duration::from_secs(10));
        if let Some(r) = store.read().unwrap() {
            assert_eq!(r.expires_at(), written.expires_at());
        }
    }
}

#[test]
fn test_rewrite_starts_new_window() {
    let (mut store, clock, _storage) = fresh_store();
    let (k, a) = key(6);
    store.write(k.clone(), a, cred(1)).unwrap();
    clock.advance(Duration::from_secs(4 * 60));
    let second = store.write(k, a, cred(1)).unwrap();
    assert!(second.expires_at() >= T0 + 4 * 60_000 + MIN_TTL.as_millis() as u64);
}

#[test]
fn test_remaining_ttl_saturates_without_clearing() {
    let (mut store, clock, _storage) = fresh_store();
    let (k, a) = key(7);
    let written = store.write(k, a, cred(1)).unwrap();

    clock.set(written.expires_at() + 1000);
    assert_eq!(store.remaining_ttl(), Some(Duration::ZERO));
    assert!(store.read().unwrap().is_none());
    assert_eq!(store.remaining_ttl(), None);
}

#[test]
fn test_expire_if_due_reports_clearing() {
    let (mut store, clock, _storage) = fresh_store();
    assert!(!store.expire_if_due().unwrap());
    let (k, a) = key(8);
    let written = store.write(k, a, cred(1)).unwrap();
    assert!(!store.expire_if_due().unwrap());
    clock.set(written.expires_at());
    assert!(store.expire_if_due().unwrap());
    assert!(!store.expire_if_due().unwrap());
}

#[test]
fn test_clear_key_only_keeps_credential() {
    let (mut store, _clock, _storage) = fresh_store();
    let (k, a) = key(10);
    store.write(k, a, cred(2)).unwrap();
    store.clear_key_only().unwrap();
    assert!(store.read().unwrap().is_none());
    assert_eq!(store.credential_id(), Some(&cred(2)));
}

#[test]
fn test_clear_all_removes_item() {
    let (mut store, _clock, storage) = fresh_store();
    let (k, a) = key(11);
    store.write(k, a, cred(2)).unwrap();
    store.clear_all().unwrap();
    assert!(store.read().unwrap().is_none());
    assert_eq!(store.credential_id(), None);
    assert!(storage.get_item(STORAGE_KEY).unwrap().is_none());
}

#[test]
fn test_unexpired_record_survives_reload() {
    let (mut store, clock, storage) = fresh_store();
    let (k, a) = key(12);
    let written = store.write(k, a, cred(3)).unwrap();
    drop(store);

    clock.advance(Duration::from_secs(60));
    let mut reloaded = KeyStore::load(Box::new(storage), clock.clone()).unwrap();
    assert_eq!(reloaded.read().unwrap().cloned(), Some(written));
    assert_eq!(reloaded.credential_id(), Some(&cred(3)));
}

#[test]
fn test_expired_record_is_discarded_on_load() {
    let (mut store, clock, storage) = fresh_store();
    let (k, a) = key(13);
    let written = store.write(k, a, cred(4)).unwrap();
    drop(store);

    clock.set(written.expires_at() + 1000);
    let mut reloaded = KeyStore::load(Box::new(storage.clone()), clock.clone()).unwrap();
    assert_eq!(reloaded.remaining_ttl(), None);
    assert!(reloaded.read().unwrap().is_none());
    assert_eq!(reloaded.credential_id(), Some(&cred(4)));

    let json = stored_json(&storage);
    assert!(json["state"]["privateKey"].is_null());
    assert_eq!(json["state"]["credentialId"], cred(4).to_hex());
}

#[test]
fn test_hand_written_expired_record_is_discarded() {
    let (k, a) = key(14);
    let clock = Arc::new(ManualClock::new(T0));
    let storage = MemoryStorage::new();
    let raw = serde_json::json!({
        "state": {
            "privateKey": k.to_hex().as_str(),
            "walletAddress": a.to_checksum(),
            "expiresAt": T0 - 1000,
            "credentialId": cred(5).to_hex(),
        },
        "version": 0,
    });
    storage.set_item(STORAGE_KEY, &raw.to_string()).unwrap();

    let mut store = KeyStore::load(Box::new(storage), clock).unwrap();
    assert_eq!(store.remaining_ttl(), None);
    assert!(store.read().unwrap().is_none());
    assert_eq!(store.credential_id(), Some(&cred(5)));
}

#[test]
fn test_mismatched_address_is_discarded() {
    let (k, _) = key(15);
    let (_, other) = key(16);
    let clock = Arc::new(ManualClock::new(T0));
    let storage = MemoryStorage::new();
    let raw = serde_json::json!({
        "state": {
            "privateKey": k.to_hex().as_str(),
            "walletAddress": other.to_checksum(),
            "expiresAt": T0 + 60_000,
            "credentialId": cred(6).to_hex(),
        },
        "version": 0,
    });
    storage.set_item(STORAGE_KEY, &raw.to_string()).unwrap();

    let mut store = KeyStore::load(Box::new(storage), clock).unwrap();
    assert!(store.read().unwrap().is_none());
    assert_eq!(store.credential_id(), Some(&cred(6)));
}

#[test]
fn test_corrupt_record_is_dropped() {
    let clock = Arc::new(ManualClock::new(T0));
    let storage = MemoryStorage::new();
    storage.set_item(STORAGE_KEY, "{not json").unwrap();

    let mut store = KeyStore::load(Box::new(storage.clone()), clock).unwrap();
    assert!(store.read().unwrap().is_none());
    assert_eq!(store.credential_id(), None);
    assert!(storage.get_item(STORAGE_KEY).unwrap().is_none());
}

#[test]
fn test_unknown_envelope_version_is_dropped() {
    let clock = Arc::new(ManualClock::new(T0));
    let storage = MemoryStorage::new();
    storage
        .set_item(STORAGE_KEY, r#"{"state":{"credentialId":"beef"},"version":7}"#)
        .unwrap();

    let store = KeyStore::load(Box::new(storage.clone()), clock).unwrap();
    assert_eq!(store.credential_id(), None);
    assert!(storage.get_item(STORAGE_KEY).unwrap().is_none());
}

#[test]
fn test_credential_only_record_loads_empty() {
    let clock = Arc::new(ManualClock::new(T0));
    let storage = MemoryStorage::new();
    storage
        .set_item(STORAGE_KEY, r#"{"state":{"credentialId":"beef"},"version":0}"#)
        .unwrap();

    let mut store = KeyStore::load(Box::new(storage), clock).unwrap();
    assert!(store.read().unwrap().is_none());
    assert_eq!(store.credential_id(), Some(&CredentialId::new(vec![0xbe, 0xef])));
}

#[test]
fn test_custom_ttl_window() {
    let (store, clock, _storage) = fresh_store();
    let ttl = TtlPolicy::new(Duration::from_secs(1), Duration::from_secs(2)).unwrap();
    let mut store = store.with_ttl(ttl);
    let (k, a) = key(17);
    let written = store.write(k, a, cred(1)).unwrap();
    let span = written.expires_at() - T0;
    assert!((1000..2000).contains(&span));

    clock.advance(Duration::from_secs(2));
    assert!(store.read().unwrap().is_none());
}

#[test]
fn test_file_storage_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(T0));

    let written = {
        let mut store =
            KeyStore::load(Box::new(FileStorage::new(dir.path().to_path_buf())), clock.clone()).unwrap();
        let (k, a) = key(18);
        store.write(k, a, cred(7)).unwrap()
    };
    assert!(dir.path().join(format!("{STORAGE_KEY}.json")).exists());

    let mut store =
        KeyStore::load(Box::new(FileStorage::new(dir.path().to_path_buf())), clock.clone()).unwrap();
    assert_eq!(store.read().unwrap().cloned(), Some(written));

    store.clear_all().unwrap();
    assert!(!dir.path().join(format!("{STORAGE_KEY}.json")).exists());
}

#[cfg(unix)]
#[test]
fn test_file_storage_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path().to_path_buf());
    storage.set_item(STORAGE_KEY, "{}").unwrap();
    let mode = std::fs::metadata(dir.path().join(format!("{STORAGE_KEY}.json")))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}
