use serde::{Deserialize, Serialize};

pub const RECORD_VERSION: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub version:       u8,
    pub credential_id: Vec<u8>,         // 16 bytes random
    pub rp_id:         String,
    pub rp_id_hash:    Vec<u8>,         // SHA-256(rp_id)
    pub user_id:       Vec<u8>,
    pub user_name:     String,
    pub user_display:  String,
    pub prf_seed:      Option<Vec<u8>>, // hmac-secret key; None if created without PRF
    pub created_at:    u64,             // Unix seconds
    pub discoverable:  bool,
}

impl CredentialRecord {
    pub fn id_hex(&self) -> String {
        hex::encode(&self.credential_id)
    }
}
