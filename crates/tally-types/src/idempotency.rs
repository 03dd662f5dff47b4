use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::EntryId;

/// Digest of a write request (method, path, and body), used to tell a retry
/// apart from a different operation that reuses the same key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestFingerprint(#[serde(with = "crate::entry::hex_hash")] pub [u8; 32]);

impl RequestFingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestFingerprint({})", hex::encode(&self.0[..4]))
    }
}

/// Response bytes stored for replay. Returned verbatim on a retried request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Lifecycle state of an idempotency record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Processing,
    Completed,
}

/// Keyed de-duplication record for one logical write operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub fingerprint: RequestFingerprint,
    pub state: RecordState,
    pub response: Option<CachedResponse>,
    pub ledger_entry_id: Option<EntryId>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn processing(
        key: impl Into<String>,
        fingerprint: RequestFingerprint,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            fingerprint,
            state: RecordState::Processing,
            response: None,
            ledger_entry_id: None,
            created_at,
            expires_at,
        }
    }

    pub fn is_processing(&self) -> bool {
        self.state == RecordState::Processing
    }

    pub fn is_completed(&self) -> bool {
        self.state == RecordState::Completed
    }

    /// Expired records are treated as absent.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn expiry_is_inclusive_of_deadline() {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let record =
            IdempotencyRecord::processing("k", RequestFingerprint([1; 32]), t0, t0 + Duration::hours(24));
        assert!(record.is_processing());
        assert!(!record.is_expired(t0 + Duration::hours(23)));
        assert!(record.is_expired(t0 + Duration::hours(24)));
    }
}
