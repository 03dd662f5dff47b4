use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entry_type::EntryType;
use crate::identity::{EntryId, OrderId, ShiftId, StaffId, VenueId};
use crate::money::Currency;
use crate::payment::PaymentMethod;

/// One immutable record of a financial event.
///
/// Created exactly once by the ledger writer and never mutated afterwards.
/// A correction is a new entry whose `corrects_entry_id` names the original.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub venue_id: VenueId,
    /// Globally unique; the ledger holds at most one entry per key.
    pub idempotency_key: String,
    pub entry_type: EntryType,
    /// Position in the venue chain, starting at 1 with no gaps.
    pub entry_number: u64,
    pub order_id: Option<OrderId>,
    pub staff_id: Option<StaffId>,
    pub shift_id: Option<ShiftId>,
    pub amount_cents: i64,
    pub currency: Currency,
    pub payment_method: Option<PaymentMethod>,
    pub payment_detail: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
    /// Opaque structured data owned by the caller.
    pub context: Option<Value>,
    pub corrects_entry_id: Option<EntryId>,
    /// The venue's previous entry; `None` only for the first entry.
    pub previous_entry_id: Option<EntryId>,
    #[serde(with = "hex_hash")]
    pub entry_hash: [u8; 32],
    pub created_at: DateTime<Utc>,
    pub business_date: NaiveDate,
}

impl LedgerEntry {
    /// Short hex representation of the entry hash.
    pub fn short_hash(&self) -> String {
        hex::encode(&self.entry_hash[..4])
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.entry_hash)
    }

    pub fn tail(&self) -> ChainTail {
        ChainTail {
            entry_id: self.id,
            entry_number: self.entry_number,
            entry_hash: self.entry_hash,
        }
    }
}

/// The most recently committed entry of a venue chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTail {
    pub entry_id: EntryId,
    pub entry_number: u64,
    #[serde(with = "hex_hash")]
    pub entry_hash: [u8; 32],
}

pub(crate) mod hex_hash {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|v: Vec<u8>| serde::de::Error::invalid_length(v.len(), &"32 bytes"))
    }
}
