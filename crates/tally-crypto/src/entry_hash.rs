use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tally_types::{
    Currency, EntryId, EntryType, LedgerEntry, OrderId, PaymentMethod, ShiftId, StaffId, VenueId,
};

use crate::canonical::CanonicalEncoder;
use crate::hasher::ContentHasher;

/// Every field that an entry hash commits to.
///
/// Built once all fields of a new entry are final, or from a stored entry
/// during verification. `previous_entry_hash` is the predecessor's hash and is
/// what makes a single tampered entry invalidate the rest of the chain.
#[derive(Clone, Debug)]
pub struct EntryHashInput<'a> {
    pub venue_id: VenueId,
    pub entry_type: EntryType,
    pub amount_cents: i64,
    pub currency: Currency,
    pub order_id: Option<OrderId>,
    pub payment_method: Option<&'a PaymentMethod>,
    pub created_at: DateTime<Utc>,
    pub previous_entry_id: Option<EntryId>,
    pub previous_entry_hash: Option<[u8; 32]>,
    pub entry_number: u64,
    pub idempotency_key: &'a str,
    pub staff_id: Option<StaffId>,
    pub shift_id: Option<ShiftId>,
    pub payment_detail: Option<&'a str>,
    pub description: Option<&'a str>,
    pub reference: Option<&'a str>,
    pub corrects_entry_id: Option<EntryId>,
    pub business_date: NaiveDate,
    pub context: Option<&'a Value>,
}

impl<'a> EntryHashInput<'a> {
    /// Hash input for a stored entry, given its predecessor's hash.
    pub fn from_entry(entry: &'a LedgerEntry, previous_entry_hash: Option<[u8; 32]>) -> Self {
        Self {
            venue_id: entry.venue_id,
            entry_type: entry.entry_type,
            amount_cents: entry.amount_cents,
            currency: entry.currency,
            order_id: entry.order_id,
            payment_method: entry.payment_method.as_ref(),
            created_at: entry.created_at,
            previous_entry_id: entry.previous_entry_id,
            previous_entry_hash,
            entry_number: entry.entry_number,
            idempotency_key: &entry.idempotency_key,
            staff_id: entry.staff_id,
            shift_id: entry.shift_id,
            payment_detail: entry.payment_detail.as_deref(),
            description: entry.description.as_deref(),
            reference: entry.reference.as_deref(),
            corrects_entry_id: entry.corrects_entry_id,
            business_date: entry.business_date,
            context: entry.context.as_ref(),
        }
    }
}

/// Canonical entry hash.
///
/// Field order is fixed and must never change for a given domain tag:
/// `venue_id, entry_type, amount_cents, currency, order_id, payment_method,
/// created_at, previous_entry_id` come first, followed by the remaining
/// immutable fields. `created_at` is encoded as microseconds since the epoch.
pub fn compute_entry_hash(input: &EntryHashInput<'_>) -> [u8; 32] {
    let mut enc = CanonicalEncoder::new(ContentHasher::ENTRY.start());
    enc.u64(Some(input.venue_id.get()))
        .str(Some(input.entry_type.as_str()))
        .i64(input.amount_cents)
        .str(Some(input.currency.as_str()))
        .u64(input.order_id.map(OrderId::get))
        .str(input.payment_method.map(PaymentMethod::as_str))
        .i64(input.created_at.timestamp_micros())
        .bytes(input.previous_entry_id.as_ref().map(|id| id.as_bytes().as_slice()))
        .bytes(input.previous_entry_hash.as_ref().map(|h| h.as_slice()))
        .u64(Some(input.entry_number))
        .str(Some(input.idempotency_key))
        .u64(input.staff_id.map(StaffId::get))
        .u64(input.shift_id.map(ShiftId::get))
        .str(input.payment_detail)
        .str(input.description)
        .str(input.reference)
        .bytes(input.corrects_entry_id.as_ref().map(|id| id.as_bytes().as_slice()))
        .str(Some(input.business_date.format("%Y-%m-%d").to_string().as_str()))
        .json(input.context);
    enc.finish()
}
