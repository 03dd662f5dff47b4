use serde::{Deserialize, Serialize};
use serde_json::Value;
use tally_types::{
    Currency, EntryId, EntryType, LedgerEntry, OrderId, PaymentMethod, ShiftId, StaffId, VenueId,
};

/// A financial event as submitted by the caller, before the ledger assigns
/// its position, timestamp, and hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub venue_id: VenueId,
    pub idempotency_key: String,
    pub entry_type: EntryType,
    pub amount_cents: i64,
    pub currency: Currency,
    #[serde(default)]
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub staff_id: Option<StaffId>,
    #[serde(default)]
    pub shift_id: Option<ShiftId>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub payment_detail: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default)]
    pub corrects_entry_id: Option<EntryId>,
}

impl EntryDraft {
    pub fn new(
        venue_id: VenueId,
        idempotency_key: impl Into<String>,
        entry_type: EntryType,
        amount_cents: i64,
        currency: Currency,
    ) -> Self {
        Self {
            venue_id,
            idempotency_key: idempotency_key.into(),
            entry_type,
            amount_cents,
            currency,
            order_id: None,
            staff_id: None,
            shift_id: None,
            payment_method: None,
            payment_detail: None,
            description: None,
            reference: None,
            context: None,
            corrects_entry_id: None,
        }
    }

    pub fn order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn staff(mut self, staff_id: StaffId) -> Self {
        self.staff_id = Some(staff_id);
        self
    }

    pub fn shift(mut self, shift_id: ShiftId) -> Self {
        self.shift_id = Some(shift_id);
        self
    }

    pub fn method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.payment_detail = Some(detail.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn corrects(mut self, entry_id: EntryId) -> Self {
        self.corrects_entry_id = Some(entry_id);
        self
    }

    /// Whether `entry` records exactly this draft's payload.
    ///
    /// Fields assigned by the ledger (id, position, hash, timestamps) are
    /// not compared.
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.venue_id == entry.venue_id
            && self.idempotency_key == entry.idempotency_key
            && self.entry_type == entry.entry_type
            && self.amount_cents == entry.amount_cents
            && self.currency == entry.currency
            && self.order_id == entry.order_id
            && self.staff_id == entry.staff_id
            && self.shift_id == entry.shift_id
            && self.payment_method == entry.payment_method
            && self.payment_detail == entry.payment_detail
            && self.description == entry.description
            && self.reference == entry.reference
            && self.context == entry.context
            && self.corrects_entry_id == entry.corrects_entry_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_json() {
        let draft: EntryDraft = serde_json::from_str(
            r#"{"venue_id":1,"idempotency_key":"abc","entry_type":"payment_received",
                "amount_cents":2550,"currency":"BGN"}"#,
        )
        .unwrap();
        assert_eq!(
            draft,
            EntryDraft::new(VenueId(1), "abc", EntryType::PaymentReceived, 2550, Currency::BGN)
        );
    }

    #[test]
    fn unknown_entry_type_is_rejected_at_parse() {
        let parsed = serde_json::from_str::<EntryDraft>(
            r#"{"venue_id":1,"idempotency_key":"abc","entry_type":"gift",
                "amount_cents":1,"currency":"BGN"}"#,
        );
        assert!(parsed.is_err());
    }
}
