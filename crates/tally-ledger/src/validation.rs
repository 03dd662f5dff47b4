use crate::config::LedgerConfig;
use crate::draft::EntryDraft;
use crate::error::LedgerError;

/// Longest accepted idempotency key, in bytes.
pub const MAX_KEY_LEN: usize = 255;

/// Checks that need nothing but the draft and configuration.
///
/// Rules that depend on stored state (the corrected entry must exist in the
/// same venue) are checked by the writer.
pub fn validate_draft(draft: &EntryDraft, config: &LedgerConfig) -> Result<(), LedgerError> {
    let key = draft.idempotency_key.as_str();
    if key.trim().is_empty() {
        return Err(LedgerError::Validation("idempotency key is blank".into()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(LedgerError::Validation(format!(
            "idempotency key is {} bytes, limit is {MAX_KEY_LEN}",
            key.len()
        )));
    }

    let ty = draft.entry_type;
    if ty.is_signed() {
        if draft.amount_cents == 0 {
            return Err(LedgerError::Validation(format!("{ty} amount must be non-zero")));
        }
    } else if draft.amount_cents <= 0 {
        return Err(LedgerError::Validation(format!(
            "{ty} amount must be positive, got {}",
            draft.amount_cents
        )));
    }

    if !config.supports(draft.currency) {
        return Err(LedgerError::Validation(format!(
            "unsupported currency {}",
            draft.currency
        )));
    }

    if ty.requires_original() && draft.corrects_entry_id.is_none() {
        return Err(LedgerError::Validation(format!(
            "{ty} must reference the entry it corrects"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_types::{Currency, EntryId, EntryType, VenueId};

    fn draft(ty: EntryType, amount: i64) -> EntryDraft {
        EntryDraft::new(VenueId(1), "k", ty, amount, Currency::BGN)
    }

    fn check(d: &EntryDraft) -> Result<(), LedgerError> {
        validate_draft(d, &LedgerConfig::default())
    }

    #[test]
    fn unsigned_types_need_positive_amounts() {
        assert!(check(&draft(EntryType::PaymentReceived, 2550)).is_ok());
        assert!(check(&draft(EntryType::PaymentReceived, 0)).is_err());
        assert!(check(&draft(EntryType::PaymentRefunded, -100)).is_err());
        assert!(check(&draft(EntryType::CashDrop, -1)).is_err());
    }

    #[test]
    fn signed_types_need_non_zero_amounts() {
        assert!(check(&draft(EntryType::CashVariance, -600)).is_ok());
        assert!(check(&draft(EntryType::CashVariance, 0)).is_err());
        let adj = draft(EntryType::Adjustment, -50).corrects(EntryId::new());
        assert!(check(&adj).is_ok());
    }

    #[test]
    fn adjustment_needs_original() {
        assert!(matches!(
            check(&draft(EntryType::Adjustment, 10)),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn unsupported_currency_rejected() {
        let mut d = draft(EntryType::PaymentReceived, 100);
        d.currency = Currency::parse("GBP").unwrap();
        assert!(check(&d).is_err());
    }

    #[test]
    fn blank_or_oversized_key_rejected() {
        let mut d = draft(EntryType::PaymentReceived, 100);
        d.idempotency_key = " ".into();
        assert!(check(&d).is_err());
        d.idempotency_key = "x".repeat(MAX_KEY_LEN + 1);
        assert!(check(&d).is_err());
    }
}
