use tally_crypto::{BreakKind, ChainAnchor, ChainWalker};
use tally_store::LedgerStore;
use tally_types::{EntryId, VenueId};
use tracing::debug;

use crate::error::LedgerResult;

/// Outcome of verifying a venue chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verification {
    Valid,
    /// The first entry that failed verification.
    Broken(EntryId),
}

/// One entry that failed verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub entry_id: EntryId,
    pub entry_number: u64,
    pub kind: BreakKind,
    pub description: String,
}

/// Full result of a verification walk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationReport {
    pub venue: VenueId,
    pub from: u64,
    pub to: u64,
    /// Entries read and checked.
    pub checked: u64,
    pub violations: Vec<Violation>,
}

impl VerificationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn first_broken(&self) -> Option<&Violation> {
        self.violations.first()
    }

    pub fn verification(&self) -> Verification {
        self.first_broken()
            .map_or(Verification::Valid, |v| Verification::Broken(v.entry_id))
    }
}

/// Read-only chain verification.
///
/// Works on a snapshot read from the store, so it is safe to run while
/// appends continue. Each entry's hash is recomputed from its own fields and
/// the *recomputed* hash of its predecessor: an altered entry is reported
/// together with every entry after it.
pub struct ChainVerifier;

impl ChainVerifier {
    /// Verify entries `from..=to` of the venue chain.
    pub fn verify<S: LedgerStore + ?Sized>(
        store: &S,
        venue: VenueId,
        from: u64,
        to: u64,
    ) -> LedgerResult<Verification> {
        Ok(Self::verify_report(store, venue, from, to)?.verification())
    }

    /// Verify the whole venue chain.
    pub fn verify_venue<S: LedgerStore + ?Sized>(
        store: &S,
        venue: VenueId,
    ) -> LedgerResult<VerificationReport> {
        let to = store.tail(venue)?.map_or(0, |t| t.entry_number);
        Self::verify_report(store, venue, 1, to)
    }

    /// Like [`verify`](Self::verify), listing every failing entry.
    ///
    /// When `from > 1` the stored hash of entry `from - 1` is trusted as the
    /// starting anchor.
    pub fn verify_report<S: LedgerStore + ?Sized>(
        store: &S,
        venue: VenueId,
        from: u64,
        to: u64,
    ) -> LedgerResult<VerificationReport> {
        let from = from.max(1);
        let anchor = if from > 1 {
            store
                .range(venue, from - 1, from - 1)?
                .first()
                .map(|e| ChainAnchor {
                    id: e.id,
                    sequence: e.entry_number,
                    hash: e.entry_hash,
                })
        } else {
            None
        };

        let entries = store.range(venue, from, to)?;
        let violations: Vec<Violation> = ChainWalker::walk(&entries, anchor)
            .into_iter()
            .map(|b| Violation {
                entry_id: b.id,
                entry_number: b.sequence,
                kind: b.kind,
                description: describe(b.kind, b.sequence),
            })
            .collect();

        debug!(
            venue = %venue,
            from,
            to,
            checked = entries.len(),
            violations = violations.len(),
            "chain verified"
        );

        Ok(VerificationReport {
            venue,
            from,
            to,
            checked: entries.len() as u64,
            violations,
        })
    }
}

fn describe(kind: BreakKind, entry_number: u64) -> String {
    match kind {
        BreakKind::HashMismatch => format!("entry #{entry_number}: stored hash does not match recomputed hash"),
        BreakKind::LinkMismatch => {
            format!("entry #{entry_number}: previous_entry_id does not name the preceding entry")
        }
        BreakKind::SequenceGap => format!("entry #{entry_number}: entry numbers are not consecutive"),
    }
}
