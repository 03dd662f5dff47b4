use std::fmt::Debug;

use tally_types::{EntryId, LedgerEntry};

use crate::entry_hash::{compute_entry_hash, EntryHashInput};

/// A record that participates in a hash chain.
pub trait ChainLink {
    type Id: Copy + PartialEq + Debug;

    fn link_id(&self) -> Self::Id;
    /// 1-based position in the chain.
    fn sequence(&self) -> u64;
    fn previous_id(&self) -> Option<Self::Id>;
    fn stored_hash(&self) -> [u8; 32];
    /// Hash this link would have, given the hash of its predecessor.
    fn recompute(&self, previous_hash: Option<[u8; 32]>) -> [u8; 32];
}

impl ChainLink for LedgerEntry {
    type Id = EntryId;

    fn link_id(&self) -> EntryId {
        self.id
    }

    fn sequence(&self) -> u64 {
        self.entry_number
    }

    fn previous_id(&self) -> Option<EntryId> {
        self.previous_entry_id
    }

    fn stored_hash(&self) -> [u8; 32] {
        self.entry_hash
    }

    fn recompute(&self, previous_hash: Option<[u8; 32]>) -> [u8; 32] {
        compute_entry_hash(&EntryHashInput::from_entry(self, previous_hash))
    }
}

/// What went wrong at a link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakKind {
    /// Recomputed hash differs from the stored one.
    HashMismatch,
    /// `previous_id` does not name the preceding link.
    LinkMismatch,
    /// Sequence numbers are not consecutive.
    SequenceGap,
}

/// A link that failed verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainBreak<Id> {
    pub id: Id,
    pub sequence: u64,
    pub kind: BreakKind,
}

/// Trusted starting point for verifying a sub-range of a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainAnchor<Id> {
    pub id: Id,
    pub sequence: u64,
    pub hash: [u8; 32],
}

/// Hash chain walker.
///
/// The expected hash of each link is computed from the *recomputed* hash of
/// its predecessor, never the stored one. A single altered link therefore
/// fails verification together with every link after it.
pub struct ChainWalker;

impl ChainWalker {
    /// Walk `links` in order and return every break found, at most one per link.
    ///
    /// With `anchor = None` the first link must be the chain genesis
    /// (sequence 1, no previous link).
    pub fn walk<L: ChainLink>(
        links: &[L],
        anchor: Option<ChainAnchor<L::Id>>,
    ) -> Vec<ChainBreak<L::Id>> {
        let mut breaks = Vec::new();
        let mut expected_prev_id = anchor.map(|a| a.id);
        let mut expected_prev_hash = anchor.map(|a| a.hash);
        let mut expected_seq = anchor.map(|a| a.sequence + 1).unwrap_or(1);

        for link in links {
            let kind = if link.sequence() != expected_seq {
                Some(BreakKind::SequenceGap)
            } else if link.previous_id() != expected_prev_id {
                Some(BreakKind::LinkMismatch)
            } else {
                None
            };

            let computed = link.recompute(expected_prev_hash);
            let kind = kind.or((computed != link.stored_hash()).then_some(BreakKind::HashMismatch));

            if let Some(kind) = kind {
                breaks.push(ChainBreak {
                    id: link.link_id(),
                    sequence: link.sequence(),
                    kind,
                });
            }

            expected_prev_id = Some(link.link_id());
            expected_prev_hash = Some(computed);
            expected_seq = link.sequence() + 1;
        }

        breaks
    }

    /// First break in `links`, if any.
    pub fn first_break<L: ChainLink>(
        links: &[L],
        anchor: Option<ChainAnchor<L::Id>>,
    ) -> Option<ChainBreak<L::Id>> {
        Self::walk(links, anchor).into_iter().next()
    }
}
