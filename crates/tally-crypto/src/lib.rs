//! Hashing primitives for the Tally payment ledger.
//!
//! Provides domain-separated BLAKE3 hashing, the canonical hash of a ledger
//! entry, request fingerprints for idempotency, and a generic hash-chain
//! walker. All hashing wraps `blake3`; there is no custom cryptography.

pub mod canonical;
pub mod chain;
pub mod entry_hash;
pub mod fingerprint;
pub mod hasher;

pub use canonical::CanonicalEncoder;
pub use chain::{BreakKind, ChainAnchor, ChainBreak, ChainLink, ChainWalker};
pub use entry_hash::{compute_entry_hash, EntryHashInput};
pub use fingerprint::fingerprint_request;
pub use hasher::ContentHasher;
