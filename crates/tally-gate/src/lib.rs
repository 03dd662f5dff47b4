//! Idempotency gate for Tally write operations.
//!
//! Every money-moving request carries a caller-chosen idempotency key. The
//! gate turns retries of the same request into replays of the first response
//! and refuses a key that is reused for a different request.
//!
//! ```text
//! begin(key, fingerprint)
//!   no live record         -> Proceed   (processing record inserted)
//!   completed, same print  -> Replay    (cached response, verbatim)
//!   processing, same print -> Conflict  (another attempt is in flight)
//!   any state, other print -> GateError::KeyReuse
//! ```
//!
//! Records expire passively: an expired record is invisible to `begin`, and
//! [`IdempotencyGate::sweep`] deletes them.

pub mod config;
pub mod error;
pub mod gate;

pub use config::GateConfig;
pub use error::{GateError, GateResult};
pub use gate::{GateOutcome, IdempotencyGate};
