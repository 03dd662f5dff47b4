use std::sync::Arc;

use tally_store::{IdempotencyStore, InsertOutcome, StoreError};
use tally_types::{
    CachedResponse, Clock, EntryId, IdempotencyRecord, RequestFingerprint,
};
use tracing::{debug, info};

use crate::config::GateConfig;
use crate::error::{GateError, GateResult};

/// What the caller should do after [`IdempotencyGate::begin`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateOutcome {
    /// The key is now reserved for this request. Execute it, then call
    /// `complete` or `fail`.
    Proceed,
    /// The request already ran. Return the cached response unchanged.
    Replay {
        response: CachedResponse,
        entry_id: Option<EntryId>,
    },
    /// The same request is still being processed elsewhere.
    Conflict,
}

/// Keyed de-duplication of write requests.
pub struct IdempotencyGate<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: GateConfig,
}

impl<S: IdempotencyStore> IdempotencyGate<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: GateConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Reserve `key` for the request identified by `fingerprint`.
    ///
    /// The reservation is a conditional insert in the store, so two callers
    /// racing on the same key see exactly one `Proceed`.
    pub fn begin(&self, key: &str, fingerprint: &RequestFingerprint) -> GateResult<GateOutcome> {
        if key.trim().is_empty() {
            return Err(GateError::BlankKey);
        }

        let now = self.clock.now();
        let record = IdempotencyRecord::processing(key, *fingerprint, now, now + self.config.ttl());
        let existing = match self.store.insert_if_absent(record, now)? {
            InsertOutcome::Inserted => {
                debug!(key, "idempotency key reserved");
                return Ok(GateOutcome::Proceed);
            }
            InsertOutcome::Existing(existing) => existing,
        };

        if existing.fingerprint != *fingerprint {
            return Err(GateError::KeyReuse {
                key: key.to_string(),
            });
        }

        if existing.is_processing() {
            debug!(key, "idempotency key in flight");
            return Ok(GateOutcome::Conflict);
        }

        let response = existing.response.ok_or_else(|| {
            StoreError::InvalidState(format!("completed idempotency record {key} has no response"))
        })?;
        debug!(key, "replaying cached response");
        Ok(GateOutcome::Replay {
            response,
            entry_id: existing.ledger_entry_id,
        })
    }

    /// Cache the response of a request that was allowed to proceed.
    pub fn complete(
        &self,
        key: &str,
        fingerprint: &RequestFingerprint,
        response: CachedResponse,
        entry_id: Option<EntryId>,
    ) -> GateResult<IdempotencyRecord> {
        self.store
            .complete(key, fingerprint, response, entry_id, self.clock.now())
            .map_err(|e| match e {
                StoreError::NotFound(_) => GateError::NotFound(key.to_string()),
                other => GateError::Store(other),
            })
    }

    /// Release the key after a failed attempt so a retry can proceed.
    ///
    /// Only a processing record of the same request is removed; returns
    /// whether one was.
    pub fn fail(&self, key: &str, fingerprint: &RequestFingerprint) -> GateResult<bool> {
        let removed = self.store.remove_processing(key, fingerprint)?;
        debug!(key, removed, "idempotency key released");
        Ok(removed)
    }

    /// Live record for `key`, if any.
    pub fn peek(&self, key: &str) -> GateResult<Option<IdempotencyRecord>> {
        Ok(self.store.get_record(key, self.clock.now())?)
    }

    /// Delete every expired record. Returns how many were removed.
    pub fn sweep(&self) -> GateResult<usize> {
        let purged = self.store.purge_expired(self.clock.now())?;
        info!(purged, "idempotency sweep");
        Ok(purged)
    }
}
