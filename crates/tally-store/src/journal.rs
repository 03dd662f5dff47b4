use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_types::{
    AlertId, CachedResponse, CashVarianceAlert, ChainTail, EntryId, IdempotencyRecord,
    LedgerEntry, RequestFingerprint, Resolution, VenueId,
};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::memory::StoreState;
use crate::query::{AlertQuery, EntryQuery};
use crate::traits::{AlertStore, IdempotencyStore, InsertOutcome, LedgerStore};

/// Flush strategy for journal appends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every record.
    EveryWrite,
    /// Flush to the OS and let the page cache decide.
    #[default]
    OsDefault,
}

/// Configuration for [`JournalStore`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub sync_mode: SyncMode,
}

/// One state change, as written to the journal.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum JournalRecord {
    EntryCommitted { entry: LedgerEntry },
    IdempotencyUpserted { record: IdempotencyRecord },
    IdempotencyRemoved { key: String },
    IdempotencyPurged { now: DateTime<Utc> },
    AlertInserted { alert: CashVarianceAlert },
    AlertResolved { id: AlertId, resolution: Resolution },
}

/// 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: u64 = 8;

struct JournalWriter {
    file: File,
    /// End of the last complete record.
    offset: u64,
    /// Set when a failed append could not be rolled back.
    broken: bool,
}

/// File-backed store: [`InMemoryStore`](crate::InMemoryStore) indexes
/// rebuilt from an append-only journal.
///
/// On-disk format, repeated per record:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (JSON-serialized record)]
/// ```
///
/// Every mutation is validated against the indexes, written to the journal,
/// and only then applied, all under one writer mutex. A record cut short at
/// the end of the file (a crash mid-append) is truncated on open; a damaged
/// record anywhere else fails the open with [`StoreError::Corrupt`].
///
/// The writer mutex is per process. Two processes must not open the same
/// journal for writing.
pub struct JournalStore {
    path: PathBuf,
    config: JournalConfig,
    state: RwLock<StoreState>,
    writer: Mutex<JournalWriter>,
}

impl JournalStore {
    /// Open (or create) the journal at `path` and replay it.
    pub fn open(path: impl AsRef<Path>, config: JournalConfig) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let mut state = StoreState::default();
        let (valid_len, records) = replay(&bytes, &mut state)?;
        if valid_len < bytes.len() as u64 {
            warn!(
                path = %path.display(),
                offset = valid_len,
                discarded = bytes.len() as u64 - valid_len,
                "truncating torn journal tail"
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        info!(path = %path.display(), records, "journal replayed");

        Ok(Self {
            path: path.to_path_buf(),
            config,
            state: RwLock::new(state),
            writer: Mutex::new(JournalWriter {
                file,
                offset: valid_len,
                broken: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the journal in bytes.
    pub fn journal_len(&self) -> StoreResult<u64> {
        Ok(self.lock_writer()?.offset)
    }

    /// Number of idempotency records held, expired ones included.
    pub fn record_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.record_count())
    }

    fn append(&self, w: &mut JournalWriter, record: &JournalRecord) -> StoreResult<()> {
        if w.broken {
            return Err(StoreError::Unavailable(format!(
                "journal {} has an unrecoverable partial write",
                self.path.display()
            )));
        }

        let payload =
            serde_json::to_vec(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let length = u32::try_from(payload.len())
            .map_err(|_| StoreError::Serialization("journal record exceeds 4 GiB".into()))?;

        let mut frame = Vec::with_capacity(HEADER_SIZE as usize + payload.len());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);

        let written = w.file.write_all(&frame).and_then(|()| match self.config.sync_mode {
            SyncMode::EveryWrite => w.file.sync_data(),
            SyncMode::OsDefault => w.file.flush(),
        });
        if let Err(err) = written {
            if w.file.set_len(w.offset).is_err() {
                w.broken = true;
            }
            return Err(err.into());
        }

        debug!(offset = w.offset, len = payload.len(), "journal append");
        w.offset += frame.len() as u64;
        Ok(())
    }

    fn lock_writer(&self) -> StoreResult<MutexGuard<'_, JournalWriter>> {
        self.writer.lock().map_err(|_| StoreError::poisoned("journal writer"))
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.state.read().map_err(|_| StoreError::poisoned("journal index"))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.state.write().map_err(|_| StoreError::poisoned("journal index"))
    }
}

impl std::fmt::Debug for JournalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalStore")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Rebuild `state` from journal bytes.
///
/// Returns the length of the valid prefix and the number of records applied.
fn replay(bytes: &[u8], state: &mut StoreState) -> StoreResult<(u64, usize)> {
    let file_len = bytes.len() as u64;
    let mut offset: u64 = 0;
    let mut applied = 0;

    while offset < file_len {
        if offset + HEADER_SIZE > file_len {
            break;
        }
        let at = offset as usize;
        let length = u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let expected_crc =
            u32::from_le_bytes([bytes[at + 4], bytes[at + 5], bytes[at + 6], bytes[at + 7]]);
        let end = offset + HEADER_SIZE + u64::from(length);

        if end > file_len {
            break;
        }
        let corrupt = |reason: String| StoreError::Corrupt { offset, reason };
        if length == 0 {
            return Err(corrupt("zero-length record".into()));
        }

        let payload = &bytes[(offset + HEADER_SIZE) as usize..end as usize];
        if crc32fast::hash(payload) != expected_crc {
            if end == file_len {
                break;
            }
            return Err(corrupt("checksum mismatch".into()));
        }

        let record: JournalRecord =
            serde_json::from_slice(payload).map_err(|e| corrupt(e.to_string()))?;
        apply_replayed(state, record).map_err(|e| corrupt(e.to_string()))?;

        applied += 1;
        offset = end;
    }

    Ok((offset, applied))
}

fn apply_replayed(state: &mut StoreState, record: JournalRecord) -> StoreResult<()> {
    match record {
        JournalRecord::EntryCommitted { entry } => {
            let tail = state.tail(entry.venue_id);
            state.check_commit(&entry, tail.as_ref())?;
            state.apply_commit(entry);
        }
        JournalRecord::IdempotencyUpserted { record } => state.put_record(record),
        JournalRecord::IdempotencyRemoved { key } => state.remove_record(&key),
        JournalRecord::IdempotencyPurged { now } => {
            state.purge_expired(now);
        }
        JournalRecord::AlertInserted { alert } => {
            let seq = alert.seq;
            let planned = state.plan_alert_insert(alert)?;
            if planned.seq != seq {
                return Err(StoreError::InvalidState(format!(
                    "alert {} has seq {seq}, expected {}",
                    planned.id, planned.seq
                )));
            }
            state.apply_alert_insert(planned);
        }
        JournalRecord::AlertResolved { id, resolution } => {
            let resolved = state.plan_resolve(id, resolution)?;
            state.apply_resolve(resolved);
        }
    }
    Ok(())
}

impl LedgerStore for JournalStore {
    fn tail(&self, venue: VenueId) -> StoreResult<Option<ChainTail>> {
        Ok(self.read()?.tail(venue))
    }

    fn commit_entry(
        &self,
        entry: &LedgerEntry,
        expected_tail: Option<&ChainTail>,
    ) -> StoreResult<()> {
        let mut w = self.lock_writer()?;
        self.read()?.check_commit(entry, expected_tail)?;
        self.append(&mut w, &JournalRecord::EntryCommitted { entry: entry.clone() })?;
        self.write()?.apply_commit(entry.clone());
        Ok(())
    }

    fn get(&self, id: EntryId) -> StoreResult<Option<LedgerEntry>> {
        Ok(self.read()?.get(id))
    }

    fn get_by_key(&self, key: &str) -> StoreResult<Option<LedgerEntry>> {
        Ok(self.read()?.get_by_key(key))
    }

    fn range(&self, venue: VenueId, from: u64, to: u64) -> StoreResult<Vec<LedgerEntry>> {
        Ok(self.read()?.range(venue, from, to))
    }

    fn query(&self, query: &EntryQuery) -> StoreResult<Vec<LedgerEntry>> {
        Ok(self.read()?.query(query))
    }

    fn venues(&self) -> StoreResult<Vec<VenueId>> {
        Ok(self.read()?.venues())
    }
}

impl IdempotencyStore for JournalStore {
    fn insert_if_absent(
        &self,
        record: IdempotencyRecord,
        now: DateTime<Utc>,
    ) -> StoreResult<InsertOutcome> {
        let mut w = self.lock_writer()?;
        if let Some(existing) = self.read()?.live_record(&record.key, now) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        let record = JournalRecord::IdempotencyUpserted { record };
        self.append(&mut w, &record)?;
        if let JournalRecord::IdempotencyUpserted { record } = record {
            self.write()?.put_record(record);
        }
        Ok(InsertOutcome::Inserted)
    }

    fn get_record(&self, key: &str, now: DateTime<Utc>) -> StoreResult<Option<IdempotencyRecord>> {
        Ok(self.read()?.live_record(key, now).cloned())
    }

    fn complete(
        &self,
        key: &str,
        fingerprint: &RequestFingerprint,
        response: CachedResponse,
        entry_id: Option<EntryId>,
        now: DateTime<Utc>,
    ) -> StoreResult<IdempotencyRecord> {
        let mut w = self.lock_writer()?;
        let completed = self
            .read()?
            .plan_complete(key, fingerprint, response, entry_id, now)?;
        self.append(&mut w, &JournalRecord::IdempotencyUpserted { record: completed.clone() })?;
        self.write()?.put_record(completed.clone());
        Ok(completed)
    }

    fn remove_processing(
        &self,
        key: &str,
        fingerprint: &RequestFingerprint,
    ) -> StoreResult<bool> {
        let mut w = self.lock_writer()?;
        if !self.read()?.is_processing_for(key, fingerprint) {
            return Ok(false);
        }
        self.append(&mut w, &JournalRecord::IdempotencyRemoved { key: key.to_string() })?;
        self.write()?.remove_record(key);
        Ok(true)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut w = self.lock_writer()?;
        self.append(&mut w, &JournalRecord::IdempotencyPurged { now })?;
        Ok(self.write()?.purge_expired(now))
    }
}

impl AlertStore for JournalStore {
    fn insert_alert(&self, alert: CashVarianceAlert) -> StoreResult<CashVarianceAlert> {
        let mut w = self.lock_writer()?;
        let stored = self.read()?.plan_alert_insert(alert)?;
        self.append(&mut w, &JournalRecord::AlertInserted { alert: stored.clone() })?;
        self.write()?.apply_alert_insert(stored.clone());
        Ok(stored)
    }

    fn get_alert(&self, id: AlertId) -> StoreResult<Option<CashVarianceAlert>> {
        Ok(self.read()?.get_alert(id))
    }

    fn resolve_alert(
        &self,
        id: AlertId,
        resolution: Resolution,
    ) -> StoreResult<CashVarianceAlert> {
        let mut w = self.lock_writer()?;
        let resolved = self.read()?.plan_resolve(id, resolution.clone())?;
        self.append(&mut w, &JournalRecord::AlertResolved { id, resolution })?;
        self.write()?.apply_resolve(resolved.clone());
        Ok(resolved)
    }

    fn alerts_after(&self, after_seq: u64, limit: usize) -> StoreResult<Vec<CashVarianceAlert>> {
        Ok(self.read()?.alerts_after(after_seq, limit))
    }

    fn query_alerts(&self, query: &AlertQuery) -> StoreResult<Vec<CashVarianceAlert>> {
        Ok(self.read()?.query_alerts(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::fixtures::*;
    use chrono::Duration;
    use tally_types::{Severity, StaffId};

    fn open(dir: &tempfile::TempDir) -> JournalStore {
        JournalStore::open(dir.path().join("ledger.journal"), JournalConfig::default()).unwrap()
    }

    fn append(store: &JournalStore, venue: u64, key: &str) -> LedgerEntry {
        let tail = store.tail(VenueId(venue)).unwrap();
        let entry = entry_after(venue, tail.as_ref(), key);
        store.commit_entry(&entry, tail.as_ref()).unwrap();
        entry
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let (first, second, alert_id) = {
            let store = open(&dir);
            let first = append(&store, 1, "a");
            let second = append(&store, 1, "b");

            store.insert_if_absent(processing("req", 1), t0()).unwrap();
            store
                .complete(
                    "req",
                    &RequestFingerprint([1; 32]),
                    CachedResponse { status: 201, body: b"ok".to_vec() },
                    Some(second.id),
                    t0(),
                )
                .unwrap();

            let alert = store.insert_alert(alert(1, Severity::High)).unwrap();
            store
                .resolve_alert(
                    alert.id,
                    Resolution { resolved_by: StaffId(2), resolved_at: t0(), notes: "ok".into() },
                )
                .unwrap();
            (first, second, alert.id)
        };

        let store = open(&dir);
        assert_eq!(store.get(first.id).unwrap().unwrap(), first);
        assert_eq!(store.tail(VenueId(1)).unwrap().unwrap().entry_id, second.id);

        let record = store.get_record("req", t0()).unwrap().unwrap();
        assert!(record.is_completed());
        assert_eq!(record.ledger_entry_id, Some(second.id));

        let alert = store.get_alert(alert_id).unwrap().unwrap();
        assert_eq!(alert.seq, 1);
        assert!(alert.is_resolved());

        // The chain continues after reopen.
        assert_eq!(append(&store, 1, "c").entry_number, 3);
    }

    #[test]
    fn torn_tail_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.journal");
        let good_len = {
            let store = open(&dir);
            append(&store, 1, "a");
            append(&store, 1, "b");
            store.journal_len().unwrap()
        };

        // A frame header promising more bytes than were written.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&500u32.to_le_bytes()).unwrap();
        file.write_all(&[0xAB; 6]).unwrap();
        drop(file);

        let store = open(&dir);
        assert_eq!(store.entry_count(VenueId(1)).unwrap(), 2);
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len);
        assert_eq!(append(&store, 1, "c").entry_number, 3);
    }

    #[test]
    fn bad_checksum_on_last_record_is_a_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.journal");
        {
            let store = open(&dir);
            append(&store, 1, "a");
            append(&store, 1, "b");
        }

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 2;
        bytes[last] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        let store = open(&dir);
        assert_eq!(store.entry_count(VenueId(1)).unwrap(), 1);
    }

    #[test]
    fn damage_before_the_tail_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.journal");
        {
            let store = open(&dir);
            append(&store, 1, "a");
            append(&store, 1, "b");
        }

        let mut bytes = fs::read(&path).unwrap();
        bytes[HEADER_SIZE as usize + 3] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        let err = JournalStore::open(&path, JournalConfig::default()).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { offset: 0, .. }));
        assert!(err.is_unavailable());
    }

    #[test]
    fn removals_and_purges_replay() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open(&dir);
            store.insert_if_absent(processing("gone", 1), t0()).unwrap();
            store.insert_if_absent(processing("old", 2), t0()).unwrap();
            assert!(store.remove_processing("gone", &RequestFingerprint([1; 32])).unwrap());
            assert_eq!(store.purge_expired(t0() + Duration::hours(25)).unwrap(), 1);
        }

        let store = open(&dir);
        assert_eq!(store.record_count().unwrap(), 0);
    }

    #[test]
    fn rejected_writes_leave_no_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        append(&store, 1, "a");
        let len = store.journal_len().unwrap();

        let stale = entry_after(1, None, "b");
        assert!(store.commit_entry(&stale, None).is_err());
        assert_eq!(store.journal_len().unwrap(), len);
    }
}
