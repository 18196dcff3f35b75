//! RocksDB-backed versioned ledger state.
//!
//! Implements [`VersionedStore`] using three column families:
//! - `state`: key → current value and the commit sequence that wrote it
//! - `history`: `len(key) ‖ key ‖ sequence(BE)` → value, one row per committed version
//! - `metadata`: store-wide counters (last commit sequence)
//!
//! Every commit is validated and written under a single lock, and all of its
//! rows land in one atomic [`WriteBatch`].

use std::path::Path;

use parking_lot::Mutex;
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use tracing::{debug, info};

use drive_core::error::DriveError;
use drive_core::ledger::{Versioned, WriteSet};
use drive_core::traits::VersionedStore;
use drive_core::types::HistoryEntry;

// --- Column family names ---

const CF_STATE: &str = "state";
const CF_HISTORY: &str = "history";
const CF_METADATA: &str = "metadata";

const ALL_CFS: &[&str] = &[CF_STATE, CF_HISTORY, CF_METADATA];

// --- Metadata keys ---

const META_SEQUENCE: &[u8] = b"sequence";

/// Row stored in the `state` column family.
#[derive(bincode::Encode, bincode::Decode)]
struct StateRow {
    version: u64,
    value: Vec<u8>,
}

fn storage_err(e: impl std::fmt::Display) -> DriveError {
    DriveError::Upstream(e.to_string())
}

/// RocksDB-backed [`VersionedStore`].
///
/// History is returned oldest-first, the natural iteration order of the
/// `history` column family.
pub struct RocksStore {
    db: DB,
    /// Last committed sequence. Held for the whole of a commit.
    sequence: Mutex<u64>,
}

impl RocksStore {
    /// Open or create a database at `path`, creating missing column families.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DriveError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors)
            .map_err(storage_err)?;

        let mut store = Self { db, sequence: Mutex::new(0) };
        let sequence = store.load_sequence()?;
        *store.sequence.get_mut() = sequence;

        info!(path = %path.as_ref().display(), sequence, "opened ledger store");
        Ok(store)
    }

    /// Last commit sequence handed out.
    pub fn sequence(&self) -> u64 {
        *self.sequence.lock()
    }

    /// Flush all in-memory buffers to disk.
    pub fn flush(&self) -> Result<(), DriveError> {
        self.db.flush().map_err(storage_err)
    }

    // --- Internal helpers ---

    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, DriveError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| DriveError::Upstream(format!("missing column family: {name}")))
    }

    fn load_sequence(&self) -> Result<u64, DriveError> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self.db.get_cf(cf, META_SEQUENCE).map_err(storage_err)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| DriveError::Upstream("invalid sequence length".into()))?;
                Ok(u64::from_le_bytes(arr))
            }
            None => Ok(0),
        }
    }

    /// `len(key) as u32 BE ‖ key`. The length prefix keeps one key's rows
    /// from sharing a prefix with any longer key.
    fn history_prefix(key: &str) -> Result<Vec<u8>, DriveError> {
        let len = u32::try_from(key.len())
            .map_err(|_| DriveError::Upstream(format!("key too long: {} bytes", key.len())))?;
        let mut prefix = Vec::with_capacity(4 + key.len() + 8);
        prefix.extend_from_slice(&len.to_be_bytes());
        prefix.extend_from_slice(key.as_bytes());
        Ok(prefix)
    }

    fn history_key(key: &str, sequence: u64) -> Result<Vec<u8>, DriveError> {
        let mut row = Self::history_prefix(key)?;
        row.extend_from_slice(&sequence.to_be_bytes());
        Ok(row)
    }

    /// Commit sequence at the tail of a history row key.
    fn row_sequence(row_key: &[u8], prefix_len: usize) -> Result<u64, DriveError> {
        let seq_bytes: [u8; 8] = row_key[prefix_len..]
            .try_into()
            .map_err(|_| DriveError::Upstream("invalid history key length".into()))?;
        Ok(u64::from_be_bytes(seq_bytes))
    }

    fn decode_state(bytes: &[u8]) -> Result<StateRow, DriveError> {
        let (row, _): (StateRow, _) =
            bincode::decode_from_slice(bytes, bincode::config::standard()).map_err(storage_err)?;
        Ok(row)
    }

    fn current_version(&self, key: &str) -> Result<Option<u64>, DriveError> {
        Ok(self.read(key)?.map(|v| v.version))
    }
}

impl VersionedStore for RocksStore {
    fn read(&self, key: &str) -> Result<Option<Versioned>, DriveError> {
        let cf = self.cf_handle(CF_STATE)?;
        match self.db.get_cf(cf, key.as_bytes()).map_err(storage_err)? {
            Some(bytes) => {
                let row = Self::decode_state(&bytes)?;
                Ok(Some(Versioned { value: row.value, version: row.version }))
            }
            None => Ok(None),
        }
    }

    fn history(&self, key: &str) -> Result<Vec<HistoryEntry>, DriveError> {
        let cf = self.cf_handle(CF_HISTORY)?;
        let prefix = Self::history_prefix(key)?;
        let mut entries = Vec::new();

        let iter = self.db.iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (row_key, value) = item.map_err(storage_err)?;
            if !row_key.starts_with(&prefix) {
                break;
            }
            entries.push(HistoryEntry {
                value: value.into_vec(),
                recorded_at: Self::row_sequence(&row_key, prefix.len())?,
            });
        }

        debug!(key, entries = entries.len(), "read key history");
        Ok(entries)
    }

    fn scan_history(
        &self,
        key: &str,
        visit: &mut dyn FnMut(HistoryEntry) -> bool,
    ) -> Result<(), DriveError> {
        let cf = self.cf_handle(CF_HISTORY)?;
        let prefix = Self::history_prefix(key)?;
        let upper = Self::history_key(key, u64::MAX)?;

        let iter = self.db.iterator_cf(cf, IteratorMode::From(&upper, Direction::Reverse));
        let mut visited = 0usize;
        for item in iter {
            let (row_key, value) = item.map_err(storage_err)?;
            if !row_key.starts_with(&prefix) {
                break;
            }
            let entry = HistoryEntry {
                value: value.into_vec(),
                recorded_at: Self::row_sequence(&row_key, prefix.len())?,
            };
            visited += 1;
            if !visit(entry) {
                break;
            }
        }

        debug!(key, visited, "scanned key history backwards");
        Ok(())
    }

    fn commit(&self, set: WriteSet) -> Result<u64, DriveError> {
        let mut sequence = self.sequence.lock();

        for (key, seen) in &set.reads {
            if self.current_version(key)? != *seen {
                return Err(DriveError::Conflict(key.clone()));
            }
        }
        if set.is_read_only() {
            return Ok(*sequence);
        }

        let next = *sequence + 1;
        let cf_state = self.cf_handle(CF_STATE)?;
        let cf_history = self.cf_handle(CF_HISTORY)?;
        let cf_meta = self.cf_handle(CF_METADATA)?;

        let mut batch = WriteBatch::default();
        for (key, value) in &set.writes {
            batch.put_cf(cf_history, Self::history_key(key, next)?, value);
            let row = StateRow { version: next, value: value.clone() };
            let encoded =
                bincode::encode_to_vec(&row, bincode::config::standard()).map_err(storage_err)?;
            batch.put_cf(cf_state, key.as_bytes(), encoded);
        }
        batch.put_cf(cf_meta, META_SEQUENCE, next.to_le_bytes());

        self.db.write(batch).map_err(storage_err)?;
        *sequence = next;
        debug!(sequence = next, keys = set.writes.len(), "committed write set");
        Ok(next)
    }
}
