//! Trait interfaces between the engine and its host ledger.
//!
//! - [`LedgerStub`]: the per-call view of the ledger a contract operation runs
//!   against (reads, staged writes, key history, composite keys)
//! - [`VersionedStore`]: committed key/value state with full history, which a
//!   host implements once (in memory here, RocksDB in drive-node)

use crate::error::DriveError;
use crate::ledger::{self, Versioned, WriteSet};
use crate::types::HistoryEntry;

/// Ledger access for a single contract invocation.
///
/// Everything a contract call reads or writes goes through one stub, and the
/// host commits or discards the call's writes as a unit.
pub trait LedgerStub {
    /// Current value of `key`, or `None` if it has never been written.
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, DriveError>;

    /// Set the current value of `key`. Prior values remain in the key's history.
    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), DriveError>;

    /// Every recorded version of `key`.
    ///
    /// Order follows host convention and is not guaranteed; callers orient
    /// entries by [`HistoryEntry::recorded_at`].
    fn get_history_for_key(&self, key: &str) -> Result<Vec<HistoryEntry>, DriveError>;

    /// Visit `key`'s versions newest first until `visit` returns `false`.
    ///
    /// Default implementation: sort [`get_history_for_key`](Self::get_history_for_key)
    /// by `recorded_at`. Hosts that can walk history backwards override it so
    /// a bounded read does not load the whole history.
    fn scan_history_for_key(
        &self,
        key: &str,
        visit: &mut dyn FnMut(HistoryEntry) -> bool,
    ) -> Result<(), DriveError> {
        newest_first(self.get_history_for_key(key)?, visit);
        Ok(())
    }

    /// Build a namespaced key that cannot collide with a raw entity key.
    ///
    /// Default implementation: [`ledger::composite_key`].
    fn create_composite_key(
        &self,
        namespace: &str,
        components: &[&str],
    ) -> Result<String, DriveError> {
        ledger::composite_key(namespace, components)
    }
}

/// Committed versioned key/value storage.
///
/// Every committed write is stamped with a store-wide, strictly increasing
/// commit sequence, which is both the key's current version and the
/// `recorded_at` of its history entry.
pub trait VersionedStore: Send + Sync {
    /// Latest committed value and version of `key`.
    fn read(&self, key: &str) -> Result<Option<Versioned>, DriveError>;

    /// All committed versions of `key`, in the store's native order.
    fn history(&self, key: &str) -> Result<Vec<HistoryEntry>, DriveError>;

    /// Visit committed versions of `key` newest first until `visit` returns `false`.
    fn scan_history(
        &self,
        key: &str,
        visit: &mut dyn FnMut(HistoryEntry) -> bool,
    ) -> Result<(), DriveError> {
        newest_first(self.history(key)?, visit);
        Ok(())
    }

    /// Validate `set.reads` against current versions and, if none changed,
    /// apply `set.writes` atomically.
    ///
    /// Returns the commit sequence of the applied writes (or the current
    /// sequence for a read-only set).
    ///
    /// # Errors
    ///
    /// - [`DriveError::Conflict`] if any key in the read set moved on
    /// - [`DriveError::Upstream`] on storage failure
    fn commit(&self, set: WriteSet) -> Result<u64, DriveError>;
}

fn newest_first(mut entries: Vec<HistoryEntry>, visit: &mut dyn FnMut(HistoryEntry) -> bool) {
    entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
    for entry in entries {
        if !visit(entry) {
            break;
        }
    }
}
