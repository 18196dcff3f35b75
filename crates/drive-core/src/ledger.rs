//! Optimistic ledger transactions and an in-memory versioned store.
//!
//! A [`Transaction`] implements [`LedgerStub`] over any [`VersionedStore`]:
//! reads record the version they observed, writes are staged, and
//! [`Transaction::commit`] hands both to the store, which rejects the whole
//! set if any observed key has since been rewritten. Nothing a contract call
//! does becomes visible until that commit succeeds.
//!
//! [`MemoryStore`] keeps everything in `HashMap`s and is meant for tests and
//! embedding; the node uses RocksDB (drive-node).

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use crate::error::{DriveError, InputError};
use crate::traits::{LedgerStub, VersionedStore};
use crate::types::HistoryEntry;

/// Separator used between composite key parts.
const COMPOSITE_SEP: char = '\u{0}';

/// `recorded_at` given to a write that is staged but not yet committed.
pub const PENDING_RECORDED_AT: u64 = u64::MAX;

/// Build a composite key: `\0namespace\0component\0...`.
///
/// The leading separator keeps composite keys disjoint from plain entity keys.
pub fn composite_key(namespace: &str, components: &[&str]) -> Result<String, DriveError> {
    if namespace.is_empty() {
        return Err(InputError::InvalidCompositeKeyPart(namespace.to_string()).into());
    }
    let mut key = String::with_capacity(
        2 + namespace.len() + components.iter().map(|c| c.len() + 1).sum::<usize>(),
    );
    key.push(COMPOSITE_SEP);
    for part in std::iter::once(&namespace).chain(components.iter()) {
        if part.contains(COMPOSITE_SEP) {
            return Err(InputError::InvalidCompositeKeyPart(part.to_string()).into());
        }
        key.push_str(part);
        key.push(COMPOSITE_SEP);
    }
    Ok(key)
}

/// A committed value together with the commit sequence that wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub value: Vec<u8>,
    pub version: u64,
}

/// Read set and staged writes of one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSet {
    /// Key → version observed (`None` = observed absent).
    pub reads: BTreeMap<String, Option<u64>>,
    /// Key → new value. Last write per key wins.
    pub writes: BTreeMap<String, Vec<u8>>,
}

impl WriteSet {
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }
}

/// One contract invocation's view of a [`VersionedStore`].
pub struct Transaction<'s, S: VersionedStore + ?Sized> {
    store: &'s S,
    reads: RefCell<BTreeMap<String, Option<u64>>>,
    writes: BTreeMap<String, Vec<u8>>,
}

impl<'s, S: VersionedStore + ?Sized> Transaction<'s, S> {
    pub fn begin(store: &'s S) -> Self {
        Self {
            store,
            reads: RefCell::new(BTreeMap::new()),
            writes: BTreeMap::new(),
        }
    }

    /// Record the first version of `key` this transaction saw.
    fn observe(&self, key: &str, version: Option<u64>) {
        self.reads
            .borrow_mut()
            .entry(key.to_string())
            .or_insert(version);
    }

    /// Keys written so far.
    pub fn staged_keys(&self) -> impl Iterator<Item = &str> {
        self.writes.keys().map(String::as_str)
    }

    /// Validate and apply. Consumes the transaction; on error nothing is applied.
    pub fn commit(self) -> Result<u64, DriveError> {
        let set = WriteSet {
            reads: self.reads.into_inner(),
            writes: self.writes,
        };
        self.store.commit(set)
    }
}

impl<S: VersionedStore + ?Sized> LedgerStub for Transaction<'_, S> {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, DriveError> {
        if let Some(staged) = self.writes.get(key) {
            return Ok(Some(staged.clone()));
        }
        let current = self.store.read(key)?;
        self.observe(key, current.as_ref().map(|v| v.version));
        Ok(current.map(|v| v.value))
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), DriveError> {
        self.writes.insert(key.to_string(), value);
        Ok(())
    }

    fn get_history_for_key(&self, key: &str) -> Result<Vec<HistoryEntry>, DriveError> {
        let mut history = self.store.history(key)?;
        self.observe(key, history.iter().map(|e| e.recorded_at).max());
        if let Some(staged) = self.writes.get(key) {
            history.push(HistoryEntry {
                value: staged.clone(),
                recorded_at: PENDING_RECORDED_AT,
            });
        }
        Ok(history)
    }

    fn scan_history_for_key(
        &self,
        key: &str,
        visit: &mut dyn FnMut(HistoryEntry) -> bool,
    ) -> Result<(), DriveError> {
        let current = self.store.read(key)?.map(|v| v.version);
        self.observe(key, current);
        if let Some(staged) = self.writes.get(key) {
            let pending = HistoryEntry { value: staged.clone(), recorded_at: PENDING_RECORDED_AT };
            if !visit(pending) {
                return Ok(());
            }
        }
        self.store.scan_history(key, visit)
    }
}

#[derive(Default)]
struct MemoryInner {
    state: HashMap<String, Versioned>,
    /// Per key, oldest first.
    history: HashMap<String, Vec<HistoryEntry>>,
    sequence: u64,
}

/// In-memory versioned store.
///
/// History is returned newest-first, mirroring ledgers that walk their
/// block index backwards.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a current value.
    pub fn key_count(&self) -> usize {
        self.inner.read().state.len()
    }

    /// Last commit sequence handed out.
    pub fn sequence(&self) -> u64 {
        self.inner.read().sequence
    }
}

impl VersionedStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Versioned>, DriveError> {
        Ok(self.inner.read().state.get(key).cloned())
    }

    fn history(&self, key: &str) -> Result<Vec<HistoryEntry>, DriveError> {
        let inner = self.inner.read();
        Ok(inner
            .history
            .get(key)
            .map(|entries| entries.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    fn scan_history(
        &self,
        key: &str,
        visit: &mut dyn FnMut(HistoryEntry) -> bool,
    ) -> Result<(), DriveError> {
        let inner = self.inner.read();
        if let Some(entries) = inner.history.get(key) {
            for entry in entries.iter().rev() {
                if !visit(entry.clone()) {
                    break;
                }
            }
        }
        Ok(())
    }

    fn commit(&self, set: WriteSet) -> Result<u64, DriveError> {
        let mut inner = self.inner.write();
        for (key, seen) in &set.reads {
            let current = inner.state.get(key).map(|v| v.version);
            if current != *seen {
                return Err(DriveError::Conflict(key.clone()));
            }
        }
        if set.is_read_only() {
            return Ok(inner.sequence);
        }

        inner.sequence += 1;
        let sequence = inner.sequence;
        for (key, value) in set.writes {
            inner.history.entry(key.clone()).or_default().push(HistoryEntry {
                value: value.clone(),
                recorded_at: sequence,
            });
            inner.state.insert(key, Versioned { value, version: sequence });
        }
        Ok(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_key_layout() {
        let key = composite_key("WALLET", &["ABC1234"]).unwrap();
        assert_eq!(key, "\u{0}WALLET\u{0}ABC1234\u{0}");
        assert_ne!(key, "ABC1234");
    }

    #[test]
    fn composite_key_rejects_separator_and_empty_namespace() {
        assert!(composite_key("WALLET", &["A\u{0}B"]).is_err());
        assert!(composite_key("", &["A"]).is_err());
    }

    #[test]
    fn uncommitted_writes_are_invisible() {
        let store = MemoryStore::new();
        {
            let mut tx = Transaction::begin(&store);
            tx.put_state("k", b"v".to_vec()).unwrap();
            assert_eq!(tx.get_state("k").unwrap(), Some(b"v".to_vec()));
        }
        assert_eq!(store.read("k").unwrap(), None);
        assert_eq!(store.key_count(), 0);
    }

    #[test]
    fn commit_applies_all_writes_with_one_sequence() {
        let store = MemoryStore::new();
        let mut tx = Transaction::begin(&store);
        tx.put_state("a", b"1".to_vec()).unwrap();
        tx.put_state("b", b"2".to_vec()).unwrap();
        let seq = tx.commit().unwrap();
        assert_eq!(seq, 1);
        assert_eq!(store.read("a").unwrap().unwrap().version, 1);
        assert_eq!(store.read("b").unwrap().unwrap().version, 1);
    }

    #[test]
    fn history_is_newest_first_and_keeps_prior_versions() {
        let store = MemoryStore::new();
        for v in [b"1", b"2", b"3"] {
            let mut tx = Transaction::begin(&store);
            tx.put_state("k", v.to_vec()).unwrap();
            tx.commit().unwrap();
        }
        let history = store.history("k").unwrap();
        let values: Vec<_> = history.iter().map(|e| e.value.clone()).collect();
        assert_eq!(values, vec![b"3".to_vec(), b"2".to_vec(), b"1".to_vec()]);
        assert_eq!(store.read("k").unwrap().unwrap().value, b"3".to_vec());
    }

    #[test]
    fn concurrent_writer_causes_conflict() {
        let store = MemoryStore::new();
        let mut seed = Transaction::begin(&store);
        seed.put_state("wallet", b"0".to_vec()).unwrap();
        seed.commit().unwrap();

        let mut slow = Transaction::begin(&store);
        slow.get_state("wallet").unwrap();
        slow.put_state("wallet", b"10".to_vec()).unwrap();

        let mut fast = Transaction::begin(&store);
        fast.get_state("wallet").unwrap();
        fast.put_state("wallet", b"-50".to_vec()).unwrap();
        fast.commit().unwrap();

        assert_eq!(slow.commit(), Err(DriveError::Conflict("wallet".into())));
        assert_eq!(store.read("wallet").unwrap().unwrap().value, b"-50".to_vec());
    }

    #[test]
    fn observed_absence_conflicts_with_later_create() {
        let store = MemoryStore::new();
        let mut first = Transaction::begin(&store);
        assert!(first.get_state("w").unwrap().is_none());
        first.put_state("w", b"0".to_vec()).unwrap();

        let mut second = Transaction::begin(&store);
        assert!(second.get_state("w").unwrap().is_none());
        second.put_state("w", b"0".to_vec()).unwrap();

        first.commit().unwrap();
        assert!(second.commit().unwrap_err().is_retryable());
    }

    #[test]
    fn staged_write_appears_as_pending_history() {
        let store = MemoryStore::new();
        let mut tx = Transaction::begin(&store);
        tx.put_state("k", b"old".to_vec()).unwrap();
        tx.commit().unwrap();

        let mut tx = Transaction::begin(&store);
        tx.put_state("k", b"new".to_vec()).unwrap();
        let history = tx.get_history_for_key("k").unwrap();
        assert_eq!(history.len(), 2);
        let newest = history.iter().max_by_key(|e| e.recorded_at).unwrap();
        assert_eq!(newest.value, b"new".to_vec());
        assert_eq!(newest.recorded_at, PENDING_RECORDED_AT);
    }

    #[test]
    fn scan_visits_pending_then_committed_newest_first() {
        let store = MemoryStore::new();
        for v in [b"1", b"2", b"3"] {
            let mut tx = Transaction::begin(&store);
            tx.put_state("k", v.to_vec()).unwrap();
            tx.commit().unwrap();
        }
        let mut tx = Transaction::begin(&store);
        tx.put_state("k", b"4".to_vec()).unwrap();

        let mut seen = Vec::new();
        tx.scan_history_for_key("k", &mut |e| {
            seen.push(e.value);
            seen.len() < 3
        })
        .unwrap();
        assert_eq!(seen, vec![b"4".to_vec(), b"3".to_vec(), b"2".to_vec()]);
    }

    #[test]
    fn scan_records_read_for_conflict_detection() {
        let store = MemoryStore::new();
        let mut seed = Transaction::begin(&store);
        seed.put_state("k", b"1".to_vec()).unwrap();
        seed.commit().unwrap();

        let mut reader = Transaction::begin(&store);
        reader.scan_history_for_key("k", &mut |_| false).unwrap();
        reader.put_state("other", b"x".to_vec()).unwrap();

        let mut writer = Transaction::begin(&store);
        writer.put_state("k", b"2".to_vec()).unwrap();
        writer.commit().unwrap();

        assert_eq!(reader.commit(), Err(DriveError::Conflict("k".into())));
    }

    #[test]
    fn read_only_commit_keeps_sequence() {
        let store = MemoryStore::new();
        let tx = Transaction::begin(&store);
        tx.get_state("missing").unwrap();
        assert_eq!(tx.commit().unwrap(), 0);
        assert_eq!(store.sequence(), 0);
    }
}
