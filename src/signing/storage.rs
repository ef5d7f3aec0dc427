//! Storage for signed URL usage budgets.
//!
//! # Responsibilities
//! - Persist `{identifier, expiry, remaining usage}` records
//! - Consume one usage atomically, removing the record when it hits zero
//! - Purge expired records on demand
//!
//! # Design Decisions
//! - The storage owns record lifetime; the signer never deletes directly
//! - `consume` is a single atomic step in every backend, so two concurrent
//!   verifications of a one-use link cannot both succeed
//! - File storage replaces the whole file on each write and holds an OS
//!   lock on a sidecar `.lock` file across load, modify and save, so separate
//!   instances and processes sharing the path stay atomic

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};

use crate::signing::error::StorageError;

/// A stored signed URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrlRecord {
    pub identifier: String,
    /// Unix timestamp (seconds).
    pub expires_at: u64,
    pub remaining_usage: u32,
    pub protected_path: String,
}

impl SignedUrlRecord {
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now
    }
}

/// Backend for signed URL records.
pub trait SignedUrlStorage: Send + Sync {
    /// Insert a freshly issued record.
    fn store(&self, record: SignedUrlRecord) -> Result<(), StorageError>;

    /// Atomically take one usage.
    ///
    /// Returns the usages left afterwards, or `None` if the identifier is
    /// unknown. A record that reaches zero is removed in the same step.
    fn consume(&self, identifier: &str) -> Result<Option<u32>, StorageError>;

    /// Inspect a record without consuming it.
    fn get(&self, identifier: &str) -> Result<Option<SignedUrlRecord>, StorageError>;

    /// Remove every record expired at `now`. Returns how many were removed.
    fn gc(&self, now: u64) -> Result<usize, StorageError>;
}

/// Decrement a record in place. Returns the remaining usages.
fn take_usage(record: &mut SignedUrlRecord) -> u32 {
    record.remaining_usage = record.remaining_usage.saturating_sub(1);
    record.remaining_usage
}

/// Process-local storage on a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    records: DashMap<String, SignedUrlRecord>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SignedUrlStorage for InMemoryStorage {
    fn store(&self, record: SignedUrlRecord) -> Result<(), StorageError> {
        self.records.insert(record.identifier.clone(), record);
        Ok(())
    }

    fn consume(&self, identifier: &str) -> Result<Option<u32>, StorageError> {
        // The entry guard holds the shard's write lock for the whole step.
        match self.records.entry(identifier.to_string()) {
            Entry::Occupied(mut entry) => {
                let remaining = take_usage(entry.get_mut());
                if remaining == 0 {
                    entry.remove();
                }
                Ok(Some(remaining))
            }
            Entry::Vacant(_) => Ok(None),
        }
    }

    fn get(&self, identifier: &str) -> Result<Option<SignedUrlRecord>, StorageError> {
        Ok(self.records.get(identifier).map(|r| r.value().clone()))
    }

    fn gc(&self, now: u64) -> Result<usize, StorageError> {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        Ok(before.saturating_sub(self.records.len()))
    }
}

/// Storage scoped to one user session.
///
/// The host loads it from the session with `from_json` and writes it back
/// with `to_json` at the end of the request.
#[derive(Debug, Default)]
pub struct SessionStorage {
    records: Mutex<HashMap<String, SignedUrlRecord>>,
}

impl SessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(data: &str) -> Result<Self, StorageError> {
        let records: HashMap<String, SignedUrlRecord> = if data.trim().is_empty() {
            HashMap::new()
        } else {
            serde_json::from_str(data)?
        };
        Ok(Self {
            records: Mutex::new(records),
        })
    }

    pub fn to_json(&self) -> Result<String, StorageError> {
        let records = self.records.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(serde_json::to_string(&*records)?)
    }
}

impl SignedUrlStorage for SessionStorage {
    fn store(&self, record: SignedUrlRecord) -> Result<(), StorageError> {
        let mut records = self.records.lock().map_err(|_| StorageError::Poisoned)?;
        records.insert(record.identifier.clone(), record);
        Ok(())
    }

    fn consume(&self, identifier: &str) -> Result<Option<u32>, StorageError> {
        let mut records = self.records.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(consume_in_map(&mut records, identifier))
    }

    fn get(&self, identifier: &str) -> Result<Option<SignedUrlRecord>, StorageError> {
        let records = self.records.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(records.get(identifier).cloned())
    }

    fn gc(&self, now: u64) -> Result<usize, StorageError> {
        let mut records = self.records.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(purge_in_map(&mut records, now))
    }
}

/// JSON file storage that survives restarts.
///
/// Every operation runs under an exclusive lock on `<path>.lock` and every
/// write replaces the whole file, so readers never observe a partial file.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_path = OsString::from(path.as_os_str());
        lock_path.push(".lock");
        Self {
            path,
            lock_path: PathBuf::from(lock_path),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    fn load(&self) -> Result<HashMap<String, SignedUrlRecord>, StorageError> {
        match File::open(&self.path) {
            Ok(file) => Ok(serde_json::from_reader(BufReader::new(file))?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, records: &HashMap<String, SignedUrlRecord>) -> Result<(), StorageError> {
        let tmp = self.path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut writer, records)?;
            writer.flush()?;
        }
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn with_records<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, SignedUrlRecord>) -> (T, bool),
    ) -> Result<T, StorageError> {
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        let mut lock = RwLock::new(lock_file);
        let _guard = lock.write()?;

        let mut records = self.load()?;
        let (result, dirty) = f(&mut records);
        if dirty {
            self.save(&records)?;
        }
        Ok(result)
    }
}

impl SignedUrlStorage for FileStorage {
    fn store(&self, record: SignedUrlRecord) -> Result<(), StorageError> {
        self.with_records(|records| {
            records.insert(record.identifier.clone(), record);
            ((), true)
        })
    }

    fn consume(&self, identifier: &str) -> Result<Option<u32>, StorageError> {
        self.with_records(|records| {
            let result = consume_in_map(records, identifier);
            let dirty = result.is_some();
            (result, dirty)
        })
    }

    fn get(&self, identifier: &str) -> Result<Option<SignedUrlRecord>, StorageError> {
        self.with_records(|records| (records.get(identifier).cloned(), false))
    }

    fn gc(&self, now: u64) -> Result<usize, StorageError> {
        self.with_records(|records| {
            let purged = purge_in_map(records, now);
            (purged, purged > 0)
        })
    }
}

fn consume_in_map(records: &mut HashMap<String, SignedUrlRecord>, identifier: &str) -> Option<u32> {
    let record = records.get_mut(identifier)?;
    let remaining = take_usage(record);
    if remaining == 0 {
        records.remove(identifier);
    }
    Some(remaining)
}

fn purge_in_map(records: &mut HashMap<String, SignedUrlRecord>, now: u64) -> usize {
    let before = records.len();
    records.retain(|_, record| !record.is_expired(now));
    before - records.len()
}
