//! MemoryRecordStore: the persistence port held in process.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::traits::RecordStore;
use crate::types::{Filter, Record, RecordKind, Table};

/// In-memory record store for tests and database-less runs. Evaluates the
/// same filters the Postgres adapter turns into SQL. Thread-safe.
///
/// Seeding (`with`, `seed`) does not count as a write; only `create` does,
/// so tests can assert exactly how many inserts a handler performed.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<Record>>,
    writes: AtomicUsize,
    list_queries: AtomicUsize,
    fail_lists: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style seeding.
    pub fn with<T: Table>(self, value: T) -> Self {
        self.seed(value);
        self
    }

    pub fn seed<T: Table>(&self, value: T) {
        self.lock().push(value.into_record());
    }

    /// All stored records of one kind, in insertion order.
    pub fn records<T: Table>(&self) -> Vec<T> {
        self.lock()
            .iter()
            .filter(|r| r.kind() == T::KIND)
            .cloned()
            .filter_map(T::from_record)
            .collect()
    }

    /// Number of successful `create` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of `get_list` calls, including failed ones.
    pub fn list_queries(&self) -> usize {
        self.list_queries.load(Ordering::SeqCst)
    }

    /// Make every subsequent list query fail with `StoreError::Unavailable`.
    pub fn fail_list_queries(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `create` fail with `StoreError::Unavailable`.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_by_id(&self, kind: RecordKind, id: &str) -> Result<Record, StoreError> {
        self.lock()
            .iter()
            .find(|r| r.kind() == kind && r.id() == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind,
                id: id.to_string(),
            })
    }

    async fn get_list(
        &self,
        kind: RecordKind,
        filters: &[Filter],
    ) -> Result<Vec<Record>, StoreError> {
        self.list_queries.fetch_add(1, Ordering::SeqCst);

        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("list queries disabled".into()));
        }

        if let Some(unknown) = filters.iter().find(|f| !kind.has_column(&f.field)) {
            return Err(StoreError::UnknownField {
                kind,
                field: unknown.field.clone(),
            });
        }

        let matched = self
            .lock()
            .iter()
            .filter(|r| r.kind() == kind)
            .filter(|r| {
                filters
                    .iter()
                    .all(|f| r.field(&f.field).is_some_and(|actual| f.matches(&actual)))
            })
            .cloned()
            .collect();

        Ok(matched)
    }

    async fn create(&self, record: &Record) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }

        let mut records = self.lock();
        if records
            .iter()
            .any(|r| r.kind() == record.kind() && r.id() == record.id())
        {
            return Err(StoreError::Duplicate {
                kind: record.kind(),
                id: record.id().to_string(),
            });
        }

        records.push(record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
