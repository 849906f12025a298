//! The persistence port consumed by the recurrence engine.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{Filter, Record, RecordKind, Table};

/// Fetch-by-id, filtered list, and insert over every `RecordKind`.
///
/// Implemented by `PgRecordStore` (postgres) and `MemoryRecordStore` (tests).
/// Also implemented for `Arc<S>` so a store can be shared for assertions.
/// Conflicting concurrent inserts are the adapter's problem: nothing above
/// this trait serializes writes.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load a single record. Missing rows are `StoreError::NotFound`.
    async fn get_by_id(&self, kind: RecordKind, id: &str) -> Result<Record, StoreError>;

    /// Load every record of `kind` matching all `filters`.
    async fn get_list(&self, kind: RecordKind, filters: &[Filter])
        -> Result<Vec<Record>, StoreError>;

    /// Insert a new record.
    async fn create(&self, record: &Record) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn get_by_id(&self, kind: RecordKind, id: &str) -> Result<Record, StoreError> {
        (**self).get_by_id(kind, id).await
    }

    async fn get_list(
        &self,
        kind: RecordKind,
        filters: &[Filter],
    ) -> Result<Vec<Record>, StoreError> {
        (**self).get_list(kind, filters).await
    }

    async fn create(&self, record: &Record) -> Result<(), StoreError> {
        (**self).create(record).await
    }
}

/// Typed wrappers over `RecordStore`, so callers work with model structs
/// instead of `Record` variants.
#[async_trait]
pub trait RecordStoreExt: RecordStore {
    async fn fetch<T: Table>(&self, id: &str) -> Result<T, StoreError> {
        let record = self.get_by_id(T::KIND, id).await?;
        let actual = record.kind();
        T::from_record(record).ok_or(StoreError::KindMismatch {
            expected: T::KIND,
            actual,
        })
    }

    async fn list<T: Table>(&self, filters: &[Filter]) -> Result<Vec<T>, StoreError> {
        self.get_list(T::KIND, filters)
            .await?
            .into_iter()
            .map(|record| {
                let actual = record.kind();
                T::from_record(record).ok_or(StoreError::KindMismatch {
                    expected: T::KIND,
                    actual,
                })
            })
            .collect()
    }

    async fn insert<T: Table + Clone + Sync>(&self, value: &T) -> Result<(), StoreError> {
        self.create(&value.clone().into_record()).await
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}
