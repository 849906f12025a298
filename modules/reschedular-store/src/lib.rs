//! Persistence port for the recurrence engine.
//!
//! Three operations over four record kinds: fetch by id, filtered list, and
//! insert. `PgRecordStore` backs it with Postgres; `MemoryRecordStore` keeps
//! everything in process for tests and local runs.

pub mod error;
pub mod memory;
pub mod store;
pub mod traits;
pub mod types;

pub use error::StoreError;
pub use memory::MemoryRecordStore;
pub use store::PgRecordStore;
pub use traits::{RecordStore, RecordStoreExt};
pub use types::{Filter, FilterOp, FilterValue, Record, RecordKind, Table};
