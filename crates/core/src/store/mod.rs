//! Record storage.
//!
//! The services only need a small repository surface: create, look up by id, scan with a
//! predicate, update and delete. Two implementations are provided:
//!
//! - [`InMemoryStore`] keeps records in a `BTreeMap`; used by tests and ephemeral runs.
//! - [`JsonFileStore`] keeps one JSON file per record under a directory, so the server and
//!   the CLI share state.
//!
//! Both stores own the audit fields: they assign ids, stamp `created_at`/`updated_at`, and
//! maintain the optimistic `version` token. An update whose version differs from the stored
//! one is rejected with [`ClinicError::StaleRecord`].

use crate::{ClinicError, ClinicResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::InMemoryStore;

/// A persisted entity with store-managed identity and audit fields.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Human-readable entity name used in errors and logs.
    const KIND: &'static str;

    fn id(&self) -> u64;
    fn set_id(&mut self, id: u64);
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
    fn set_created_at(&mut self, at: DateTime<Utc>);
    fn set_updated_at(&mut self, at: DateTime<Utc>);
}

/// Repository surface required by the services.
pub trait RecordStore<R: Record>: Send + Sync {
    /// Persists a new record, assigning its id, timestamps and initial version.
    fn create(&self, record: R) -> ClinicResult<R>;

    fn find_by_id(&self, id: u64) -> ClinicResult<Option<R>>;

    /// Returns every record for which `filter` holds, in ascending id order.
    fn find_many(&self, filter: &dyn Fn(&R) -> bool) -> ClinicResult<Vec<R>>;

    /// Replaces a stored record.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::NotFound`] if no record has this id
    /// - [`ClinicError::StaleRecord`] if the record's version is not the stored version
    fn update(&self, record: R) -> ClinicResult<R>;

    /// Removes a record. Returns `false` if it did not exist.
    fn delete(&self, id: u64) -> ClinicResult<bool>;
}

fn prepare_create<R: Record>(mut record: R, id: u64, now: DateTime<Utc>) -> R {
    record.set_id(id);
    record.set_created_at(now);
    record.set_updated_at(now);
    record.set_version(1);
    record
}

fn prepare_update<R: Record>(stored: &R, mut record: R, now: DateTime<Utc>) -> ClinicResult<R> {
    if stored.version() != record.version() {
        return Err(ClinicError::StaleRecord {
            kind: R::KIND,
            id: record.id(),
        });
    }
    record.set_version(stored.version() + 1);
    record.set_updated_at(now);
    Ok(record)
}
