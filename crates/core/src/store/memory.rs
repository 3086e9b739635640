use super::{prepare_create, prepare_update, Record, RecordStore};
use crate::{ClinicError, ClinicResult};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Process-local store. Ids start at 1 and are never reused.
#[derive(Debug)]
pub struct InMemoryStore<R> {
    inner: Mutex<MemoryState<R>>,
}

#[derive(Debug)]
struct MemoryState<R> {
    last_id: u64,
    records: BTreeMap<u64, R>,
}

impl<R: Record> InMemoryStore<R> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryState {
                last_id: 0,
                records: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> ClinicResult<MutexGuard<'_, MemoryState<R>>> {
        self.inner.lock().map_err(|_| ClinicError::LockPoisoned)
    }
}

impl<R: Record> Default for InMemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> RecordStore<R> for InMemoryStore<R> {
    fn create(&self, record: R) -> ClinicResult<R> {
        let mut state = self.lock()?;
        state.last_id += 1;
        let record = prepare_create(record, state.last_id, Utc::now());
        state.records.insert(record.id(), record.clone());
        Ok(record)
    }

    fn find_by_id(&self, id: u64) -> ClinicResult<Option<R>> {
        Ok(self.lock()?.records.get(&id).cloned())
    }

    fn find_many(&self, filter: &dyn Fn(&R) -> bool) -> ClinicResult<Vec<R>> {
        Ok(self
            .lock()?
            .records
            .values()
            .filter(|r| filter(r))
            .cloned()
            .collect())
    }

    fn update(&self, record: R) -> ClinicResult<R> {
        let mut state = self.lock()?;
        let stored = state.records.get(&record.id()).ok_or(ClinicError::NotFound {
            kind: R::KIND,
            id: record.id(),
        })?;
        let record = prepare_update(stored, record, Utc::now())?;
        state.records.insert(record.id(), record.clone());
        Ok(record)
    }

    fn delete(&self, id: u64) -> ClinicResult<bool> {
        Ok(self.lock()?.records.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{self as shared, Note};

    #[test]
    fn assigns_sequential_ids() {
        shared::assigns_sequential_ids(&InMemoryStore::<Note>::new());
    }

    #[test]
    fn update_bumps_version_and_rejects_stale_writes() {
        shared::update_bumps_version_and_rejects_stale_writes(&InMemoryStore::<Note>::new());
    }

    #[test]
    fn update_of_missing_record_is_not_found() {
        shared::update_of_missing_record_is_not_found(&InMemoryStore::<Note>::new());
    }

    #[test]
    fn find_many_filters_in_id_order() {
        shared::find_many_filters_in_id_order(&InMemoryStore::<Note>::new());
    }

    #[test]
    fn delete_reports_existence() {
        shared::delete_reports_existence(&InMemoryStore::<Note>::new());
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let store = InMemoryStore::<Note>::new();
        let first = store.create(Note::new("a")).unwrap();
        store.delete(first.id).unwrap();
        let second = store.create(Note::new("b")).unwrap();
        assert_eq!(second.id, 2);
    }
}
