//! JSON file-backed record store.
//!
//! ## Storage Layout
//!
//! ```text
//! <dir>/
//!   .lock          # advisory lock shared by every writer on this directory
//!   next_id        # last id handed out, as decimal text
//!   1.json         # one pretty-printed record per file
//!   2.json
//! ```
//!
//! The server and the CLI open the same directory, so every write holds an exclusive lock on
//! `.lock` (through `fs2`) on top of the in-process mutex. Updates go to a temporary sibling
//! file first and are then renamed into place. New records are opened with `create_new`, so a
//! create never replaces a record that is already on disk.

use super::{prepare_create, prepare_update, Record, RecordStore};
use crate::constants::{ID_COUNTER_FILENAME, LOCK_FILENAME, RECORD_FILE_EXTENSION};
use crate::{ClinicError, ClinicResult};
use chrono::Utc;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub struct JsonFileStore<R> {
    dir: PathBuf,
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> JsonFileStore<R> {
    /// Opens the store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::StorageDirCreation`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> ClinicResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(ClinicError::StorageDirCreation)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
            _record: PhantomData,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Serialises writers in this process and across processes sharing the directory.
    fn lock(&self) -> ClinicResult<WriteGuard<'_>> {
        let local = self.write_lock.lock().map_err(|_| ClinicError::LockPoisoned)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.dir.join(LOCK_FILENAME))
            .map_err(ClinicError::FileWrite)?;
        file.lock_exclusive().map_err(ClinicError::FileWrite)?;
        Ok(WriteGuard {
            file,
            _local: local,
        })
    }

    fn record_path(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{id}.{RECORD_FILE_EXTENSION}"))
    }

    fn next_id(&self) -> ClinicResult<u64> {
        let counter = self.dir.join(ID_COUNTER_FILENAME);
        let last = match fs::read_to_string(&counter) {
            Ok(text) => text.trim().parse::<u64>().map_err(|e| {
                ClinicError::Deserialization(format!("{}: {e}", counter.display()))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => return Err(ClinicError::FileRead(e)),
        };
        let next = last + 1;
        write_atomic(&counter, next.to_string().as_bytes())?;
        Ok(next)
    }

    fn read_record(&self, path: &Path) -> ClinicResult<Option<R>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ClinicError::FileRead(e)),
        };
        decode::<R>(&contents, path).map(Some)
    }

    fn write_record(&self, record: &R) -> ClinicResult<()> {
        let json = serde_json::to_vec_pretty(record).map_err(ClinicError::Serialization)?;
        write_atomic(&self.record_path(record.id()), &json)
    }

    fn write_new_record(&self, record: &R) -> ClinicResult<()> {
        let json = serde_json::to_vec_pretty(record).map_err(ClinicError::Serialization)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.record_path(record.id()))
            .map_err(ClinicError::FileWrite)?;
        file.write_all(&json).map_err(ClinicError::FileWrite)?;
        file.sync_all().map_err(ClinicError::FileWrite)
    }
}

impl<R: Record> RecordStore<R> for JsonFileStore<R> {
    fn create(&self, record: R) -> ClinicResult<R> {
        let _guard = self.lock()?;
        let id = self.next_id()?;
        let record = prepare_create(record, id, Utc::now());
        self.write_new_record(&record)?;
        tracing::debug!(kind = R::KIND, id, "record created");
        Ok(record)
    }

    fn find_by_id(&self, id: u64) -> ClinicResult<Option<R>> {
        self.read_record(&self.record_path(id))
    }

    fn find_many(&self, filter: &dyn Fn(&R) -> bool) -> ClinicResult<Vec<R>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ClinicError::FileRead(e)),
        };

        let mut records = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let is_record = path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(RECORD_FILE_EXTENSION);
            if !is_record {
                continue;
            }

            match self.read_record(&path) {
                Ok(Some(record)) if filter(&record) => records.push(record),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("skipping unreadable record {}: {}", path.display(), e);
                }
            }
        }

        records.sort_by_key(|r| r.id());
        Ok(records)
    }

    fn update(&self, record: R) -> ClinicResult<R> {
        let _guard = self.lock()?;
        let stored = self
            .find_by_id(record.id())?
            .ok_or(ClinicError::NotFound {
                kind: R::KIND,
                id: record.id(),
            })?;
        let record = prepare_update(&stored, record, Utc::now())?;
        self.write_record(&record)?;
        Ok(record)
    }

    fn delete(&self, id: u64) -> ClinicResult<bool> {
        let _guard = self.lock()?;
        match fs::remove_file(self.record_path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ClinicError::FileDelete(e)),
        }
    }
}

struct WriteGuard<'a> {
    file: File,
    _local: MutexGuard<'a, ()>,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("failed to release store lock: {}", e);
        }
    }
}

/// Decodes a stored record, reporting the JSON path of the first mismatching field.
fn decode<R: Record>(contents: &str, path: &Path) -> ClinicResult<R> {
    let mut deserializer = serde_json::Deserializer::from_str(contents);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
        let field = err.path().to_string();
        let field = if field.is_empty() || field == "." {
            "<root>".to_string()
        } else {
            field
        };
        ClinicError::Deserialization(format!(
            "{} schema mismatch in {} at {field}: {}",
            R::KIND,
            path.display(),
            err.into_inner()
        ))
    })
}

fn write_atomic(path: &Path, contents: &[u8]) -> ClinicResult<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).map_err(ClinicError::FileWrite)?;
    fs::rename(&tmp, path).map_err(ClinicError::FileWrite)
}
