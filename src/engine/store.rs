// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! File-resident object store backing special slots.
//!
//! A store file is a JSON document of folders, each mapping object names to
//! payloads. The root folder is the empty string.
//!
//! ```json
//! { "": { "n_events": { "kind": "object", "data": { "entries": 12 } } },
//!   "histograms": { "h_pt": { "kind": "object", "data": { "counts": [1, 4, 2] } } } }
//! ```
//!
//! Within one run the first write to a path recreates the file and later
//! writes update it; [`WrittenFiles`] keeps that bookkeeping.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::MergeError;
use crate::graph::Payload;

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
struct Folders(BTreeMap<String, BTreeMap<String, Payload>>);

/// An object store file, loaded in memory.
#[derive(Debug)]
pub struct ObjectStore {
    path: PathBuf,
    folders: Folders,
}

impl ObjectStore {
    /// An empty store that replaces whatever is at `path` when saved.
    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            folders: Folders::default(),
        }
    }

    /// Load the store at `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, MergeError> {
        let path = path.into();
        let folders = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| MergeError::Store {
                file: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Folders::default(),
            Err(e) => return Err(MergeError::io(&path, e)),
        };
        Ok(Self { path, folders })
    }

    /// Read one object straight from a store file.
    pub fn read_object(path: &Path, folder: &str, name: &str) -> Result<Payload, MergeError> {
        let bytes = fs::read(path).map_err(|e| MergeError::io(path, e))?;
        let mut folders: Folders =
            serde_json::from_slice(&bytes).map_err(|source| MergeError::Store {
                file: path.to_path_buf(),
                source,
            })?;
        folders
            .0
            .get_mut(folder)
            .and_then(|objects| objects.remove(name))
            .ok_or_else(|| MergeError::ObjectNotFound {
                file: path.to_path_buf(),
                folder: folder.to_string(),
                name: name.to_string(),
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, folder: &str, name: &str) -> Option<&Payload> {
        self.folders.0.get(folder).and_then(|objects| objects.get(name))
    }

    pub fn put(&mut self, folder: &str, name: &str, payload: Payload) {
        self.folders
            .0
            .entry(folder.to_string())
            .or_default()
            .insert(name.to_string(), payload);
    }

    pub fn len(&self) -> usize {
        self.folders.0.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn save(&self) -> Result<(), MergeError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| MergeError::io(parent, e))?;
        }
        let bytes = serde_json::to_vec_pretty(&self.folders).map_err(|source| MergeError::Store {
            file: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, bytes).map_err(|e| MergeError::io(&self.path, e))
    }
}

/// Paths written so far in this run: first writer recreates, later writers append.
#[derive(Debug, Default)]
pub struct WrittenFiles {
    seen: HashSet<PathBuf>,
}

impl WrittenFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one object at `path`, recreating the file on the first write of
    /// the run and updating it afterwards.
    pub fn put_object(
        &mut self,
        path: &Path,
        folder: &str,
        name: &str,
        payload: Payload,
    ) -> Result<(), MergeError> {
        let mut store = if self.seen.insert(path.to_path_buf()) {
            ObjectStore::create(path)
        } else {
            ObjectStore::open(path)?
        };
        store.put(folder, name, payload);
        store.save()
    }

    /// Copy a plain file to `to`, replacing it on the first copy of the run and
    /// appending to it afterwards. Returns whether the bytes were appended.
    pub fn copy_file(&mut self, from: &Path, to: &Path) -> Result<bool, MergeError> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|e| MergeError::io(parent, e))?;
        }
        if self.seen.insert(to.to_path_buf()) {
            fs::copy(from, to).map_err(|e| MergeError::io(from, e))?;
            return Ok(false);
        }
        let bytes = fs::read(from).map_err(|e| MergeError::io(from, e))?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(to)
            .map_err(|e| MergeError::io(to, e))?;
        file.write_all(&bytes).map_err(|e| MergeError::io(to, e))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn object(n: i64) -> Payload {
        Payload::Object(json!({ "entries": n }))
    }

    #[test]
    fn test_first_write_recreates_later_writes_update() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hist.json");
        std::fs::write(&path, "left over from an earlier run").unwrap();

        let mut written = WrittenFiles::new();
        written.put_object(&path, "", "n_events", object(3)).unwrap();
        written.put_object(&path, "histograms", "h_pt", object(7)).unwrap();

        let store = ObjectStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("", "n_events"), Some(&object(3)));
        assert_eq!(store.get("histograms", "h_pt"), Some(&object(7)));
    }

    #[test]
    fn test_read_object_reports_missing_object() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hist.json");
        let mut store = ObjectStore::create(&path);
        store.put("histograms", "h_pt", object(1));
        store.save().unwrap();

        assert_eq!(
            ObjectStore::read_object(&path, "histograms", "h_pt").unwrap(),
            object(1)
        );
        assert!(matches!(
            ObjectStore::read_object(&path, "histograms", "h_eta"),
            Err(MergeError::ObjectNotFound { .. })
        ));
    }

    #[test]
    fn test_open_rejects_malformed_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ObjectStore::open(&path),
            Err(MergeError::Store { .. })
        ));
    }

    #[test]
    fn test_copy_file_appends_after_first_copy() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.log");
        let b = dir.path().join("b.log");
        let target = dir.path().join("out").join("qa.log");
        std::fs::write(&a, "worker a\n").unwrap();
        std::fs::write(&b, "worker b\n").unwrap();
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(&target, "stale\n").unwrap();

        let mut written = WrittenFiles::new();
        assert!(!written.copy_file(&a, &target).unwrap());
        assert!(written.copy_file(&b, &target).unwrap());
        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            "worker a\nworker b\n"
        );
    }
}
