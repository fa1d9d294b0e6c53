//! Durable store of summary entries.
//!
//! The [`Store`] owns the table of entries in insertion order, a
//! name-to-position index over that table, and the path of the backing
//! file. Every successful mutation writes the whole table to the backing
//! file before returning.
//!
//! # Design
//!
//! - The table is a `Vec<Entry>`; the index is a `HashMap<String, usize>`
//!   that is always exactly consistent with it.
//! - Inserts append and add one index slot. Deletes remove the entry and
//!   shift the positions of every later entry down by one.
//! - The index is rebuilt from scratch only in [`Store::open`].
//! - Snapshots are written to a sibling `.tmp` file, synced, and renamed
//!   over the backing file, so a failed write leaves the previous snapshot
//!   in place.
//!
//! # File Format
//!
//! ```text
//! [{"Name":"a","Len":5,"Minimum":1.0,"Maximum":5.0,"Mean":3.0,"StdDev":1.414...}, ...]
//! ```
//!
//! # Thread Safety
//!
//! The Store itself is not synchronized. Share it through
//! [`Registry`](crate::registry::Registry), which guards it with a
//! readers-writer lock.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::entry::Entry;
use crate::error::{Result, TallyError};

/// Suffix appended to the backing file name for in-progress snapshots.
const TMP_SUFFIX: &str = "tmp";

/// In-memory table, its index, and the backing file they persist to.
#[derive(Debug)]
pub struct Store {
    /// Path to the backing file.
    path: PathBuf,
    /// Entries in insertion order.
    entries: Vec<Entry>,
    /// Map from entry name to its position in `entries`.
    index: HashMap<String, usize>,
}

impl Store {
    /// Opens the backing file at `path`, creating it if needed.
    ///
    /// - A missing file is created empty (along with missing parent
    ///   directories) and the store starts empty.
    /// - An empty or whitespace-only file is an empty table.
    /// - Otherwise the file must hold one JSON array of entries with
    ///   unique names.
    ///
    /// # Errors
    ///
    /// - [`TallyError::StorageAccess`] if the file or its directory cannot
    ///   be created or read
    /// - [`TallyError::CorruptState`] if the content cannot be decoded or
    ///   holds duplicate names
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            Self::read_table(&path)?
        } else {
            Self::create_empty(&path)?;
            Vec::new()
        };

        let mut store = Self {
            path,
            entries,
            index: HashMap::new(),
        };
        store.rebuild_index()?;

        tracing::debug!(
            path = %store.path.display(),
            entries = store.entries.len(),
            "store opened"
        );

        Ok(store)
    }

    /// Creates an empty backing file and any missing parent directories.
    fn create_empty(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| TallyError::StorageAccess {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| TallyError::StorageAccess {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Decodes the full table from an existing backing file.
    fn read_table(path: &Path) -> Result<Vec<Entry>> {
        let content = fs::read_to_string(path).map_err(|e| TallyError::StorageAccess {
            path: path.to_path_buf(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| TallyError::CorruptState {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Rebuilds the index from the table.
    fn rebuild_index(&mut self) -> Result<()> {
        self.index.clear();
        self.index.reserve(self.entries.len());

        for (position, entry) in self.entries.iter().enumerate() {
            if self.index.insert(entry.name.clone(), position).is_some() {
                return Err(TallyError::CorruptState {
                    path: self.path.clone(),
                    reason: format!("duplicate entry name '{}'", entry.name),
                });
            }
        }

        Ok(())
    }

    /// Appends an entry and persists the table.
    ///
    /// # Errors
    ///
    /// - [`TallyError::InvalidInput`] if the name is empty or a numeric
    ///   field is not finite; nothing changes and nothing is written
    /// - [`TallyError::DuplicateKey`] if the name is already stored; nothing
    ///   changes and nothing is written
    /// - [`TallyError::Persistence`] if writing the snapshot fails; the
    ///   entry stays in memory
    pub fn insert(&mut self, entry: Entry) -> Result<()> {
        // serde_json writes non-finite floats as `null`, which would make the
        // snapshot unloadable.
        if entry.name.is_empty() {
            return Err(TallyError::invalid_input("name cannot be empty"));
        }
        if !entry.is_finite() {
            return Err(TallyError::invalid_input(format!(
                "entry '{}' has a non-finite field",
                entry.name
            )));
        }
        if self.index.contains_key(&entry.name) {
            return Err(TallyError::DuplicateKey { name: entry.name });
        }

        self.index.insert(entry.name.clone(), self.entries.len());
        self.entries.push(entry);

        self.persist()
    }

    /// Removes the named entry and persists the table.
    ///
    /// Relative order of the remaining entries is preserved.
    ///
    /// # Errors
    ///
    /// - [`TallyError::NotFound`] if the name is not stored; nothing
    ///   changes and nothing is written
    /// - [`TallyError::Persistence`] if writing the snapshot fails; the
    ///   entry stays removed in memory
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let Some(position) = self.index.remove(name) else {
            return Err(TallyError::NotFound {
                name: name.to_string(),
            });
        };

        self.entries.remove(position);
        for entry in &self.entries[position..] {
            if let Some(slot) = self.index.get_mut(&entry.name) {
                *slot -= 1;
            }
        }

        self.persist()
    }

    /// Returns the named entry.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::NotFound`] if the name is not stored.
    pub fn search(&self, name: &str) -> Result<&Entry> {
        self.index
            .get(name)
            .map(|&position| &self.entries[position])
            .ok_or_else(|| TallyError::NotFound {
                name: name.to_string(),
            })
    }

    /// Returns all entries in insertion order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the path to the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the whole table to the backing file.
    fn persist(&self) -> Result<()> {
        let tmp_path = self.path.with_extension(match self.path.extension() {
            Some(ext) => format!("{}.{TMP_SUFFIX}", ext.to_string_lossy()),
            None => TMP_SUFFIX.to_string(),
        });

        let to_persistence = |source: std::io::Error| TallyError::Persistence {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_vec(&self.entries).map_err(|e| to_persistence(e.into()))?;

        let mut file = File::create(&tmp_path).map_err(to_persistence)?;
        file.write_all(&json).map_err(to_persistence)?;
        file.sync_all().map_err(to_persistence)?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(to_persistence)?;

        Ok(())
    }

    /// Asserts that the index matches the table exactly.
    #[cfg(test)]
    pub(crate) fn assert_index_consistent(&self) {
        assert_eq!(self.index.len(), self.entries.len());
        for (position, entry) in self.entries.iter().enumerate() {
            assert_eq!(self.index.get(&entry.name), Some(&position));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::reduce;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    fn entry(name: &str, samples: &[f64]) -> Entry {
        reduce(name, samples).unwrap()
    }

    #[test]
    fn test_open_creates_missing_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested/dir/data.json");

        let store = Store::open(&path).unwrap();

        assert!(path.is_file());
        assert!(store.is_empty());
        assert_eq!(store.path(), path);
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_open_empty_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("data.json");
        fs::write(&path, "  \n").unwrap();

        let store = Store::open(&path).unwrap();
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_open_malformed_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("data.json");
        fs::write(&path, "[{\"Name\": \"a\", ").unwrap();

        let err = Store::open(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptState);
    }

    #[test]
    fn test_open_duplicate_names_is_corrupt() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("data.json");
        let a = entry("a", &[1.0]);
        fs::write(&path, serde_json::to_string(&vec![a.clone(), a]).unwrap()).unwrap();

        let err = Store::open(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptState);
    }

    #[test]
    fn test_open_legacy_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("data.json");
        fs::write(
            &path,
            r#"[{"Name":"x","Len":2,"Minimum":1,"Maximum":3,"Mean":2,"StdDev":1}]
"#,
        )
        .unwrap();

        let store = Store::open(&path).unwrap();
        let x = store.search("x").unwrap();
        assert_eq!(x.count, 2);
        assert_eq!(x.maximum, 3.0);
        store.assert_index_consistent();
    }

    #[test]
    fn test_insert_and_search() {
        let temp_dir = tempdir().unwrap();
        let mut store = Store::open(temp_dir.path().join("data.json")).unwrap();

        let a = entry("a", &[1.0, 2.0, 3.0]);
        store.insert(a.clone()).unwrap();

        assert_eq!(store.search("a").unwrap(), &a);
        assert_eq!(store.len(), 1);
        store.assert_index_consistent();
    }

    #[test]
    fn test_insert_duplicate_leaves_table_unchanged() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("data.json");
        let mut store = Store::open(&path).unwrap();

        let original = entry("a", &[1.0, 2.0]);
        store.insert(original.clone()).unwrap();
        let on_disk = fs::read_to_string(&path).unwrap();

        let err = store.insert(entry("a", &[9.0])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateKey);
        assert_eq!(store.len(), 1);
        assert_eq!(store.search("a").unwrap(), &original);
        assert_eq!(fs::read_to_string(&path).unwrap(), on_disk);
    }

    #[test]
    fn test_insert_rejects_non_finite_entry() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("data.json");
        let mut store = Store::open(&path).unwrap();

        let mut bad = entry("a", &[1.0, 2.0]);
        bad.std_dev = f64::INFINITY;
        let err = store.insert(bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let mut bad = entry("b", &[1.0]);
        bad.mean = f64::NAN;
        assert_eq!(store.insert(bad).unwrap_err().kind(), ErrorKind::InvalidInput);

        let mut unnamed = entry("c", &[1.0]);
        unnamed.name.clear();
        assert_eq!(store.insert(unnamed).unwrap_err().kind(), ErrorKind::InvalidInput);

        assert!(store.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_delete_shifts_positions() {
        let temp_dir = tempdir().unwrap();
        let mut store = Store::open(temp_dir.path().join("data.json")).unwrap();

        for name in ["a", "b", "c", "d"] {
            store.insert(entry(name, &[1.0])).unwrap();
        }

        store.delete("b").unwrap();
        store.assert_index_consistent();

        let names: Vec<_> = store.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a", "c", "d"]);
        assert_eq!(store.search("d").unwrap().name, "d");

        store.delete("a").unwrap();
        store.delete("d").unwrap();
        store.assert_index_consistent();
        assert_eq!(store.entries()[0].name, "c");
    }

    #[test]
    fn test_delete_missing() {
        let temp_dir = tempdir().unwrap();
        let mut store = Store::open(temp_dir.path().join("data.json")).unwrap();
        store.insert(entry("a", &[1.0])).unwrap();

        let err = store.delete("zzz").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_persist_leaves_no_tmp_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("data.json");
        let mut store = Store::open(&path).unwrap();
        store.insert(entry("a", &[1.0])).unwrap();

        assert!(!temp_dir.path().join("data.json.tmp").exists());

        let on_disk: Vec<Entry> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, store.entries());
    }

    #[test]
    fn test_persist_failure_reports_and_keeps_memory() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("data.json");
        let mut store = Store::open(&path).unwrap();
        store.insert(entry("a", &[1.0])).unwrap();

        // A directory squatting on the tmp path makes the snapshot write fail.
        fs::create_dir(temp_dir.path().join("data.json.tmp")).unwrap();

        let err = store.insert(entry("b", &[2.0])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);

        // Memory diverged; the previous snapshot is still on disk.
        assert_eq!(store.len(), 2);
        store.assert_index_consistent();
        let on_disk: Vec<Entry> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 1);
    }
}
