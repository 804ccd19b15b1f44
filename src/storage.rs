//! Fixture storage the station reads network profiles from.
//!
//! Scenarios copy profiles in before acting and the harness clears the
//! directory at teardown so no state leaks into the next scenario.

use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;

/// Errors raised by [`FixtureStorage`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StorageError {
    /// A filesystem operation failed.
    #[error("storage I/O on {}: {source}", .path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The source path has no file name to copy under.
    #[error("cannot copy {} into storage: no file name", .0.display())]
    InvalidSource(PathBuf),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A directory of fixture files.
#[derive(Clone, Debug)]
pub struct FixtureStorage {
    root: PathBuf,
}

impl FixtureStorage {
    /// Use `root` as the storage directory, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(io_error(&root))?;
        Ok(Self { root })
    }

    /// Storage directory.
    #[must_use]
    pub fn root(&self) -> &Path { &self.root }

    /// Copy the file at `source` into storage under its own file name.
    ///
    /// Returns the path of the copy.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidSource`] if `source` has no file name
    /// and [`StorageError::Io`] if the copy fails.
    pub fn copy_in(&self, source: impl AsRef<Path>) -> Result<PathBuf, StorageError> {
        let source = source.as_ref();
        let name = source
            .file_name()
            .ok_or_else(|| StorageError::InvalidSource(source.to_path_buf()))?;
        let target = self.root.join(name);
        fs::copy(source, &target).map_err(io_error(source))?;
        debug!(source = %source.display(), target = %target.display(), "fixture copied in");
        Ok(target)
    }

    /// Write `contents` to `name` in storage.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the write fails.
    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> Result<PathBuf, StorageError> {
        let target = self.root.join(name);
        fs::write(&target, contents).map_err(io_error(&target))?;
        Ok(target)
    }

    /// Remove everything in storage. Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] on the first entry that cannot be removed.
    pub fn clear_all(&self) -> Result<usize, StorageError> {
        let entries = self.entries()?;
        for path in &entries {
            let removed = if path.is_dir() {
                fs::remove_dir_all(path)
            } else {
                fs::remove_file(path)
            };
            removed.map_err(io_error(path))?;
        }
        debug!(root = %self.root.display(), removed = entries.len(), "storage cleared");
        Ok(entries.len())
    }

    /// Whether storage holds no entries.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory cannot be read.
    pub fn is_empty(&self) -> Result<bool, StorageError> { Ok(self.entries()?.is_empty()) }

    /// Paths of every entry in storage, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory cannot be read.
    pub fn entries(&self) -> Result<Vec<PathBuf>, StorageError> {
        let mut entries = fs::read_dir(&self.root)
            .map_err(io_error(&self.root))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_error(&self.root))?;
        entries.sort();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;

    #[fixture]
    fn dir() -> TempDir { tempfile::tempdir().expect("tempdir") }

    #[rstest]
    fn copy_in_then_clear(dir: TempDir) {
        let storage = FixtureStorage::open(dir.path().join("storage")).expect("open");
        assert!(storage.is_empty().expect("read"));

        let source = dir.path().join("ssidCCMP.psk");
        fs::write(&source, "[Security]\nPassphrase=secret123\n").expect("write source");
        let copy = storage.copy_in(&source).expect("copy");
        assert_eq!(copy, storage.root().join("ssidCCMP.psk"));
        storage.write("ssidOpen.open", "").expect("write");
        fs::create_dir(storage.root().join("hotspot")).expect("mkdir");

        assert_eq!(storage.entries().expect("read").len(), 3);
        assert_eq!(storage.clear_all().expect("clear"), 3);
        assert!(storage.is_empty().expect("read"));
        assert!(source.exists());
    }

    #[rstest]
    fn copy_in_missing_source_is_io_error(dir: TempDir) {
        let storage = FixtureStorage::open(dir.path()).expect("open");
        let err = storage
            .copy_in(dir.path().join("missing.psk"))
            .expect_err("missing source");
        assert!(matches!(err, StorageError::Io { .. }));
    }

    #[rstest]
    fn copy_in_without_file_name_is_rejected(dir: TempDir) {
        let storage = FixtureStorage::open(dir.path()).expect("open");
        assert!(matches!(
            storage.copy_in("/"),
            Err(StorageError::InvalidSource(_))
        ));
    }
}
