//! Flat on-disk collection directory for descriptors and thumbnails.
//!
//! Descriptors live at `<dir>/<hex>.torrent`; thumbnails at caller-supplied
//! relative subpaths. Presence of a file is authoritative: if it exists, the
//! asset counts as collected.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::fs;

use magpie_core::{InfoHash, TorrentDescriptor};

/// Errors produced while reading or writing the collection directory.
#[derive(Debug, Error)]
pub(crate) enum StorageError {
    /// IO failure against the collection directory.
    #[error("collection io failure")]
    Io {
        /// Operation that failed.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A thumbnail subpath tried to escape the collection directory.
    #[error("invalid thumbnail subpath")]
    InvalidSubpath {
        /// The offending subpath.
        subpath: String,
    },
    /// A metadata deletion target did not exist.
    #[error("metadata file missing")]
    Missing {
        /// Path that was expected to exist.
        path: PathBuf,
    },
    /// A metadata deletion target was not a regular file.
    #[error("refusing to delete non-file metadata")]
    NotAFile {
        /// Path that turned out not to be a file.
        path: PathBuf,
    },
}

impl StorageError {
    fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Handle on the collection directory.
#[derive(Debug, Clone)]
pub(crate) struct CollectionStore {
    dir: PathBuf,
}

impl CollectionStore {
    pub(crate) fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the collection directory if it does not exist yet.
    pub(crate) async fn ensure_initialized(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| StorageError::io("create_dir_all", &self.dir, err))
    }

    /// Path a descriptor for `infohash` is stored at.
    pub(crate) fn descriptor_path(&self, infohash: InfoHash) -> PathBuf {
        self.dir.join(format!("{infohash}.torrent"))
    }

    /// Whether a descriptor for `infohash` is already collected.
    pub(crate) fn has_descriptor(&self, infohash: InfoHash) -> bool {
        self.descriptor_path(infohash).is_file()
    }

    /// Resolve a thumbnail subpath below the collection directory.
    ///
    /// Rejects absolute paths and any path with a non-normal component so a
    /// remote peer cannot direct writes outside the collection.
    pub(crate) fn thumbnail_path(&self, subpath: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(subpath);
        let valid = !subpath.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !valid {
            return Err(StorageError::InvalidSubpath {
                subpath: subpath.to_string(),
            });
        }
        Ok(self.dir.join(relative))
    }

    /// Whether a thumbnail is already collected under `subpath`.
    pub(crate) fn has_thumbnail(&self, subpath: &str) -> bool {
        self.thumbnail_path(subpath)
            .is_ok_and(|path| path.is_file())
    }

    /// Write a descriptor's verbatim bytes to its collection path.
    pub(crate) async fn persist_descriptor(
        &self,
        descriptor: &TorrentDescriptor,
    ) -> Result<PathBuf, StorageError> {
        self.ensure_initialized().await?;
        let path = self.descriptor_path(descriptor.infohash);
        fs::write(&path, &descriptor.raw)
            .await
            .map_err(|err| StorageError::io("write", &path, err))?;
        Ok(path)
    }

    /// Write thumbnail bytes under `subpath`, creating the parent directory
    /// on demand.
    pub(crate) async fn persist_thumbnail(
        &self,
        subpath: &str,
        data: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let path = self.thumbnail_path(subpath)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| StorageError::io("create_dir_all", parent, err))?;
        }
        fs::write(&path, data)
            .await
            .map_err(|err| StorageError::io("write", &path, err))?;
        Ok(path)
    }

    /// Delete a collected thumbnail, refusing directories.
    pub(crate) async fn delete_thumbnail(&self, subpath: &str) -> Result<PathBuf, StorageError> {
        let path = self.thumbnail_path(subpath)?;
        if !path.exists() {
            return Err(StorageError::Missing { path });
        }
        if !path.is_file() {
            return Err(StorageError::NotAFile { path });
        }
        fs::remove_file(&path)
            .await
            .map_err(|err| StorageError::io("remove_file", &path, err))?;
        Ok(path)
    }
}
