use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::SnapshotStore;
use crate::{AppError, AppResult};

const SNAPSHOT_EXTENSION: &str = "json";

/// Write `bytes` to `path` through a sibling temp file and a rename, so the
/// target holds either the old or the new contents. The parent directory must
/// already exist.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let parent = path.parent().ok_or_else(|| {
        AppError::new("STORE/NO_PARENT", "Snapshot path has no parent directory")
            .with_context("path", path.display().to_string())
    })?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "create_temp")
            .with_context("path", parent.display().to_string())
    })?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "write_temp")
                .with_context("path", path.display().to_string())
        })?;
    tmp.persist(path).map_err(|err| {
        AppError::from(err.error)
            .with_context("operation", "persist_temp")
            .with_context("path", path.display().to_string())
    })?;
    Ok(())
}

fn validate_name(collection: &str) -> AppResult<()> {
    let valid = !collection.is_empty()
        && collection
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(
            AppError::new("STORE/INVALID_NAME", "Collection names must be [a-z0-9_]+")
                .with_context("collection", collection),
        )
    }
}

/// One JSON file per collection under a data directory.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn open(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| {
            AppError::from(err)
                .with_context("operation", "create_data_dir")
                .with_context("path", root.display().to_string())
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, collection: &str) -> AppResult<PathBuf> {
        validate_name(collection)?;
        Ok(self
            .root
            .join(format!("{collection}.{SNAPSHOT_EXTENSION}")))
    }
}

impl SnapshotStore for JsonDirStore {
    fn load(&self, collection: &str) -> AppResult<Option<Vec<u8>>> {
        let path = self.path_for(collection)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AppError::from(err)
                .with_context("operation", "read_snapshot")
                .with_context("path", path.display().to_string())),
        }
    }

    fn save(&self, collection: &str, snapshot: &[u8]) -> AppResult<()> {
        let path = self.path_for(collection)?;
        write_atomic(&path, snapshot)
    }

    fn collections(&self) -> AppResult<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|err| {
            AppError::from(err)
                .with_context("operation", "list_snapshots")
                .with_context("path", self.root.display().to_string())
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                if validate_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
