//! Where source files are read from and written back to.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

use crate::error::StoreError;

const BACKUP_SUFFIX: &str = ".backup";

#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn read(&self, path: &str) -> Result<String, StoreError>;

    /// Replace `path` with `contents`. `original` is the text the fix was
    /// computed from and is what a backup keeps.
    async fn write(&self, path: &str, original: &str, contents: &str) -> Result<(), StoreError>;

    /// Put back the newest backup of `path`.
    async fn restore(&self, path: &str) -> Result<(), StoreError>;
}

/// Files on disk under a project root. Writes are atomic: a temporary file
/// in the target directory is synced and renamed over the original.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    backup_dir: Option<PathBuf>,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            backup_dir: None,
        }
    }

    /// Keep a copy of every file before its first rewrite in `dir`
    /// (relative to the root unless absolute).
    pub fn with_backups(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.backup_dir = Some(if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.root.join(dir)
        });
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    fn backup_key(path: &str) -> String {
        path.replace(['/', '\\', ':'], "_")
    }

    fn newest_backup(dir: &Path, key: &str) -> io::Result<Option<PathBuf>> {
        let prefix = format!("{}.", key);
        let mut newest: Option<PathBuf> = None;
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !(name.starts_with(&prefix) && name.ends_with(BACKUP_SUFFIX)) {
                continue;
            }
            // Timestamps sort lexicographically.
            if newest
                .as_ref()
                .and_then(|p| p.file_name())
                .map_or(true, |current| name.as_str() > &*current.to_string_lossy())
            {
                newest = Some(entry.path());
            }
        }
        Ok(newest)
    }
}

fn write_atomic(target: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    if let Ok(meta) = std::fs::metadata(target) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

fn join_failure(e: tokio::task::JoinError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

#[async_trait]
impl SourceStore for FsStore {
    async fn read(&self, path: &str) -> Result<String, StoreError> {
        tokio::fs::read_to_string(self.resolve(path))
            .await
            .map_err(|source| StoreError::FileUnreadable {
                path: path.to_string(),
                source,
            })
    }

    async fn write(&self, path: &str, original: &str, contents: &str) -> Result<(), StoreError> {
        let target = self.resolve(path);
        let backup = self.backup_dir.as_ref().map(|dir| {
            let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S%3f");
            (
                dir.clone(),
                dir.join(format!("{}.{}{}", Self::backup_key(path), stamp, BACKUP_SUFFIX)),
                original.to_string(),
            )
        });
        let contents = contents.to_string();

        tokio::task::spawn_blocking(move || -> io::Result<()> {
            if let Some((dir, file, original)) = backup {
                std::fs::create_dir_all(&dir)?;
                write_atomic(&file, original.as_bytes())?;
            }
            write_atomic(&target, contents.as_bytes())
        })
        .await
        .map_err(join_failure)
        .and_then(|r| r)
        .map_err(|source| {
            tracing::warn!(path, error = %source, "write failed");
            StoreError::WriteFailure {
                path: path.to_string(),
                source,
            }
        })
    }

    async fn restore(&self, path: &str) -> Result<(), StoreError> {
        let Some(dir) = self.backup_dir.clone() else {
            return Err(StoreError::BackupMissing(path.to_string()));
        };
        let key = Self::backup_key(path);
        let target = self.resolve(path);

        let restored = tokio::task::spawn_blocking(move || -> io::Result<Option<PathBuf>> {
            if !dir.exists() {
                return Ok(None);
            }
            let Some(backup) = Self::newest_backup(&dir, &key)? else {
                return Ok(None);
            };
            let contents = std::fs::read(&backup)?;
            write_atomic(&target, &contents)?;
            Ok(Some(backup))
        })
        .await
        .map_err(join_failure)
        .and_then(|r| r)
        .map_err(|source| StoreError::WriteFailure {
            path: path.to_string(),
            source,
        })?;

        match restored {
            Some(backup) => {
                tracing::info!(path, backup = %backup.display(), "restored from backup");
                Ok(())
            }
            None => Err(StoreError::BackupMissing(path.to_string())),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    files: HashMap<String, String>,
    backups: HashMap<String, Vec<String>>,
    unwritable: HashSet<String>,
    writes: usize,
}

/// In-memory store for hosts that keep sources elsewhere, and for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, path: impl Into<String>, contents: impl Into<String>) {
        self.state().files.insert(path.into(), contents.into());
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.state().files.get(path).cloned()
    }

    /// Make every write to `path` fail.
    pub fn set_unwritable(&self, path: impl Into<String>) {
        self.state().unwritable.insert(path.into());
    }

    /// Successful writes so far.
    pub fn writes(&self) -> usize {
        self.state().writes
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn read(&self, path: &str) -> Result<String, StoreError> {
        self.get(path).ok_or_else(|| StoreError::FileUnreadable {
            path: path.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        })
    }

    async fn write(&self, path: &str, original: &str, contents: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.unwritable.contains(path) {
            return Err(StoreError::WriteFailure {
                path: path.to_string(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        state
            .backups
            .entry(path.to_string())
            .or_default()
            .push(original.to_string());
        state.files.insert(path.to_string(), contents.to_string());
        state.writes += 1;
        Ok(())
    }

    async fn restore(&self, path: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        let previous = state
            .backups
            .get_mut(path)
            .and_then(Vec::pop)
            .ok_or_else(|| StoreError::BackupMissing(path.to_string()))?;
        state.files.insert(path.to_string(), previous);
        Ok(())
    }
}
