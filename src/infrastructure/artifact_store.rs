use crate::domain::error::{AppError, Result};
use fs2::FileExt;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const DATASETS_DIR: &str = "datasets";
const LOCK_FILE: &str = ".lock";
const DOCUMENT_EXTENSION: &str = "json";
const TEMP_MARKER: &str = ".tmp-";
const TOMBSTONE_MARKER: &str = ".deleted-";

fn storage_err(msg: impl Into<String>) -> AppError {
    AppError::StorageError(msg.into())
}

/// On-disk layout of stored dataset documents.
///
/// Every dataset lives in `<data_dir>/datasets/<id>.json`. Writes go through
/// a sibling temp file and deletes through a sibling tombstone, so a crash
/// leaves at most stray `*.tmp-*` / `*.deleted-*` files behind.
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
    datasets: PathBuf,
}

/// A file found in the datasets directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFile {
    Document { id: String, path: PathBuf },
    Temp(PathBuf),
    Tombstone(PathBuf),
    Other(PathBuf),
}

impl DatasetLayout {
    pub fn new(data_dir: &Path) -> Self {
        let root = data_dir.to_path_buf();
        let datasets = root.join(DATASETS_DIR);
        Self { root, datasets }
    }

    pub fn ensure(&self) -> Result<()> {
        ensure_dir(&self.root)?;
        ensure_dir(&self.datasets)?;
        Ok(())
    }

    pub fn datasets_dir(&self) -> &Path {
        &self.datasets
    }

    pub fn document_file_name(&self, id: &str) -> String {
        format!("{}.{}", id, DOCUMENT_EXTENSION)
    }

    pub fn document_path(&self, id: &str) -> PathBuf {
        self.datasets.join(self.document_file_name(id))
    }

    /// `datasets/<id>.json`, the form recorded in metadata rows.
    pub fn relative_document_path(&self, id: &str) -> String {
        format!("{}/{}", DATASETS_DIR, self.document_file_name(id))
    }

    /// Lock file shared by every process that writes to this data directory.
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn tombstone_path(&self, id: &str) -> PathBuf {
        self.datasets
            .join(format!("{}{}{}", id, TOMBSTONE_MARKER, Uuid::new_v4()))
    }

    pub fn scan(&self) -> Result<Vec<DocumentFile>> {
        let entries = fs::read_dir(&self.datasets).map_err(|e| {
            storage_err(format!("Failed to read dir {}: {e}", self.datasets.display()))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| storage_err(format!("Failed dir entry: {e}")))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            files.push(classify_file(&name, path));
        }
        files.sort_by(|a, b| file_path(a).cmp(file_path(b)));
        Ok(files)
    }
}

fn classify_file(name: &str, path: PathBuf) -> DocumentFile {
    if name.contains(TEMP_MARKER) {
        DocumentFile::Temp(path)
    } else if name.contains(TOMBSTONE_MARKER) {
        DocumentFile::Tombstone(path)
    } else if let Some(id) = name.strip_suffix(&format!(".{}", DOCUMENT_EXTENSION)) {
        DocumentFile::Document {
            id: id.to_string(),
            path,
        }
    } else {
        DocumentFile::Other(path)
    }
}

fn file_path(file: &DocumentFile) -> &Path {
    match file {
        DocumentFile::Document { path, .. } => path,
        DocumentFile::Temp(path) | DocumentFile::Tombstone(path) | DocumentFile::Other(path) => path,
    }
}

/// Exclusive advisory lock on a data directory, released on drop.
#[derive(Debug)]
pub struct DirLock {
    _file: fs::File,
}

impl DirLock {
    /// Block until the lock at `path` is free.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| storage_err(format!("Failed to open lock file {}: {e}", path.display())))?;
        file.lock_exclusive()
            .map_err(|e| storage_err(format!("Failed to lock {}: {e}", path.display())))?;
        Ok(Self { _file: file })
    }

    /// [`DirLock::acquire`] on the blocking pool.
    pub async fn acquire_async(path: PathBuf) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::acquire(&path))
            .await
            .map_err(|e| AppError::Internal(format!("Lock task failed: {e}")))?
    }
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| storage_err(format!("Failed to create dir {}: {e}", path.display())))?;
    Ok(())
}

/// Write through a temp file in the same directory, then rename over `path`.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let tmp_path = temp_path_for(path);
    let written = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(storage_err(format!(
            "Failed to write temp file {}: {e}",
            tmp_path.display()
        )));
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        storage_err(format!(
            "Failed to rename temp file {} to {}: {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{}{}{}", name, TEMP_MARKER, Uuid::new_v4()))
}

pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).map_err(|e| {
        storage_err(format!(
            "Failed to move {} to {}: {e}",
            from.display(),
            to.display()
        ))
    })
}

/// Remove a file, treating "already gone" as success.
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(storage_err(format!(
            "Failed to remove {}: {e}",
            path.display()
        ))),
    }
}

pub fn sha256_hex_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
