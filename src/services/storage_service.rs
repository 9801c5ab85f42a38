//! src/services/storage_service.rs
//!
//! Storage backends for uploaded files. `DiskStore` writes every upload into
//! one flat directory as `<epoch-millis>-<original name>`; `MemoryStore`
//! keeps the same naming in a map and exists so handlers can be exercised
//! without touching disk.
//!
//! Writes are staged: `begin` opens an upload, chunks are appended as they
//! arrive, and nothing becomes visible under the stored name until `commit`.

use crate::models::upload::stored_name;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use std::{
    collections::HashMap,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage directory `{0}` does not exist")]
    MissingRoot(PathBuf),
    #[error("probe file content mismatch")]
    ProbeMismatch,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Source of epoch milliseconds used to prefix stored names.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Wall-clock epoch milliseconds.
pub fn system_clock() -> i64 {
    Utc::now().timestamp_millis()
}

/// An upload in progress. Dropping it without `commit` discards the data.
#[async_trait]
pub trait StagedUpload: Send {
    /// Name the upload will have once committed.
    fn stored_name(&self) -> &str;

    async fn write_chunk(&mut self, chunk: &[u8]) -> StorageResult<()>;

    /// Make the upload visible under its stored name and return that name.
    /// An existing file with the same name is replaced.
    async fn commit(self: Box<Self>) -> StorageResult<String>;

    /// Throw away everything written so far.
    async fn abort(self: Box<Self>);
}

/// Persists uploaded files.
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Start an upload for `original_name`. The stored name is fixed here.
    async fn begin(&self, original_name: &str) -> StorageResult<Box<dyn StagedUpload>>;

    /// Cheap readiness check used by `/readyz`.
    async fn probe(&self) -> StorageResult<()>;

    /// Store `content` in one go and return the stored name.
    async fn save(&self, original_name: &str, content: Bytes) -> StorageResult<String> {
        let mut upload = self.begin(original_name).await?;
        if let Err(err) = upload.write_chunk(&content).await {
            upload.abort().await;
            return Err(err);
        }
        upload.commit().await
    }
}

/// Local-directory store.
#[derive(Clone)]
pub struct DiskStore {
    /// Directory receiving the uploads. Must exist before the first save.
    pub base_path: PathBuf,
    clock: Clock,
}

impl DiskStore {
    /// Create a store rooted at `base_path` using the system clock.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self::with_clock(base_path, Arc::new(system_clock))
    }

    pub fn with_clock(base_path: impl Into<PathBuf>, clock: Clock) -> Self {
        Self {
            base_path: base_path.into(),
            clock,
        }
    }
}

#[async_trait]
impl UploadStore for DiskStore {
    async fn begin(&self, original_name: &str) -> StorageResult<Box<dyn StagedUpload>> {
        let stored = stored_name((self.clock)(), original_name);
        let dest = self.base_path.join(&stored);
        let tmp_path = self.base_path.join(format!(".tmp-{}", Uuid::new_v4()));
        let file = File::create(&tmp_path).await?;

        Ok(Box::new(DiskUpload {
            stored,
            dest,
            tmp_path,
            file: Some(file),
            written: 0,
        }))
    }

    /// Write, read back and delete a scratch file under `base_path`.
    async fn probe(&self) -> StorageResult<()> {
        match fs::metadata(&self.base_path).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(StorageError::MissingRoot(self.base_path.clone())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::MissingRoot(self.base_path.clone()));
            }
            Err(err) => return Err(StorageError::Io(err)),
        }

        let tmp_path = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&tmp_path, b"readyz").await?;
        let read_back = fs::read(&tmp_path).await;
        let removed = fs::remove_file(&tmp_path).await;

        if read_back? != b"readyz" {
            return Err(StorageError::ProbeMismatch);
        }
        if let Err(err) = removed {
            debug!("could not remove probe file {}: {}", tmp_path.display(), err);
        }
        Ok(())
    }
}

/// Upload being written to a hidden temp file next to its destination.
///
/// `file` is `None` once the temp file has been renamed or removed; `Drop`
/// removes it otherwise, which covers handler futures cancelled mid-body.
struct DiskUpload {
    stored: String,
    dest: PathBuf,
    tmp_path: PathBuf,
    file: Option<File>,
    written: u64,
}

impl DiskUpload {
    fn file_mut(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(ErrorKind::Other, "upload already finished"))
    }

    async fn discard(&mut self) {
        if self.file.take().is_some() {
            if let Err(err) = fs::remove_file(&self.tmp_path).await {
                debug!("could not remove {}: {}", self.tmp_path.display(), err);
            }
        }
    }
}

#[async_trait]
impl StagedUpload for DiskUpload {
    fn stored_name(&self) -> &str {
        &self.stored
    }

    async fn write_chunk(&mut self, chunk: &[u8]) -> StorageResult<()> {
        self.file_mut()?.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> StorageResult<String> {
        let file = self.file_mut()?;
        let synced = match file.flush().await {
            Ok(()) => file.sync_all().await,
            Err(err) => Err(err),
        };
        if let Err(err) = synced {
            self.discard().await;
            return Err(StorageError::Io(err));
        }

        // Close the handle before renaming.
        drop(self.file.take());
        if let Err(err) = rename_into_place(&self.tmp_path, &self.dest).await {
            let _ = fs::remove_file(&self.tmp_path).await;
            return Err(StorageError::Io(err));
        }

        debug!("wrote {} bytes to {}", self.written, self.dest.display());
        Ok(std::mem::take(&mut self.stored))
    }

    async fn abort(mut self: Box<Self>) {
        self.discard().await;
    }
}

impl Drop for DiskUpload {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            let _ = std::fs::remove_file(&self.tmp_path);
        }
    }
}

/// Rename `tmp` over `dest`, replacing any existing file.
async fn rename_into_place(tmp: &Path, dest: &Path) -> io::Result<()> {
    match fs::rename(tmp, dest).await {
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            fs::remove_file(dest).await?;
            fs::rename(tmp, dest).await
        }
        other => other,
    }
}

/// In-process store keyed by stored name.
#[derive(Clone)]
pub struct MemoryStore {
    files: Arc<Mutex<HashMap<String, Bytes>>>,
    clock: Clock,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_clock(Arc::new(system_clock))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Content stored under `stored_name`, if any.
    pub fn get(&self, stored_name: &str) -> Option<Bytes> {
        lock(&self.files).get(stored_name).cloned()
    }

    /// All stored names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.files).keys().cloned().collect();
        names.sort();
        names
    }
}

type FileMap = HashMap<String, Bytes>;

fn lock(files: &Mutex<FileMap>) -> std::sync::MutexGuard<'_, FileMap> {
    // A panic while holding the lock cannot leave the map half-updated.
    files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl UploadStore for MemoryStore {
    async fn begin(&self, original_name: &str) -> StorageResult<Box<dyn StagedUpload>> {
        Ok(Box::new(MemoryUpload {
            stored: stored_name((self.clock)(), original_name),
            buf: BytesMut::new(),
            files: Arc::clone(&self.files),
        }))
    }

    async fn probe(&self) -> StorageResult<()> {
        Ok(())
    }
}

struct MemoryUpload {
    stored: String,
    buf: BytesMut,
    files: Arc<Mutex<HashMap<String, Bytes>>>,
}

#[async_trait]
impl StagedUpload for MemoryUpload {
    fn stored_name(&self) -> &str {
        &self.stored
    }

    async fn write_chunk(&mut self, chunk: &[u8]) -> StorageResult<()> {
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StorageResult<String> {
        let MemoryUpload { stored, buf, files } = *self;
        lock(&files).insert(stored.clone(), buf.freeze());
        Ok(stored)
    }

    async fn abort(self: Box<Self>) {}
}
