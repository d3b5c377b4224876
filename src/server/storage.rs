//! Shared append-only log backed by a single file

use crate::config::ServerConfig;
use crate::{LinelogError, Result};
use bytes::Bytes;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

/// The shared log. Appends and full reads hold one exclusive lock for
/// their entire duration, I/O included.
pub struct SharedLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl SharedLog {
    /// Open the log described by the storage settings
    pub async fn new(config: &ServerConfig) -> Result<Self> {
        Self::open(&config.storage.data_file).await
    }

    /// Open (creating if absent) the log file at `path`
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)
            .await
            .map_err(|e| {
                LinelogError::Server(format!("Failed to open {}: {}", path.display(), e))
            })?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `bytes` at end of file, returning the number of bytes written.
    ///
    /// Fails with [`LinelogError::ShortWrite`] if the file did not grow by
    /// exactly `bytes.len()`.
    pub async fn append(&self, bytes: &[u8]) -> Result<usize> {
        let mut file = self.file.lock().await;

        let start = file.seek(SeekFrom::End(0)).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        let end = file.seek(SeekFrom::End(0)).await?;

        let written = end - start;
        if written != bytes.len() as u64 {
            return Err(LinelogError::ShortWrite {
                requested: bytes.len(),
                written,
            });
        }

        debug!("Appended {} bytes, log now {} bytes", written, end);
        Ok(bytes.len())
    }

    /// Read the entire log as of the moment the lock is acquired
    pub async fn read_all(&self) -> Result<Bytes> {
        let mut file = self.file.lock().await;

        file.seek(SeekFrom::Start(0)).await?;
        let len = file.metadata().await?.len();
        let len = usize::try_from(len)
            .map_err(|_| LinelogError::Server(format!("Log too large to read: {} bytes", len)))?;

        let mut contents = Vec::new();
        contents.try_reserve_exact(len)?;
        contents.resize(len, 0);
        file.read_exact(&mut contents).await?;

        Ok(Bytes::from(contents))
    }

    /// Current log length in bytes
    pub async fn len(&self) -> Result<u64> {
        let file = self.file.lock().await;
        Ok(file.metadata().await?.len())
    }

    /// Whether nothing has been appended yet
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Unlink the backing file, then close the handle
    pub async fn remove(self) -> Result<()> {
        let result = tokio::fs::remove_file(&self.path).await;
        drop(self.file.into_inner());
        result.map_err(|e| {
            LinelogError::Server(format!("Failed to remove {}: {}", self.path.display(), e))
        })
    }
}
