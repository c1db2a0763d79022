use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::SystemTime;

use axum::body::BodyDataStream;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt, ReadBuf};

use crate::error::{VfsError, VfsResult};
use crate::storage::driver::filesystem::{LockGuard, stage_body};

pub mod driver;
pub mod listing;
pub mod media_type;
pub mod paths;

/// Metadata captured by a stat call, used to notice that a file was replaced
/// or modified before the matching open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    created: Option<SystemTime>,
    modified: Option<SystemTime>,
    len: u64,
    identity: Option<(u64, u64)>,
}

impl FileSnapshot {
    pub fn from_metadata(meta: &Metadata) -> Self {
        FileSnapshot {
            created: meta.created().ok(),
            modified: meta.modified().ok(),
            len: meta.len(),
            identity: file_identity(meta),
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn created(&self) -> Option<SystemTime> {
        self.created
    }

    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    /// Whether `current` still describes the file this snapshot was taken of.
    /// Creation time, modification time and (on Unix) the inode must agree.
    pub fn still_matches(&self, current: &FileSnapshot) -> bool {
        self.created == current.created
            && self.modified == current.modified
            && self.identity == current.identity
    }
}

#[cfg(unix)]
fn file_identity(meta: &Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn file_identity(_meta: &Metadata) -> Option<(u64, u64)> {
    None
}

/// What a single stat call observed at a local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stat {
    Missing,
    Directory,
    File(FileSnapshot),
}

/// An open file handle together with the OS lock that guards it.
///
/// Dropping the lease closes the handle and releases the lock, whichever exit
/// path the owner takes.
pub struct FileLease {
    file: File,
    snapshot: FileSnapshot,
    _guard: LockGuard,
}

impl FileLease {
    pub(crate) fn new(file: File, snapshot: FileSnapshot, guard: LockGuard) -> Self {
        FileLease {
            file,
            snapshot,
            _guard: guard,
        }
    }

    /// Metadata of the handle as observed right after it was opened.
    pub fn snapshot(&self) -> &FileSnapshot {
        &self.snapshot
    }

    /// Metadata of the handle right now, e.g. after writing through it.
    pub async fn current_snapshot(&self) -> io::Result<FileSnapshot> {
        let meta = self.file.metadata().await?;
        Ok(FileSnapshot::from_metadata(&meta))
    }

    pub async fn sync_all(&self) -> io::Result<()> {
        self.file.sync_all().await
    }

    pub(crate) async fn set_len(&self, len: u64) -> io::Result<()> {
        self.file.set_len(len).await
    }
}

impl std::fmt::Debug for FileLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLease")
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}

impl AsyncRead for FileLease {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}

impl AsyncWrite for FileLease {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.file).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_shutdown(cx)
    }
}

impl AsyncSeek for FileLease {
    fn start_seek(mut self: Pin<&mut Self>, position: io::SeekFrom) -> io::Result<()> {
        Pin::new(&mut self.file).start_seek(position)
    }

    fn poll_complete(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Pin::new(&mut self.file).poll_complete(cx)
    }
}

/// An exclusive lease on a file that is about to be replaced.
///
/// The existing content stays untouched until [`WriteLease::commit`] has
/// received the whole body. If the body fails, whatever `open_write` created
/// to obtain the lease (the file itself, its parent directory) is removed
/// again.
pub struct WriteLease {
    lease: FileLease,
    path: PathBuf,
    created_file: bool,
    created_parent: Option<PathBuf>,
}

impl WriteLease {
    pub(crate) fn new(
        lease: FileLease,
        path: PathBuf,
        created_file: bool,
        created_parent: Option<PathBuf>,
    ) -> Self {
        WriteLease {
            lease,
            path,
            created_file,
            created_parent,
        }
    }

    pub fn snapshot(&self) -> &FileSnapshot {
        self.lease.snapshot()
    }

    /// Whether the file did not exist before this lease was taken.
    pub fn created_file(&self) -> bool {
        self.created_file
    }

    /// Stages `body` next to the target and, once it arrived completely,
    /// replaces the content of the locked file with it. Returns the number of
    /// bytes written and the metadata of the result.
    pub async fn commit(mut self, body: BodyDataStream) -> VfsResult<(u64, FileSnapshot)> {
        match self.replace_contents(body).await {
            Ok(done) => Ok(done),
            Err(err) => {
                let what = self.display_name();
                self.discard().await;
                Err(VfsError::from_io(err, &what))
            }
        }
    }

    async fn replace_contents(&mut self, body: BodyDataStream) -> io::Result<(u64, FileSnapshot)> {
        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        let (mut staged, written) = stage_body(&dir, body).await?;

        let lease = &mut self.lease;
        lease.seek(io::SeekFrom::Start(0)).await?;
        let copied = tokio::io::copy(&mut staged, &mut *lease).await?;
        lease.flush().await?;
        lease.set_len(copied).await?;
        lease.sync_all().await?;
        let snapshot = lease.current_snapshot().await?;
        Ok((written, snapshot))
    }

    /// Undoes what `open_write` created. Best effort: a concurrent writer may
    /// already have put something into a freshly created parent.
    async fn discard(self) {
        let WriteLease {
            lease,
            path,
            created_file,
            created_parent,
        } = self;

        if created_file {
            if let Err(err) = tokio::fs::remove_file(&path).await {
                tracing::warn!("failed to remove unfinished {}: {err}", path.display());
            }
        }
        drop(lease);

        if let Some(parent) = created_parent {
            if let Err(err) = tokio::fs::remove_dir(&parent).await {
                tracing::debug!("kept directory {}: {err}", parent.display());
            }
        }
    }

    fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

impl std::fmt::Debug for WriteLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteLease")
            .field("path", &self.path)
            .field("snapshot", self.lease.snapshot())
            .field("created_file", &self.created_file)
            .finish_non_exhaustive()
    }
}

/// Race-safe access to files below the root.
///
/// Every method that takes an `expected` snapshot revalidates the opened
/// handle against it and fails with a conflict if the file changed since.
#[async_trait::async_trait]
pub trait FileStore: Send + Sync {
    async fn stat(&self, path: &Path) -> VfsResult<Stat>;

    /// Opens for shared reading. Other readers may proceed, writers may not.
    async fn open_read(&self, path: &Path, expected: Option<&FileSnapshot>)
    -> VfsResult<FileLease>;

    /// Opens for exclusive writing. With `expected` the existing file is
    /// revalidated; without it the file must not exist yet. The content is
    /// only replaced by [`WriteLease::commit`].
    async fn open_write(
        &self,
        path: &Path,
        expected: Option<&FileSnapshot>,
    ) -> VfsResult<WriteLease>;

    async fn delete_file(&self, path: &Path, expected: Option<&FileSnapshot>) -> VfsResult<()>;

    /// Removes an empty directory.
    async fn remove_dir(&self, path: &Path) -> VfsResult<()>;
}
