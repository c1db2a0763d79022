use std::path::{Path, PathBuf};

use axum::body::BodyDataStream;
use futures::TryStreamExt;
use tokio::fs::{File, create_dir, metadata, remove_dir, remove_file};
use tokio::io::{self, AsyncSeekExt, AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;

use crate::error::{VfsError, VfsResult};
use crate::storage::{FileLease, FileSnapshot, FileStore, Stat, WriteLease};

/// Lock discipline applied to an opened file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShareMode {
    /// Other shared holders may coexist; exclusive holders are refused.
    Shared,
    /// Nobody else may hold the file.
    Exclusive,
}

/// Holds the advisory lock of a [`FileLease`]; the lock is released on drop.
pub struct LockGuard {
    #[cfg(unix)]
    _lock: nix::fcntl::Flock<std::fs::File>,
}

/// Locks `file` without blocking and returns a second handle to the same
/// open file description for I/O. Contention surfaces as `WouldBlock`.
#[cfg(unix)]
fn lock(file: std::fs::File, mode: ShareMode) -> std::io::Result<(std::fs::File, LockGuard)> {
    use nix::fcntl::{Flock, FlockArg};

    let arg = match mode {
        ShareMode::Shared => FlockArg::LockSharedNonblock,
        ShareMode::Exclusive => FlockArg::LockExclusiveNonblock,
    };
    let handle = file.try_clone()?;
    let lock = Flock::lock(file, arg).map_err(|(_, errno)| std::io::Error::from(errno))?;
    Ok((handle, LockGuard { _lock: lock }))
}

#[cfg(not(unix))]
fn lock(file: std::fs::File, _mode: ShareMode) -> std::io::Result<(std::fs::File, LockGuard)> {
    Ok((file, LockGuard {}))
}

/// [`FileStore`] backed by the host filesystem, using `flock(2)` as the
/// sharing discipline on Unix.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemStore;

impl FilesystemStore {
    pub fn new() -> Self {
        FilesystemStore
    }

    /// Opens and locks `path` on the blocking pool, then captures the
    /// metadata of the opened handle.
    async fn open_locked(
        &self,
        path: &Path,
        options: std::fs::OpenOptions,
        mode: ShareMode,
    ) -> io::Result<FileLease> {
        let path: PathBuf = path.to_path_buf();
        let (handle, guard, snapshot) = tokio::task::spawn_blocking(move || {
            let file = options.open(&path)?;
            let (handle, guard) = lock(file, mode)?;
            let meta = handle.metadata()?;
            if meta.is_dir() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::IsADirectory,
                    format!("{} is a directory", path.display()),
                ));
            }
            Ok((handle, guard, FileSnapshot::from_metadata(&meta)))
        })
        .await
        .map_err(io::Error::other)??;

        Ok(FileLease::new(File::from_std(handle), snapshot, guard))
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn revalidate(expected: Option<&FileSnapshot>, lease: &FileLease, what: &str) -> VfsResult<()> {
    match expected {
        Some(expected) if !expected.still_matches(lease.snapshot()) => {
            tracing::debug!("{what} changed between stat and open");
            Err(VfsError::Conflict(format!("{what} was modified concurrently")))
        }
        _ => Ok(()),
    }
}

#[async_trait::async_trait]
impl FileStore for FilesystemStore {
    async fn stat(&self, path: &Path) -> VfsResult<Stat> {
        match metadata(path).await {
            Ok(meta) if meta.is_dir() => Ok(Stat::Directory),
            Ok(meta) => Ok(Stat::File(FileSnapshot::from_metadata(&meta))),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                ) =>
            {
                Ok(Stat::Missing)
            }
            Err(err) => Err(VfsError::Unexpected(err)),
        }
    }

    async fn open_read(
        &self,
        path: &Path,
        expected: Option<&FileSnapshot>,
    ) -> VfsResult<FileLease> {
        let what = display_name(path);
        let mut options = std::fs::OpenOptions::new();
        options.read(true);
        let lease = self
            .open_locked(path, options, ShareMode::Shared)
            .await
            .map_err(|err| VfsError::from_io(err, &what))?;
        revalidate(expected, &lease, &what)?;
        Ok(lease)
    }

    async fn open_write(
        &self,
        path: &Path,
        expected: Option<&FileSnapshot>,
    ) -> VfsResult<WriteLease> {
        let what = display_name(path);

        // Only the immediate parent is created; a missing grandparent fails.
        let mut created_parent = None;
        if let Some(parent) = path.parent() {
            match create_dir(parent).await {
                Ok(()) => {
                    tracing::debug!("created directory {}", parent.display());
                    created_parent = Some(parent.to_path_buf());
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
                Err(err) => return Err(VfsError::from_io(err, &what)),
            }
        }

        let mut options = std::fs::OpenOptions::new();
        options.read(true).write(true);
        if expected.is_none() {
            options.create_new(true);
        }

        let opened = match self.open_locked(path, options, ShareMode::Exclusive).await {
            Ok(lease) => revalidate(expected, &lease, &what).map(|()| lease),
            Err(err) if expected.is_some() && err.kind() == io::ErrorKind::NotFound => {
                Err(VfsError::Conflict(format!("{what} was removed concurrently")))
            }
            Err(err) => Err(VfsError::from_io(err, &what)),
        };

        match opened {
            // The content is left alone until the whole body has been staged.
            Ok(lease) => Ok(WriteLease::new(
                lease,
                path.to_path_buf(),
                expected.is_none(),
                created_parent,
            )),
            Err(err) => {
                if let Some(parent) = created_parent {
                    let _ = remove_dir(&parent).await;
                }
                Err(err)
            }
        }
    }

    async fn delete_file(&self, path: &Path, expected: Option<&FileSnapshot>) -> VfsResult<()> {
        let what = display_name(path);
        let mut options = std::fs::OpenOptions::new();
        options.read(true);

        // A shared lock tolerates other readers but refuses a concurrent writer.
        let lease = self
            .open_locked(path, options, ShareMode::Shared)
            .await
            .map_err(|err| VfsError::from_io(err, &what))?;
        revalidate(expected, &lease, &what)?;

        let removed = remove_file(path).await;
        drop(lease);
        removed.map_err(|err| VfsError::from_io(err, &what))
    }

    async fn remove_dir(&self, path: &Path) -> VfsResult<()> {
        let what = display_name(path);
        match remove_dir(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(VfsError::NotFound(what)),
            Err(err) => {
                tracing::debug!("failed to remove directory {what}: {err}");
                Err(VfsError::Conflict(format!("directory {what} could not be removed")))
            }
        }
    }
}

/// Streams a request body into an unnamed scratch file in `dir` and returns
/// it rewound, together with the number of bytes received. The scratch file
/// disappears when the handle is dropped, so a failed body leaves nothing
/// behind.
pub(crate) async fn stage_body(dir: &Path, stream: BodyDataStream) -> io::Result<(File, u64)> {
    let dir = dir.to_path_buf();
    let scratch = tokio::task::spawn_blocking(move || tempfile::tempfile_in(dir))
        .await
        .map_err(io::Error::other)??;
    let mut scratch = File::from_std(scratch);

    // Convert the stream into an `AsyncRead`.
    let body_with_io_error = stream.map_err(io::Error::other);
    let body_reader = StreamReader::new(body_with_io_error);
    futures::pin_mut!(body_reader);

    let written = {
        let mut file_writer = BufWriter::new(&mut scratch);
        let written = tokio::io::copy(&mut body_reader, &mut file_writer).await?;
        file_writer.flush().await?;
        written
    };
    scratch.seek(io::SeekFrom::Start(0)).await?;
    Ok((scratch, written))
}
