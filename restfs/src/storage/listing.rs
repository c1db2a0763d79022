use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use percent_encoding::utf8_percent_encode;
use serde::Serialize;
use tokio::fs::{DirEntry, ReadDir, read_dir};

use crate::error::{VfsError, VfsResult};
use crate::storage::media_type::{DIRECTORY_MEDIA_TYPE, MediaTypeResolver};
use crate::storage::paths::SEGMENT;

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VfsEntry {
    pub name: String,
    pub modified_at: DateTime<Utc>,
    pub mime_type: String,
    pub size: u64,
    pub href: String,
}

impl VfsEntry {
    pub fn is_directory(&self) -> bool {
        self.href.ends_with('/')
    }
}

/// Lazily produced listing rows. Dropping the stream closes the directory.
pub type EntryStream = BoxStream<'static, VfsResult<VfsEntry>>;

#[derive(Clone)]
pub struct DirectoryLister {
    root: Arc<Path>,
    media_types: Arc<dyn MediaTypeResolver>,
}

impl DirectoryLister {
    /// `root` must be canonical; symbolic links whose target lies outside it
    /// are left out of listings.
    pub fn new(root: impl Into<PathBuf>, media_types: Arc<dyn MediaTypeResolver>) -> Self {
        DirectoryLister {
            root: Arc::from(root.into()),
            media_types,
        }
    }

    /// Lists the immediate children of `dir` in enumeration order.
    ///
    /// `base_url` is the fully qualified URL of the directory itself; each
    /// child's `href` is that URL with the encoded name appended. The
    /// directory is opened before this returns, the entries are read as the
    /// stream is polled.
    pub async fn list(&self, dir: &Path, base_url: &str) -> VfsResult<EntryStream> {
        let handle = read_dir(dir)
            .await
            .map_err(|err| VfsError::from_io(err, &dir.display().to_string()))?;

        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let state = ListingState {
            handle,
            base: Arc::from(base),
            root: self.root.clone(),
            media_types: self.media_types.clone(),
        };

        Ok(stream::try_unfold(state, next_entry).boxed())
    }
}

struct ListingState {
    handle: ReadDir,
    base: Arc<str>,
    root: Arc<Path>,
    media_types: Arc<dyn MediaTypeResolver>,
}

async fn next_entry(mut state: ListingState) -> VfsResult<Option<(VfsEntry, ListingState)>> {
    loop {
        let Some(entry) = state.handle.next_entry().await? else {
            return Ok(None);
        };
        match describe(&entry, &state).await {
            Ok(Some(row)) => return Ok(Some((row, state))),
            Ok(None) => {
                tracing::debug!("skipping link out of the root {:?}", entry.file_name());
            }
            // Removed between enumeration and stat, or a dangling link.
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("skipping vanished entry {:?}", entry.file_name());
            }
            Err(err) => return Err(VfsError::Unexpected(err)),
        }
    }
}

/// Builds the row for `entry`. Symbolic links are described by their target,
/// and `None` is returned for links that lead out of the root.
async fn describe(entry: &DirEntry, state: &ListingState) -> io::Result<Option<VfsEntry>> {
    let name = entry.file_name().to_string_lossy().into_owned();
    let path = entry.path();
    let mut meta = tokio::fs::symlink_metadata(&path).await?;
    if meta.file_type().is_symlink() {
        let target = tokio::fs::canonicalize(&path).await?;
        if !target.starts_with(&state.root) {
            return Ok(None);
        }
        meta = tokio::fs::metadata(&target).await?;
    }

    let modified_at = DateTime::<Utc>::from(meta.modified()?);
    let encoded = utf8_percent_encode(&name, SEGMENT).to_string();
    let base = &state.base;

    let row = if meta.is_dir() {
        VfsEntry {
            href: format!("{base}{encoded}/"),
            name,
            modified_at,
            mime_type: DIRECTORY_MEDIA_TYPE.to_string(),
            size: 0,
        }
    } else {
        VfsEntry {
            href: format!("{base}{encoded}"),
            mime_type: state.media_types.resolve_name(&name),
            name,
            modified_at,
            size: meta.len(),
        }
    };
    Ok(Some(row))
}
