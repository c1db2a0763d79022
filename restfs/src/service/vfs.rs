use std::io::SeekFrom;
use std::sync::Arc;

use axum::body::BodyDataStream;
use tokio::io::AsyncSeekExt;

use crate::error::{VfsError, VfsResult};
use crate::service::conditional::{ByteRange, EntityTag, Preconditions};
use crate::storage::driver::filesystem::FilesystemStore;
use crate::storage::listing::{DirectoryLister, EntryStream};
use crate::storage::media_type::{MediaTypeResolver, StaticMediaTypes};
use crate::storage::paths::{LocalPath, PathResolver};
use crate::storage::{FileLease, FileSnapshot, FileStore, Stat};

/// Transport-independent view of an incoming request.
#[derive(Debug, Clone, Default)]
pub struct VfsRequest {
    /// Raw, still percent-encoded URL path, always starting with `/`.
    pub path: String,
    pub query: Option<String>,
    pub preconditions: Preconditions,
}

impl VfsRequest {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        VfsRequest {
            path,
            ..Default::default()
        }
    }

    pub fn with_query(mut self, query: Option<&str>) -> Self {
        self.query = query.map(str::to_string);
        self
    }

    pub fn with_preconditions(mut self, preconditions: Preconditions) -> Self {
        self.preconditions = preconditions;
        self
    }

    /// The same URL with a trailing `/` appended.
    pub fn location_with_slash(&self) -> String {
        self.with_query_suffix(format!("{}/", self.path))
    }

    /// The same URL with trailing `/` removed.
    pub fn location_without_slash(&self) -> String {
        let trimmed = self.path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed };
        self.with_query_suffix(trimmed.to_string())
    }

    fn with_query_suffix(&self, path: String) -> String {
        match &self.query {
            Some(query) if !query.is_empty() => format!("{path}?{query}"),
            _ => path,
        }
    }
}

/// What the single stat at the start of a request observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestIntent {
    ExistingFile(FileSnapshot),
    ExistingDirectory,
    NotFound,
}

/// A resolved request: where it points and what was there.
#[derive(Debug, Clone)]
pub struct StatedRequest {
    pub local: LocalPath,
    pub intent: RequestIntent,
}

impl StatedRequest {
    pub fn trailing_slash(&self) -> bool {
        self.local.trailing_slash()
    }
}

/// A file ready to be streamed back to the client.
#[derive(Debug)]
pub struct FileRead {
    pub lease: FileLease,
    pub snapshot: FileSnapshot,
    pub etag: EntityTag,
    pub media_type: String,
    /// Set when a valid range was requested; the lease is positioned at its
    /// start.
    pub range: Option<ByteRange>,
}

pub enum ReadOutcome {
    Redirect(String),
    Directory(EntryStream),
    File(FileRead),
    NotModified(EntityTag),
}

impl std::fmt::Debug for ReadOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Redirect(location) => f.debug_tuple("Redirect").field(location).finish(),
            Self::Directory(_) => f.write_str("Directory(..)"),
            Self::File(read) => f.debug_tuple("File").field(read).finish(),
            Self::NotModified(tag) => f.debug_tuple("NotModified").field(tag).finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Redirect(String),
    Created(EntityTag),
    Replaced(EntityTag),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Redirect(String),
    Deleted,
}

/// Translates read, write and delete requests into filesystem operations.
///
/// `read`, `write` and `delete` run the shared state machine: resolve, stat
/// once, redirect to the canonical URL if needed, then hand off to one of the
/// `handle_*` hooks. Implementors provide the collaborators and may override
/// any hook; the defaults implement the standard behaviour.
#[async_trait::async_trait]
pub trait VfsService: Send + Sync {
    fn resolver(&self) -> &PathResolver;

    fn store(&self) -> &dyn FileStore;

    fn lister(&self) -> &DirectoryLister;

    fn media_types(&self) -> &dyn MediaTypeResolver;

    /// Scheme and authority used to build listing `href`s.
    fn public_url(&self) -> &str;

    async fn stat_request(&self, request: &VfsRequest) -> VfsResult<StatedRequest> {
        let local = self.resolver().resolve(&request.path).await?;
        let intent = match self.store().stat(local.path()).await? {
            Stat::Missing => RequestIntent::NotFound,
            Stat::Directory => RequestIntent::ExistingDirectory,
            Stat::File(snapshot) => RequestIntent::ExistingFile(snapshot),
        };
        Ok(StatedRequest { local, intent })
    }

    async fn read(&self, request: &VfsRequest) -> VfsResult<ReadOutcome> {
        let stated = self.stat_request(request).await?;
        let trailing_slash = stated.trailing_slash();
        match stated.intent {
            RequestIntent::NotFound => Err(VfsError::NotFound(stated.local.display_name())),
            RequestIntent::ExistingDirectory if !trailing_slash => {
                tracing::debug!("redirecting directory {} to canonical URL", request.path);
                Ok(ReadOutcome::Redirect(request.location_with_slash()))
            }
            RequestIntent::ExistingDirectory => self
                .handle_directory_read(request, &stated.local)
                .await
                .map(ReadOutcome::Directory),
            RequestIntent::ExistingFile(_) if trailing_slash => {
                tracing::debug!("redirecting file {} to canonical URL", request.path);
                Ok(ReadOutcome::Redirect(request.location_without_slash()))
            }
            RequestIntent::ExistingFile(snapshot) => {
                self.handle_file_read(request, &stated.local, snapshot).await
            }
        }
    }

    async fn write(&self, request: &VfsRequest, body: BodyDataStream) -> VfsResult<WriteOutcome> {
        let stated = self.stat_request(request).await?;
        let trailing_slash = stated.trailing_slash();
        match stated.intent {
            RequestIntent::ExistingDirectory if !trailing_slash => {
                Ok(WriteOutcome::Redirect(request.location_with_slash()))
            }
            RequestIntent::ExistingDirectory => {
                self.handle_directory_write(request, &stated.local).await
            }
            RequestIntent::ExistingFile(_) if trailing_slash => {
                Ok(WriteOutcome::Redirect(request.location_without_slash()))
            }
            RequestIntent::ExistingFile(snapshot) => {
                self.handle_file_write(request, &stated.local, Some(snapshot), body)
                    .await
            }
            // A trailing slash names a directory, and directories are never
            // created through a write.
            RequestIntent::NotFound if trailing_slash => {
                self.handle_directory_write(request, &stated.local).await
            }
            RequestIntent::NotFound => {
                self.handle_file_write(request, &stated.local, None, body)
                    .await
            }
        }
    }

    async fn delete(&self, request: &VfsRequest) -> VfsResult<DeleteOutcome> {
        let stated = self.stat_request(request).await?;
        let trailing_slash = stated.trailing_slash();
        match stated.intent {
            RequestIntent::NotFound => Err(VfsError::NotFound(stated.local.display_name())),
            RequestIntent::ExistingDirectory if !trailing_slash => {
                Ok(DeleteOutcome::Redirect(request.location_with_slash()))
            }
            RequestIntent::ExistingDirectory => {
                self.handle_directory_delete(request, &stated.local).await
            }
            RequestIntent::ExistingFile(_) if trailing_slash => {
                Ok(DeleteOutcome::Redirect(request.location_without_slash()))
            }
            RequestIntent::ExistingFile(snapshot) => {
                self.handle_file_delete(request, &stated.local, snapshot)
                    .await
            }
        }
    }

    async fn handle_directory_read(
        &self,
        _request: &VfsRequest,
        local: &LocalPath,
    ) -> VfsResult<EntryStream> {
        let base_url = format!(
            "{}{}",
            self.public_url().trim_end_matches('/'),
            local.url_path()
        );
        self.lister().list(local.path(), &base_url).await
    }

    async fn handle_file_read(
        &self,
        request: &VfsRequest,
        local: &LocalPath,
        snapshot: FileSnapshot,
    ) -> VfsResult<ReadOutcome> {
        // Conditions are judged against the tag of the initial stat.
        let etag = EntityTag::from_snapshot(&snapshot);
        let preconditions = &request.preconditions;
        if preconditions.is_not_modified(&etag) {
            return Ok(ReadOutcome::NotModified(etag));
        }

        let mut lease = self.store().open_read(local.path(), Some(&snapshot)).await?;
        let range = match (&preconditions.range, preconditions.is_range_request(&etag)) {
            (Some(header), true) => ByteRange::parse(header, snapshot.len()),
            _ => None,
        };
        if let Some(range) = range {
            lease
                .seek(SeekFrom::Start(range.start))
                .await
                .map_err(|err| VfsError::from_io(err, &local.display_name()))?;
        }

        Ok(ReadOutcome::File(FileRead {
            lease,
            media_type: self.media_types().resolve_name(&local.display_name()),
            snapshot,
            etag,
            range,
        }))
    }

    async fn handle_file_write(
        &self,
        _request: &VfsRequest,
        local: &LocalPath,
        snapshot: Option<FileSnapshot>,
        body: BodyDataStream,
    ) -> VfsResult<WriteOutcome> {
        let existed = snapshot.is_some();
        let lease = self
            .store()
            .open_write(local.path(), snapshot.as_ref())
            .await?;

        let (written, current) = lease.commit(body).await?;
        let etag = EntityTag::from_snapshot(&current);

        tracing::info!("wrote {written} bytes to {}", local.path().display());
        if existed {
            Ok(WriteOutcome::Replaced(etag))
        } else {
            Ok(WriteOutcome::Created(etag))
        }
    }

    /// Directories are immutable through writes.
    async fn handle_directory_write(
        &self,
        _request: &VfsRequest,
        local: &LocalPath,
    ) -> VfsResult<WriteOutcome> {
        Err(VfsError::Conflict(format!(
            "{} is a directory and cannot be written",
            local.display_name()
        )))
    }

    async fn handle_directory_delete(
        &self,
        _request: &VfsRequest,
        local: &LocalPath,
    ) -> VfsResult<DeleteOutcome> {
        if local.is_root() {
            return Err(VfsError::Conflict("the root directory cannot be deleted".into()));
        }
        self.store().remove_dir(local.path()).await?;
        tracing::info!("deleted directory {}", local.path().display());
        Ok(DeleteOutcome::Deleted)
    }

    async fn handle_file_delete(
        &self,
        _request: &VfsRequest,
        local: &LocalPath,
        snapshot: FileSnapshot,
    ) -> VfsResult<DeleteOutcome> {
        self.store().delete_file(local.path(), Some(&snapshot)).await?;
        tracing::info!("deleted file {}", local.path().display());
        Ok(DeleteOutcome::Deleted)
    }
}

/// The stock [`VfsService`]: host filesystem, built-in media types.
#[derive(Clone)]
pub struct DefaultVfs {
    resolver: PathResolver,
    store: Arc<dyn FileStore>,
    lister: DirectoryLister,
    media_types: Arc<dyn MediaTypeResolver>,
    public_url: String,
}

impl DefaultVfs {
    pub fn new(resolver: PathResolver, public_url: impl Into<String>) -> Self {
        let media_types: Arc<dyn MediaTypeResolver> = Arc::new(StaticMediaTypes);
        DefaultVfs {
            lister: DirectoryLister::new(resolver.root(), media_types.clone()),
            resolver,
            store: Arc::new(FilesystemStore::new()),
            media_types,
            public_url: public_url.into(),
        }
    }

    pub fn with_media_types(mut self, media_types: Arc<dyn MediaTypeResolver>) -> Self {
        self.lister = DirectoryLister::new(self.resolver.root(), media_types.clone());
        self.media_types = media_types;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn FileStore>) -> Self {
        self.store = store;
        self
    }
}

#[async_trait::async_trait]
impl VfsService for DefaultVfs {
    fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    fn store(&self) -> &dyn FileStore {
        self.store.as_ref()
    }

    fn lister(&self) -> &DirectoryLister {
        &self.lister
    }

    fn media_types(&self) -> &dyn MediaTypeResolver {
        self.media_types.as_ref()
    }

    fn public_url(&self) -> &str {
        &self.public_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use futures::TryStreamExt;
    use std::time::{Duration, SystemTime};
    use tokio::io::AsyncReadExt;

    fn setup() -> (tempfile::TempDir, DefaultVfs) {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = PathResolver::new(tmp.path()).unwrap();
        (tmp, DefaultVfs::new(resolver, "http://localhost:8968"))
    }

    fn body(text: &'static str) -> BodyDataStream {
        Body::from(text).into_data_stream()
    }

    async fn read_all(outcome: ReadOutcome) -> Vec<u8> {
        match outcome {
            ReadOutcome::File(mut read) => {
                let mut out = Vec::new();
                read.lease.read_to_end(&mut out).await.unwrap();
                out
            }
            other => panic!("expected a file, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_directory_without_slash_redirects() {
        let (tmp, vfs) = setup();
        std::fs::create_dir(tmp.path().join("docs")).unwrap();

        let request = VfsRequest::new("/docs").with_query(Some("x=1"));
        match vfs.read(&request).await.unwrap() {
            ReadOutcome::Redirect(location) => assert_eq!(location, "/docs/?x=1"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            vfs.write(&request, body("nope")).await.unwrap(),
            WriteOutcome::Redirect("/docs/?x=1".into())
        );
        assert_eq!(
            vfs.delete(&request).await.unwrap(),
            DeleteOutcome::Redirect("/docs/?x=1".into())
        );
        assert!(tmp.path().join("docs").is_dir());
    }

    #[tokio::test]
    async fn test_file_with_slash_redirects() {
        let (tmp, vfs) = setup();
        std::fs::write(tmp.path().join("a.txt"), b"keep").unwrap();

        let request = VfsRequest::new("/a.txt/");
        match vfs.read(&request).await.unwrap() {
            ReadOutcome::Redirect(location) => assert_eq!(location, "/a.txt"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            vfs.delete(&request).await.unwrap(),
            DeleteOutcome::Redirect("/a.txt".into())
        );
        assert_eq!(
            vfs.write(&request, body("changed")).await.unwrap(),
            WriteOutcome::Redirect("/a.txt".into())
        );
        assert_eq!(std::fs::read(tmp.path().join("a.txt")).unwrap(), b"keep");
    }

    #[tokio::test]
    async fn test_missing_then_write_then_read() {
        let (_tmp, vfs) = setup();
        let request = VfsRequest::new("/notes/today.txt");

        assert!(matches!(
            vfs.read(&request).await,
            Err(VfsError::NotFound(_))
        ));
        assert!(matches!(
            vfs.write(&request, body("hello world")).await.unwrap(),
            WriteOutcome::Created(_)
        ));
        let bytes = read_all(vfs.read(&request).await.unwrap()).await;
        assert_eq!(bytes, b"hello world");

        assert!(matches!(
            vfs.write(&request, body("bye")).await.unwrap(),
            WriteOutcome::Replaced(_)
        ));
        let bytes = read_all(vfs.read(&request).await.unwrap()).await;
        assert_eq!(bytes, b"bye");
    }

    #[tokio::test]
    async fn test_traversal_is_not_found() {
        let (_tmp, vfs) = setup();
        let request = VfsRequest::new("/../outside.txt");
        assert!(matches!(
            vfs.read(&request).await,
            Err(VfsError::InvalidPath(_))
        ));
        assert!(matches!(
            vfs.write(&request, body("x")).await,
            Err(VfsError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_write_to_directory_is_conflict() {
        let (tmp, vfs) = setup();
        std::fs::create_dir(tmp.path().join("docs")).unwrap();

        assert!(matches!(
            vfs.write(&VfsRequest::new("/docs/"), body("x")).await,
            Err(VfsError::Conflict(_))
        ));
        assert!(matches!(
            vfs.write(&VfsRequest::new("/"), body("x")).await,
            Err(VfsError::Conflict(_))
        ));
        assert!(matches!(
            vfs.write(&VfsRequest::new("/fresh/"), body("x")).await,
            Err(VfsError::Conflict(_))
        ));
        assert!(!tmp.path().join("fresh").exists());
    }

    #[tokio::test]
    async fn test_delete_directory() {
        let (tmp, vfs) = setup();
        std::fs::create_dir(tmp.path().join("full")).unwrap();
        std::fs::write(tmp.path().join("full").join("x.txt"), b"x").unwrap();
        std::fs::create_dir(tmp.path().join("empty")).unwrap();

        assert!(matches!(
            vfs.delete(&VfsRequest::new("/full/")).await,
            Err(VfsError::Conflict(_))
        ));
        assert!(tmp.path().join("full").join("x.txt").exists());

        assert_eq!(
            vfs.delete(&VfsRequest::new("/empty/")).await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert!(!tmp.path().join("empty").exists());

        assert!(matches!(
            vfs.delete(&VfsRequest::new("/")).await,
            Err(VfsError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_file_and_missing() {
        let (tmp, vfs) = setup();
        std::fs::write(tmp.path().join("a.txt"), b"x").unwrap();

        assert_eq!(
            vfs.delete(&VfsRequest::new("/a.txt")).await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert!(!tmp.path().join("a.txt").exists());
        assert!(matches!(
            vfs.delete(&VfsRequest::new("/a.txt")).await,
            Err(VfsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_not_modified_uses_initial_tag() {
        let (tmp, vfs) = setup();
        std::fs::write(tmp.path().join("a.txt"), b"hello").unwrap();

        let etag = match vfs.read(&VfsRequest::new("/a.txt")).await.unwrap() {
            ReadOutcome::File(read) => read.etag,
            other => panic!("unexpected {other:?}"),
        };

        let request = VfsRequest::new("/a.txt").with_preconditions(Preconditions {
            if_none_match: vec![etag.to_string()],
            ..Default::default()
        });
        match vfs.read(&request).await.unwrap() {
            ReadOutcome::NotModified(tag) => assert_eq!(tag, etag),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_range_honoured_only_with_matching_if_range() {
        let (tmp, vfs) = setup();
        std::fs::write(tmp.path().join("a.txt"), b"0123456789").unwrap();

        let etag = match vfs.read(&VfsRequest::new("/a.txt")).await.unwrap() {
            ReadOutcome::File(read) => read.etag,
            other => panic!("unexpected {other:?}"),
        };

        let ranged = VfsRequest::new("/a.txt").with_preconditions(Preconditions {
            if_range: Some(etag.to_string()),
            range: Some("bytes=2-4".into()),
            ..Default::default()
        });
        match vfs.read(&ranged).await.unwrap() {
            ReadOutcome::File(mut read) => {
                let range = read.range.unwrap();
                let mut out = Vec::new();
                (&mut read.lease)
                    .take(range.byte_count())
                    .read_to_end(&mut out)
                    .await
                    .unwrap();
                assert_eq!(out, b"234");
            }
            other => panic!("unexpected {other:?}"),
        }

        let stale = VfsRequest::new("/a.txt").with_preconditions(Preconditions {
            if_range: Some("\"stale\"".into()),
            range: Some("bytes=2-4".into()),
            ..Default::default()
        });
        match vfs.read(&stale).await.unwrap() {
            ReadOutcome::File(read) => assert!(read.range.is_none()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stale_snapshot_write_is_conflict() {
        let (tmp, vfs) = setup();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, b"original").unwrap();

        let request = VfsRequest::new("/a.txt");
        let stated = vfs.stat_request(&request).await.unwrap();
        let RequestIntent::ExistingFile(snapshot) = stated.intent.clone() else {
            panic!("expected a file");
        };

        // Someone else rewrites the file after our stat.
        std::fs::write(&path, b"theirs").unwrap();
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(60))
            .unwrap();

        let result = vfs
            .handle_file_write(&request, &stated.local, Some(snapshot), body("mine"))
            .await;
        assert!(matches!(result, Err(VfsError::Conflict(_))));
        assert_eq!(std::fs::read(&path).unwrap(), b"theirs");
    }

    #[tokio::test]
    async fn test_directory_listing_hrefs() {
        let (tmp, vfs) = setup();
        std::fs::create_dir(tmp.path().join("docs")).unwrap();
        std::fs::write(tmp.path().join("docs").join("a.txt"), b"0123456789").unwrap();
        std::fs::create_dir(tmp.path().join("docs").join("b")).unwrap();

        let entries: Vec<_> = match vfs.read(&VfsRequest::new("/docs/")).await.unwrap() {
            ReadOutcome::Directory(stream) => stream.try_collect().await.unwrap(),
            other => panic!("unexpected {other:?}"),
        };
        let mut hrefs: Vec<_> = entries.iter().map(|entry| entry.href.clone()).collect();
        hrefs.sort();
        assert_eq!(
            hrefs,
            vec![
                "http://localhost:8968/docs/a.txt",
                "http://localhost:8968/docs/b/",
            ]
        );
    }

    #[tokio::test]
    async fn test_listing_hrefs_use_normalized_path() {
        let (tmp, vfs) = setup();
        std::fs::create_dir(tmp.path().join("docs")).unwrap();
        std::fs::write(tmp.path().join("docs").join("x.txt"), b"x").unwrap();

        for (raw, expected) in [
            ("/docs/..", "http://localhost:8968/docs/"),
            ("/docs/../docs/./", "http://localhost:8968/docs/x.txt"),
        ] {
            let entries: Vec<_> = match vfs.read(&VfsRequest::new(raw)).await.unwrap() {
                ReadOutcome::Directory(stream) => stream.try_collect().await.unwrap(),
                other => panic!("{raw}: unexpected {other:?}"),
            };
            assert_eq!(entries.len(), 1, "{raw}");
            assert_eq!(entries[0].href, expected, "{raw}");
        }
    }

    fn interrupted_body() -> BodyDataStream {
        let chunks: Vec<Result<axum::body::Bytes, std::io::Error>> = vec![
            Ok(axum::body::Bytes::from_static(b"part")),
            Err(std::io::Error::other("client disconnected")),
        ];
        Body::from_stream(futures::stream::iter(chunks)).into_data_stream()
    }

    #[tokio::test]
    async fn test_interrupted_write_leaves_no_trace() {
        let (tmp, vfs) = setup();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, b"precious original content").unwrap();

        let result = vfs.write(&VfsRequest::new("/a.txt"), interrupted_body()).await;
        assert!(matches!(result, Err(VfsError::Unexpected(_))), "{result:?}");
        assert_eq!(std::fs::read(&path).unwrap(), b"precious original content");

        let result = vfs
            .write(&VfsRequest::new("/fresh/b.txt"), interrupted_body())
            .await;
        assert!(result.is_err());
        assert!(!tmp.path().join("fresh").exists());

        // Nothing stays locked behind the failed requests.
        assert!(matches!(
            vfs.write(&VfsRequest::new("/a.txt"), body("next")).await.unwrap(),
            WriteOutcome::Replaced(_)
        ));
        assert_eq!(std::fs::read(&path).unwrap(), b"next");
    }

    /// A variant that refuses every file write but keeps the rest.
    struct ReadOnlyVfs(DefaultVfs);

    #[async_trait::async_trait]
    impl VfsService for ReadOnlyVfs {
        fn resolver(&self) -> &PathResolver {
            self.0.resolver()
        }

        fn store(&self) -> &dyn FileStore {
            self.0.store()
        }

        fn lister(&self) -> &DirectoryLister {
            self.0.lister()
        }

        fn media_types(&self) -> &dyn MediaTypeResolver {
            self.0.media_types()
        }

        fn public_url(&self) -> &str {
            self.0.public_url()
        }

        async fn handle_file_write(
            &self,
            _request: &VfsRequest,
            local: &LocalPath,
            _snapshot: Option<FileSnapshot>,
            _body: BodyDataStream,
        ) -> VfsResult<WriteOutcome> {
            Err(VfsError::Conflict(format!("{} is read-only", local.display_name())))
        }
    }

    #[tokio::test]
    async fn test_hooks_can_be_overridden() {
        let (tmp, vfs) = setup();
        let read_only = ReadOnlyVfs(vfs);

        assert!(matches!(
            read_only.write(&VfsRequest::new("/a.txt"), body("x")).await,
            Err(VfsError::Conflict(_))
        ));
        assert!(!tmp.path().join("a.txt").exists());

        std::fs::create_dir(tmp.path().join("docs")).unwrap();
        assert!(matches!(
            read_only.read(&VfsRequest::new("/docs")).await.unwrap(),
            ReadOutcome::Redirect(_)
        ));
    }
}
