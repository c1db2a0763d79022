// PathResolver maps request URL paths onto the served subtree.
//
// Every URL path segment names one file or directory below the root:
//
//	GET /            -> <root>/            (directory)
//	GET /docs/       -> <root>/docs/       (directory)
//	GET /docs/a.txt  -> <root>/docs/a.txt  (file)
//
// Segments are percent-decoded first and then normalized component by
// component, so `..` and `%2e%2e` are treated the same way. A path that would
// climb above the root is rejected, never clamped.

use std::io;
use std::path::{Component, Path, PathBuf};

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use crate::error::{VfsError, VfsResult};

/// Characters escaped when a name is written into a URL path segment.
pub(crate) const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// An absolute path inside the root together with the directory intent
/// carried by the request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPath {
    path: PathBuf,
    url_path: String,
    trailing_slash: bool,
    is_root: bool,
}

impl LocalPath {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the request URL ended with `/`.
    pub fn trailing_slash(&self) -> bool {
        self.trailing_slash
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// The normalized, percent-encoded URL path, e.g. `/docs/` for a request
    /// to `/docs/./b/../`.
    pub fn url_path(&self) -> &str {
        &self.url_path
    }

    /// Display name used in errors and logs.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string())
    }
}

#[derive(Clone, Debug)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Creates a resolver for `root`. The root is canonicalized once so the
    /// containment checks compare like with like.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = std::fs::canonicalize(root.as_ref())?;
        Ok(PathResolver { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a raw (still percent-encoded) request path such as
    /// `/docs/a%20b.txt` into a [`LocalPath`].
    pub async fn resolve(&self, request_path: &str) -> VfsResult<LocalPath> {
        let trailing_slash = request_path.is_empty() || request_path.ends_with('/');
        let decoded = percent_decode_str(request_path)
            .decode_utf8()
            .map_err(|_| VfsError::InvalidPath(request_path.to_string()))?;

        let relative = normalize(&decoded)?;
        let is_root = relative.as_os_str().is_empty();
        let path = self.root.join(&relative);

        self.check_containment(&path).await?;

        // The root is always addressed as a directory.
        let trailing_slash = trailing_slash || is_root;
        Ok(LocalPath {
            path,
            url_path: url_path(&relative, trailing_slash),
            trailing_slash,
            is_root,
        })
    }

    /// Canonicalizes the deepest existing ancestor of `path` and checks it is
    /// still under the root. This catches symbolic links that point outside.
    async fn check_containment(&self, path: &Path) -> VfsResult<()> {
        let mut probe = path;
        loop {
            match tokio::fs::canonicalize(probe).await {
                Ok(canonical) => {
                    if canonical.starts_with(&self.root) {
                        return Ok(());
                    }
                    return Err(VfsError::InvalidPath(path.display().to_string()));
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                    ) =>
                {
                    match probe.parent() {
                        Some(parent) if parent.starts_with(&self.root) => probe = parent,
                        _ => return Ok(()),
                    }
                }
                Err(err) => return Err(VfsError::Unexpected(err)),
            }
        }
    }
}

fn url_path(relative: &Path, trailing_slash: bool) -> String {
    let segments: Vec<String> = relative
        .iter()
        .map(|segment| utf8_percent_encode(&segment.to_string_lossy(), SEGMENT).to_string())
        .collect();
    let mut url = format!("/{}", segments.join("/"));
    if trailing_slash && !segments.is_empty() {
        url.push('/');
    }
    url
}

/// Normalizes a decoded URL path into a relative path with no `.` or `..`
/// components. Fails if `..` would leave the root.
fn normalize(decoded: &str) -> VfsResult<PathBuf> {
    if decoded.contains('\0') {
        return Err(VfsError::InvalidPath(decoded.to_string()));
    }

    let mut normalized = PathBuf::new();
    let mut depth = 0usize;
    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(segment) => {
                normalized.push(segment);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(VfsError::InvalidPath(decoded.to_string()));
                }
                normalized.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(VfsError::InvalidPath(decoded.to_string()));
            }
        }
    }
    Ok(normalized)
}
