//! Serves a directory subtree of the host filesystem as a REST resource
//! hierarchy.
//!
//! Every URL path segment names a file or directory below a fixed root.
//! `GET`/`HEAD` stream files or list directories, `PUT` creates or replaces
//! files, `DELETE` removes files and empty directories. Directories are
//! always addressed with a trailing `/` and files without one; requests in
//! the other form are redirected.

pub mod api;
pub mod config;
pub mod error;
pub mod service;
pub mod storage;
pub mod utils;

pub use error::{VfsError, VfsResult};
pub use service::vfs::{DefaultVfs, VfsRequest, VfsService};
