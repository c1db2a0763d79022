/// Media type reported for directories in listings.
pub const DIRECTORY_MEDIA_TYPE: &str = "inode/directory";

/// Fallback for extensions nobody registered.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Maps a file extension (without the dot) to a MIME type.
pub trait MediaTypeResolver: Send + Sync {
    fn resolve(&self, extension: &str) -> String;

    /// Resolves the media type of a file name by its last extension.
    fn resolve_name(&self, name: &str) -> String {
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => self.resolve(ext),
            _ => DEFAULT_MEDIA_TYPE.to_string(),
        }
    }
}

/// Small built-in table covering the common web and text formats.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticMediaTypes;

impl MediaTypeResolver for StaticMediaTypes {
    fn resolve(&self, extension: &str) -> String {
        let mime = match extension.to_ascii_lowercase().as_str() {
            "txt" | "log" => "text/plain",
            "md" => "text/markdown",
            "html" | "htm" => "text/html",
            "css" => "text/css",
            "csv" => "text/csv",
            "js" | "mjs" => "text/javascript",
            "json" => "application/json",
            "xml" => "application/xml",
            "yaml" | "yml" => "application/yaml",
            "toml" => "application/toml",
            "pdf" => "application/pdf",
            "zip" => "application/zip",
            "gz" => "application/gzip",
            "tar" => "application/x-tar",
            "wasm" => "application/wasm",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "svg" => "image/svg+xml",
            "webp" => "image/webp",
            "ico" => "image/vnd.microsoft.icon",
            "mp3" => "audio/mpeg",
            "wav" => "audio/wav",
            "mp4" => "video/mp4",
            "webm" => "video/webm",
            _ => DEFAULT_MEDIA_TYPE,
        };
        mime.to_string()
    }
}
