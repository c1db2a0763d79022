use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Directory served as `/`.
    pub root_dir: PathBuf,
    /// Scheme and authority clients use to reach the server, used in listings.
    pub public_url: String,
}

impl Config {
    pub fn new(root_dir: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8968,
            root_dir: root_dir.into(),
            public_url: public_url.into(),
        }
    }
}
