use std::sync::Arc;

use crate::config::Config;
use crate::service::vfs::{DefaultVfs, VfsService};
use crate::storage::paths::PathResolver;

#[derive(Clone)]
pub struct AppState {
    pub vfs: Arc<dyn VfsService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> std::io::Result<Self> {
        let resolver = PathResolver::new(&config.root_dir)?;
        let vfs = DefaultVfs::new(resolver, config.public_url.clone());
        Ok(AppState {
            vfs: Arc::new(vfs),
            config: Arc::new(config),
        })
    }

    /// Builds a state around a custom service, e.g. one that overrides hooks.
    pub fn with_service(config: Config, vfs: Arc<dyn VfsService>) -> Self {
        AppState {
            vfs,
            config: Arc::new(config),
        }
    }
}
