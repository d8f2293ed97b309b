/// state.rs — Shared application state passed to every Axum handler.
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub cfg:      Arc<Config>,
    pub base_dir: PathBuf,
    /// Serializes publish operations against the target directory. A publish
    /// that interleaves with another would mix two archives' entries.
    pub publish_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(cfg: Arc<Config>, base_dir: PathBuf) -> Self {
        Self {
            cfg,
            base_dir,
            publish_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn static_dir(&self) -> PathBuf {
        self.base_dir.join(&self.cfg.static_dir)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.base_dir.join(&self.cfg.uploads_dir)
    }

    pub fn site_dir(&self) -> PathBuf {
        self.base_dir.join(&self.cfg.site_dir)
    }

    pub fn work_dir(&self) -> PathBuf {
        self.base_dir.join(&self.cfg.work_dir)
    }
}
