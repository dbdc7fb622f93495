use std::path::PathBuf;
use std::fs;
use crate::common::{Config, Result};

/// Local sandbox for development: redirects every storage path into
/// `./dev_data` so a checkout never touches the system database.
#[derive(Debug, Clone)]
pub struct DevMode {
    enabled: bool,
    base_dir: PathBuf,
}

impl DevMode {
    pub fn new(enabled: bool) -> Result<Self> {
        Self::with_base_dir(enabled, PathBuf::from("./dev_data"))
    }

    pub fn with_base_dir(enabled: bool, base_dir: PathBuf) -> Result<Self> {
        if enabled {
            fs::create_dir_all(&base_dir)?;
            fs::create_dir_all(base_dir.join("stored_photos"))?;
            fs::create_dir_all(base_dir.join("temp"))?;

            tracing::info!("Development mode enabled - data will be saved to: {}",
                           base_dir.display());
        }

        Ok(Self { enabled, base_dir })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn database_path(&self) -> PathBuf {
        self.base_dir.join("voters.db")
    }

    /// Stored photo paths stay `stored_photos/<id>.jpg`, as with the
    /// default config's `photo_root = "."`.
    pub fn photo_root(&self) -> PathBuf {
        self.base_dir.clone()
    }

    pub fn capture_dir(&self) -> PathBuf {
        self.base_dir.join("temp")
    }

    /// Point the config's storage section at the dev directories. No-op when disabled.
    pub fn apply(&self, config: &mut Config) {
        if !self.enabled {
            return;
        }

        config.storage.database_path = self.database_path();
        config.storage.photo_root = self.photo_root();
        config.storage.capture_dir = self.capture_dir();
        tracing::debug!("Storage redirected to dev directories under {:?}", self.base_dir);
    }
}
