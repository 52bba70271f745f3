//! Where settings and models live on disk.
//!
//! | Item | Default location |
//! |------|------------------|
//! | `settings.toml` | `dirs::config_dir()/sound-filter/` |
//! | GGML models | `dirs::data_local_dir()/sound-filter/models/` |
//!
//! Setting `SOUND_FILTER_HOME` puts both under that one directory instead,
//! which is handy for portable installs and CI.

use std::path::{Path, PathBuf};

/// Environment variable that overrides the per-user directories.
pub const HOME_ENV: &str = "SOUND_FILTER_HOME";

const APP_NAME: &str = "sound-filter";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
    pub models_dir: PathBuf,
}

impl AppPaths {
    /// `SOUND_FILTER_HOME` when set, otherwise the platform directories
    /// (the current directory when the platform reports none).
    pub fn new() -> Self {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|h| !h.is_empty()) {
            return Self::rooted(PathBuf::from(home));
        }

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME);
        let models_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME)
            .join("models");

        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            models_dir,
        }
    }

    /// Everything under `root`: `root/settings.toml` and `root/models/`.
    pub fn rooted(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            config_dir: root.to_path_buf(),
            settings_file: root.join("settings.toml"),
            models_dir: root.join("models"),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
