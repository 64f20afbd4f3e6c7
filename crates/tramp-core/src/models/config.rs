use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const DEFAULT_ECOSYSTEM_FILE: &str = "ecosystem.json";
pub const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 5;

/// Installation-wide settings, read from `trampoline.yaml` in the settings folder.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where the ecosystem document and launch artifacts live. Never read
    /// from the file itself; always the folder the file was found in.
    #[serde(skip)]
    pub settings_folder: PathBuf,
    pub ecosystem_file_name: String,
    /// Version stamped onto catalog entries.
    pub app_version: f32,
    /// Directory whose files replace the built-in launch templates.
    pub templates_dir: Option<PathBuf>,
    pub health_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            settings_folder: PathBuf::from(".trampoline"),
            ecosystem_file_name: DEFAULT_ECOSYSTEM_FILE.to_string(),
            app_version: package_version(),
            templates_dir: None,
            health_timeout_secs: DEFAULT_HEALTH_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    pub fn with_folder(settings_folder: &Path) -> Self {
        Self {
            settings_folder: settings_folder.to_path_buf(),
            ..Self::default()
        }
    }

    pub fn ecosystem_path(&self) -> PathBuf {
        self.settings_folder.join(&self.ecosystem_file_name)
    }

    pub fn log_path(&self) -> PathBuf {
        self.settings_folder.join("trampoline.log")
    }
}

/// `major.minor` of this crate as a float, the format catalog entries carry.
pub fn package_version() -> f32 {
    let mut parts = env!("CARGO_PKG_VERSION").split('.');
    let major = parts.next().unwrap_or("0");
    let minor = parts.next().unwrap_or("0");
    format!("{major}.{minor}").parse().unwrap_or(0.0)
}
