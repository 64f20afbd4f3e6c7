use std::path::{Path, PathBuf};

use crate::error::{Result, TrampolineError};
use crate::models::Settings;

const SETTINGS_FILENAME: &str = "trampoline.yaml";
const HOME_ENV: &str = "TRAMPOLINE_HOME";
const DEFAULT_FOLDER: &str = ".trampoline";

/// Pick the settings folder: explicit override, then `TRAMPOLINE_HOME`,
/// then `.trampoline` under the user's home directory.
pub fn resolve_folder(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(folder) = explicit {
        return folder;
    }
    if let Some(folder) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(folder);
    }
    let home_var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    std::env::var_os(home_var)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_FOLDER)
}

/// Load settings from `trampoline.yaml` in `folder`. The file is optional.
pub fn load(folder: &Path) -> Result<Settings> {
    let settings_path = folder.join(SETTINGS_FILENAME);
    if !settings_path.exists() {
        return Ok(Settings::with_folder(folder));
    }
    let contents = std::fs::read_to_string(&settings_path)?;
    let mut settings: Settings = if contents.trim().is_empty() {
        Settings::default()
    } else {
        serde_yaml::from_str(&contents)
            .map_err(|e| TrampolineError::InvalidSettings(e.to_string()))?
    };
    if settings.ecosystem_file_name.trim().is_empty() {
        return Err(TrampolineError::InvalidSettings(
            "ecosystem_file_name must not be empty".into(),
        ));
    }
    settings.settings_folder = folder.to_path_buf();
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn parse_full_settings() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = r#"
ecosystem_file_name: env.json
app_version: 4.2
templates_dir: /etc/trampoline/templates
health_timeout_secs: 2
"#;
        fs::write(dir.path().join(SETTINGS_FILENAME), yaml).unwrap();
        let settings = load(dir.path()).unwrap();
        assert_eq!(settings.ecosystem_file_name, "env.json");
        assert_eq!(settings.app_version, 4.2);
        assert_eq!(
            settings.templates_dir,
            Some(PathBuf::from("/etc/trampoline/templates"))
        );
        assert_eq!(settings.health_timeout_secs, 2);
        assert_eq!(settings.settings_folder, dir.path());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load(dir.path()).unwrap();
        assert_eq!(settings.ecosystem_path(), dir.path().join("ecosystem.json"));
        assert!(settings.templates_dir.is_none());
    }

    #[test]
    fn malformed_file_is_invalid_settings() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SETTINGS_FILENAME), "health_timeout_secs: [nope").unwrap();
        assert!(matches!(
            load(dir.path()),
            Err(TrampolineError::InvalidSettings(_))
        ));
    }

    #[test]
    fn explicit_folder_wins() {
        let folder = resolve_folder(Some(PathBuf::from("/srv/tramp")));
        assert_eq!(folder, PathBuf::from("/srv/tramp"));
    }
}
