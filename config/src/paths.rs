use directories::BaseDirs;
use std::path::PathBuf;

const APP_DIR: &str = "chatstream";

pub struct PathManager;

impl PathManager {
    pub fn data_dir() -> Option<PathBuf> {
        BaseDirs::new().map(|d| d.data_dir().join(APP_DIR))
    }

    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(any(target_os = "android", target_os = "ios"))]
        return Self::data_dir();

        #[cfg(not(any(target_os = "android", target_os = "ios")))]
        BaseDirs::new().map(|d| d.config_dir().join(APP_DIR))
    }

    pub fn logs_dir() -> Option<PathBuf> {
        Self::data_dir().map(|d| d.join("logs"))
    }

    pub fn log_file_path() -> Option<PathBuf> {
        Self::logs_dir().map(|d| d.join("chatstream.log"))
    }

    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("settings.toml"))
    }
}
