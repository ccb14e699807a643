pub mod credential;
pub mod crypto;
pub mod paths;
pub mod settings;

pub use credential::{CredentialStore, MemoryCredentialStore, SettingsCredentialStore};
pub use paths::PathManager;
pub use settings::Settings;

/// Environment variable that supplies the API key without touching the settings file.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable that overrides the configured base URL.
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

/// Load environment variables from .env files.
/// Variables already set are never overwritten, so ./.env (project directory)
/// is loaded before ~/.env (home directory) to take precedence over it.
/// Call this before parsing CLI args to ensure env vars are available.
pub fn load_env_file() {
    dotenv::dotenv().ok();

    if let Some(dirs) = directories::BaseDirs::new() {
        dotenv::from_path(dirs.home_dir().join(".env")).ok();
    }
}
