//! Storage for the single API credential.
//!
//! Reads are fail-soft: any error while loading is logged and reported as an
//! absent key.

use crate::Settings;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self) -> Option<String>;

    async fn set(&self, api_key: &str) -> anyhow::Result<()>;

    async fn clear(&self) -> anyhow::Result<()>;
}

/// Process-local store, used for environment-provided keys and in tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    api_key: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(api_key: impl Into<String>) -> Self {
        MemoryCredentialStore {
            api_key: RwLock::new(Some(api_key.into())),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> Option<String> {
        self.api_key.read().await.clone()
    }

    async fn set(&self, api_key: &str) -> anyhow::Result<()> {
        *self.api_key.write().await = Some(api_key.to_string());
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        *self.api_key.write().await = None;
        Ok(())
    }
}

/// Keeps the key encrypted inside the settings file.
///
/// Writes reload the file first so other settings are preserved.
#[derive(Debug)]
pub struct SettingsCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SettingsCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        SettingsCredentialStore {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Store backed by [`crate::PathManager::settings_path`].
    pub fn default_location() -> Option<Self> {
        crate::PathManager::settings_path().map(Self::new)
    }

    async fn load(&self) -> anyhow::Result<Settings> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Settings::from_toml(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, settings: &Settings) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = settings.to_toml().map_err(anyhow::Error::msg)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for SettingsCredentialStore {
    async fn get(&self) -> Option<String> {
        match self.load().await {
            Ok(settings) => settings.get_api_key(),
            Err(e) => {
                tracing::warn!(error = %e, path = ?self.path, "failed to read credential");
                None
            }
        }
    }

    async fn set(&self, api_key: &str) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut settings = self.load().await?;
        settings.set_api_key(api_key).map_err(anyhow::Error::msg)?;
        self.store(&settings).await
    }

    async fn clear(&self) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut settings = self.load().await?;
        settings.remove_api_key();
        self.store(&settings).await
    }
}
