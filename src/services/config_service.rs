use crate::error::{AppError, AppResult};
use crate::ledger::limits::default_value;
use crate::ledger::EngineSettings;
use crate::repositories::SettingsRepository;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

/// Read-mostly engine settings, cached until explicitly invalidated
pub struct ConfigService {
    repo: SettingsRepository,
    cache: RwLock<Option<HashMap<String, String>>>,
}

impl ConfigService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repo: SettingsRepository::new(pool),
            cache: RwLock::new(None),
        }
    }

    async fn values(&self) -> AppResult<HashMap<String, String>> {
        if let Some(values) = self.cache.read().await.as_ref() {
            return Ok(values.clone());
        }

        let mut cache = self.cache.write().await;
        if let Some(values) = cache.as_ref() {
            return Ok(values.clone());
        }
        let values = self.repo.load_all().await?;
        *cache = Some(values.clone());
        Ok(values)
    }

    /// Raw value of a key, falling back to its default
    pub async fn get(&self, key: &str) -> AppResult<String> {
        if let Some(value) = self.values().await?.get(key) {
            return Ok(value.clone());
        }
        default_value(key)
            .map(str::to_string)
            .ok_or_else(|| AppError::NotFound(format!("setting {}", key)))
    }

    /// Typed snapshot for the engine core
    pub async fn settings(&self) -> AppResult<EngineSettings> {
        EngineSettings::from_map(&self.values().await?)
    }

    /// Validate, write through and invalidate the cache
    pub async fn set(&self, key: &str, value: &str) -> AppResult<EngineSettings> {
        let current = self.values().await?;
        let settings = EngineSettings::validate_update(&current, key, value.trim())?;
        self.repo.set(key, value.trim()).await?;
        self.invalidate().await;
        info!(key, value, "setting updated");
        Ok(settings)
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }
}
