//! Persistent per-user settings (display language and location).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use teloxide::types::UserId;
use tracing::{debug, info};

use crate::geocoder::Coordinates;

/// Settings row of a single user; fields are `None` when never set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserSettings {
    pub language: Option<String>,
    pub location: Option<Coordinates>,
}

/// Partial update; `None` fields keep their stored value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsUpdate {
    pub language: Option<String>,
    pub location: Option<Coordinates>,
}

impl SettingsUpdate {
    pub fn language(language: &str) -> Self {
        Self {
            language: Some(language.to_string()),
            location: None,
        }
    }

    pub fn location(location: Coordinates) -> Self {
        Self {
            language: None,
            location: Some(location),
        }
    }
}

impl UserSettings {
    /// Apply an update, returning the merged settings
    pub fn merged(&self, update: &SettingsUpdate) -> UserSettings {
        UserSettings {
            language: update.language.clone().or_else(|| self.language.clone()),
            location: update.location.or(self.location),
        }
    }
}

/// Storage for user settings
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read the settings of a user; an unknown user yields empty settings
    async fn get_settings(&self, user_id: UserId) -> Result<UserSettings>;

    /// Merge and persist an update; returns `false` when nothing changed
    async fn save_settings(&self, user_id: UserId, update: SettingsUpdate) -> Result<bool>;
}

/// Make sure a user has a language stored, writing `default_language` if not
pub async fn initialize_default_settings(
    store: &dyn SettingsStore,
    user_id: UserId,
    default_language: &str,
) -> Result<UserSettings> {
    let settings = store.get_settings(user_id).await?;
    if settings.language.is_some() {
        return Ok(settings);
    }

    let update = SettingsUpdate::language(default_language);
    store.save_settings(user_id, update.clone()).await?;
    info!(user_id = %user_id, language = default_language, "Default settings initialized");
    Ok(settings.merged(&update))
}

/// SQLite implementation of [`SettingsStore`]
#[derive(Clone)]
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    /// Open (creating if needed) the settings database at `path`
    pub async fn connect(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open settings database at {path}"))?;

        init_database_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Open a private in-memory database
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory settings database")?;

        init_database_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Wait for in-flight queries and close every connection
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Settings database closed");
    }
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &SqlitePool) -> Result<()> {
    info!("Initializing settings database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS user_settings (
            user_id INTEGER PRIMARY KEY,
            language TEXT,
            latitude REAL,
            longitude REAL,
            updated_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create user_settings table")?;

    info!("Settings database schema initialized successfully");
    Ok(())
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn get_settings(&self, user_id: UserId) -> Result<UserSettings> {
        let row = sqlx::query("SELECT language, latitude, longitude FROM user_settings WHERE user_id = ?")
            .bind(user_id.0 as i64)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read user settings")?;

        let Some(row) = row else {
            debug!(user_id = %user_id, "No settings stored for user");
            return Ok(UserSettings::default());
        };

        let latitude: Option<f64> = row.try_get("latitude")?;
        let longitude: Option<f64> = row.try_get("longitude")?;

        Ok(UserSettings {
            language: row.try_get("language")?,
            location: latitude.zip(longitude).map(|(lat, lon)| Coordinates::new(lat, lon)),
        })
    }

    async fn save_settings(&self, user_id: UserId, update: SettingsUpdate) -> Result<bool> {
        let current = self.get_settings(user_id).await?;
        let merged = current.merged(&update);
        if merged == current {
            debug!(user_id = %user_id, "Settings unchanged, skipping write");
            return Ok(false);
        }

        let now: DateTime<Utc> = Utc::now();
        sqlx::query(
            "INSERT INTO user_settings (user_id, language, latitude, longitude, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                 language = excluded.language,
                 latitude = excluded.latitude,
                 longitude = excluded.longitude,
                 updated_at = excluded.updated_at",
        )
        .bind(user_id.0 as i64)
        .bind(merged.language.as_deref())
        .bind(merged.location.map(|c| c.latitude))
        .bind(merged.location.map(|c| c.longitude))
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to save user settings")?;

        info!(user_id = %user_id, "User settings saved");
        Ok(true)
    }
}
