use std::sync::Arc;

use anyhow::Context;
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::storage::{AssetStore, LocalAssetStore};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn AssetStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let storage =
            Arc::new(LocalAssetStore::new(config.upload_dir.clone()).await?) as Arc<dyn AssetStore>;

        Ok(Self {
            db,
            config,
            storage,
        })
    }

}

#[cfg(test)]
impl AppState {
    /// In-memory database plus a memory-backed asset store. The store handle
    /// is returned separately so tests can inspect it.
    pub(crate) async fn fake() -> (Self, Arc<crate::storage::testing::MemoryAssetStore>) {
        use crate::config::JwtConfig;

        let db = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .expect("migrations");

        let config = Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            upload_dir: "uploads".into(),
            jwt: JwtConfig {
                secret: "test-secret".into(),
                ttl_minutes: 5,
            },
        });

        let storage = Arc::new(crate::storage::testing::MemoryAssetStore::default());
        (
            Self {
                db,
                config,
                storage: storage.clone(),
            },
            storage,
        )
    }
}
