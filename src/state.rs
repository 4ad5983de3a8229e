use std::sync::Arc;

use crate::config::AppConfig;
use crate::db;
use crate::mail::{ResetMailer, TracingMailer};
use crate::storage::{Storage, StorageClient};
use crate::users::repo::{PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub storage: Arc<dyn StorageClient>,
    pub mailer: Arc<dyn ResetMailer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let pool = db::connect(&config.database_url).await?;
        db::migrate(&pool).await;

        // Real S3/MinIO
        let storage = Arc::new(Storage::new(&config.storage).await?) as Arc<dyn StorageClient>;
        let mailer =
            Arc::new(TracingMailer::new(config.frontend_url.clone())) as Arc<dyn ResetMailer>;

        Ok(Self::from_parts(
            config,
            Arc::new(PgUserStore::new(pool)),
            storage,
            mailer,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        storage: Arc<dyn StorageClient>,
        mailer: Arc<dyn ResetMailer>,
    ) -> Self {
        Self {
            config,
            users,
            storage,
            mailer,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        crate::testing::Harness::new().state
    }
}
