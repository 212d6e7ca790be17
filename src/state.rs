use crate::auth::repo::{PgUserStore, UserStore};
use crate::auth::services::CredentialService;
use crate::config::AppConfig;
use crate::mail::{LogMailer, MailClient};
use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub credentials: CredentialService,
}

impl AppState {
    pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
        sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")
    }

    pub fn init(config: AppConfig, db: PgPool) -> anyhow::Result<Self> {
        let users = Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>;
        let mail = Arc::new(LogMailer) as Arc<dyn MailClient>;
        Self::from_parts(&config, users, mail)
    }

    pub fn from_parts(
        config: &AppConfig,
        users: Arc<dyn UserStore>,
        mail: Arc<dyn MailClient>,
    ) -> anyhow::Result<Self> {
        let credentials = CredentialService::new(config, users, mail)?;
        Ok(Self { credentials })
    }

    #[cfg(test)]
    pub fn fake(users: Arc<dyn UserStore>, mail: Arc<dyn MailClient>) -> Self {
        Self::from_parts(&crate::config::test_config(), users, mail)
            .expect("fake state")
    }
}
