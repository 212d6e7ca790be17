use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, Redemption, User};
use crate::error::StoreError;

const USER_COLUMNS: &str = r#"
    id, first_name, last_name, email, username, password_hash, email_verified,
    reset_token_digest, reset_token_expires_at, code_phone, phone, country_id,
    image_url, created_at, updated_at
"#;

/// Durable storage for user records.
///
/// Implementations must reject a second user with the same email at write time
/// (unique index or equivalent) and report it as [`StoreError::UniqueViolation`].
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    /// Replaces whatever reset token the user held.
    async fn store_reset_token(
        &self,
        id: Uuid,
        digest: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError>;

    /// Index lookup only; redemption still decides the outcome.
    async fn reset_token_exists(&self, digest: &str) -> Result<bool, StoreError>;

    /// Clears the token matching `digest` and, if it is still live at `now`,
    /// sets `password_hash` in the same atomic write.
    async fn redeem_reset_token(
        &self,
        digest: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Redemption, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_unique_violation(e: sqlx::Error) -> StoreError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation;
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl UserStore for PgUserStore {
    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id, email = %user.email))]
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, first_name, last_name, email, username, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_unique_violation)?;
        Ok(created)
    }

    #[instrument(skip(self, digest))]
    async fn store_reset_token(
        &self,
        id: Uuid,
        digest: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_token_digest = $2, reset_token_expires_at = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(digest)
        .bind(expires_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn reset_token_exists(&self, digest: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE reset_token_digest = $1)",
        )
        .bind(digest)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    #[instrument(skip_all)]
    async fn redeem_reset_token(
        &self,
        digest: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Redemption, StoreError> {
        let mut tx = self.db.begin().await?;

        // A concurrent redeemer blocks on the row lock, then re-reads the row
        // with the digest already cleared and matches nothing.
        let target: Option<(Uuid, Option<OffsetDateTime>)> = sqlx::query_as(
            r#"
            SELECT id, reset_token_expires_at
            FROM users
            WHERE reset_token_digest = $1
            FOR UPDATE
            "#,
        )
        .bind(digest)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((id, expires_at)) = target else {
            return Ok(Redemption::Unknown);
        };
        let live = expires_at.is_some_and(|exp| exp > now);

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET password_hash = CASE WHEN $2 THEN $3 ELSE password_hash END,
                reset_token_digest = NULL,
                reset_token_expires_at = NULL,
                updated_at = $4
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(live)
        .bind(password_hash)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(if live {
            Redemption::Applied(user)
        } else {
            Redemption::Expired
        })
    }
}
