//! In-process [`UserStore`] for unit tests. A single mutex makes every
//! operation atomic, which stands in for the unique index and row lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::repo::UserStore;
use crate::auth::repo_types::{NewUser, Redemption, User};
use crate::error::StoreError;

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
    redeem_calls: AtomicUsize,
}

impl MemoryUserStore {
    pub async fn remove(&self, id: Uuid) {
        self.users.lock().await.remove(&id);
    }

    /// Number of times `redeem_reset_token` has been entered.
    pub fn redeem_calls(&self) -> usize {
        self.redeem_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;
        if users.values().any(|u| u.email == new.email) {
            return Err(StoreError::UniqueViolation);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: new.id,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            username: new.username,
            password_hash: new.password_hash,
            email_verified: None,
            reset_token_digest: None,
            reset_token_expires_at: None,
            code_phone: None,
            phone: None,
            country_id: None,
            image_url: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn store_reset_token(
        &self,
        id: Uuid,
        digest: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        if let Some(user) = self.users.lock().await.get_mut(&id) {
            user.reset_token_digest = Some(digest.to_string());
            user.reset_token_expires_at = Some(expires_at);
        }
        Ok(())
    }

    async fn reset_token_exists(&self, digest: &str) -> Result<bool, StoreError> {
        let users = self.users.lock().await;
        Ok(users
            .values()
            .any(|u| u.reset_token_digest.as_deref() == Some(digest)))
    }

    async fn redeem_reset_token(
        &self,
        digest: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Redemption, StoreError> {
        self.redeem_calls.fetch_add(1, Ordering::SeqCst);
        let mut users = self.users.lock().await;
        let Some(user) = users
            .values_mut()
            .find(|u| u.reset_token_digest.as_deref() == Some(digest))
        else {
            return Ok(Redemption::Unknown);
        };
        let live = user.reset_token_expires_at.is_some_and(|exp| exp > now);
        user.reset_token_digest = None;
        user.reset_token_expires_at = None;
        user.updated_at = now;
        if !live {
            return Ok(Redemption::Expired);
        }
        user.password_hash = password_hash.to_string();
        Ok(Redemption::Applied(user.clone()))
    }
}
