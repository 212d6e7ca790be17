use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::password::SecretHasher;
use crate::auth::repo::UserStore;
use crate::auth::repo_types::Redemption;
use crate::error::AuthError;

/// 32 bytes = 256 bits of entropy.
const TOKEN_BYTES: usize = 32;

fn generate_token() -> String {
    let mut buffer = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}

/// Only this digest is persisted; the plaintext leaves in the email.
fn digest(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

/// Issues and redeems single-use password-reset tokens stored inline on the user.
#[derive(Clone)]
pub struct ResetTokens {
    users: Arc<dyn UserStore>,
    hasher: SecretHasher,
    ttl: Duration,
}

impl ResetTokens {
    pub fn new(users: Arc<dyn UserStore>, hasher: SecretHasher, ttl: Duration) -> Self {
        Self { users, hasher, ttl }
    }

    pub async fn create(&self, user_id: Uuid) -> Result<String, AuthError> {
        self.create_at(user_id, OffsetDateTime::now_utc()).await
    }

    #[instrument(skip(self))]
    pub(crate) async fn create_at(&self, user_id: Uuid, now: OffsetDateTime) -> Result<String, AuthError> {
        let token = generate_token();
        let expires_at = now + self.ttl;
        self.users
            .store_reset_token(user_id, &digest(&token), expires_at)
            .await?;
        info!(user_id = %user_id, %expires_at, "reset token issued");
        Ok(token)
    }

    pub async fn redeem(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        self.redeem_at(token, new_password, OffsetDateTime::now_utc()).await
    }

    #[instrument(skip_all)]
    pub(crate) async fn redeem_at(
        &self,
        token: &str,
        new_password: &str,
        now: OffsetDateTime,
    ) -> Result<(), AuthError> {
        let token_digest = digest(token);
        // Guessed or replayed tokens stop here without paying for a hash.
        if !self.users.reset_token_exists(&token_digest).await? {
            warn!("unknown or consumed reset token presented");
            return Err(AuthError::TokenNotFound);
        }
        let hash = self.hasher.hash_blocking(new_password.to_string()).await?;
        match self.users.redeem_reset_token(&token_digest, &hash, now).await? {
            Redemption::Applied(user) => {
                info!(user_id = %user.id, "password changed with reset token");
                Ok(())
            }
            Redemption::Expired => {
                warn!("expired reset token presented; cleared");
                Err(AuthError::TokenNotFound)
            }
            Redemption::Unknown => {
                warn!("unknown or consumed reset token presented");
                Err(AuthError::TokenNotFound)
            }
        }
    }
}
