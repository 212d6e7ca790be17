use std::sync::Arc;

use tracing::{error, info, instrument, warn, Instrument};
use uuid::Uuid;

use crate::auth::{
    dto::{ChangePasswordRequest, ForgetPasswordRequest, LoginRequest, SignUpRequest, UserPublic},
    jwt::{Claims, JwtKeys},
    password::SecretHasher,
    repo::UserStore,
    repo_types::NewUser,
    reset::ResetTokens,
    validate::{normalize_email, Checks},
};
use crate::config::AppConfig;
use crate::error::{AuthError, StoreError};
use crate::mail::{MailClient, ResetMail};

/// A freshly issued session.
#[derive(Debug)]
pub struct Session {
    pub token: String,
    pub user: UserPublic,
}

/// Sign-up, login, password recovery and identity lookup.
#[derive(Clone)]
pub struct CredentialService {
    users: Arc<dyn UserStore>,
    hasher: SecretHasher,
    keys: JwtKeys,
    resets: ResetTokens,
    mail: Arc<dyn MailClient>,
    mail_from: String,
    reset_url_base: String,
}

impl CredentialService {
    pub fn new(
        config: &AppConfig,
        users: Arc<dyn UserStore>,
        mail: Arc<dyn MailClient>,
    ) -> anyhow::Result<Self> {
        let hasher = SecretHasher::new(&config.hashing)?;
        let resets = ResetTokens::new(
            users.clone(),
            hasher.clone(),
            time::Duration::minutes(config.reset.ttl_minutes),
        );
        Ok(Self {
            users,
            hasher,
            keys: JwtKeys::new(&config.jwt),
            resets,
            mail,
            mail_from: config.mail.from.clone(),
            reset_url_base: config.reset.url_base.clone(),
        })
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    #[instrument(skip_all)]
    pub async fn sign_up(&self, req: SignUpRequest) -> Result<UserPublic, AuthError> {
        let mut checks = Checks::default();
        checks.required("first_name", req.first_name.as_deref());
        checks.required("last_name", req.last_name.as_deref());
        checks.email("email", req.email.as_deref());
        checks.required("password", req.password.as_deref());
        checks.finish()?;

        let email = normalize_email(req.email.as_deref().unwrap_or_default());
        let password = req.password.unwrap_or_default();

        // Digest exists before the row does.
        let password_hash = self.hasher.hash_blocking(password).await?;

        let new = NewUser {
            id: Uuid::new_v4(),
            first_name: req.first_name.unwrap_or_default().trim().to_string(),
            last_name: req.last_name.unwrap_or_default().trim().to_string(),
            username: email.clone(),
            email,
            password_hash,
        };
        let user = self.users.create(new).await.map_err(|e| {
            if matches!(e, StoreError::UniqueViolation) {
                warn!("email already registered");
            }
            AuthError::from(e)
        })?;

        info!(user_id = %user.id, email = %user.email, "user signed up");
        Ok(UserPublic::from(&user))
    }

    #[instrument(skip_all)]
    pub async fn log_in(&self, req: LoginRequest) -> Result<Session, AuthError> {
        let email = req
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AuthError::BadRequest("Email not given".into()))?;
        let password = req
            .password
            .ok_or_else(|| AuthError::BadRequest("Password not provided for compare".into()))?;

        let user = self.users.find_by_email(&email).await?.ok_or_else(|| {
            warn!(email = %email, "login unknown email");
            AuthError::NotFound("User")
        })?;

        let ok = self
            .hasher
            .verify_blocking(password, user.password_hash.clone())
            .await?;
        if !ok {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::Unauthorized("Wrong Credentials"));
        }

        let token = self.keys.issue(user.id)?;
        info!(user_id = %user.id, "user logged in");
        Ok(Session {
            token,
            user: UserPublic::from(&user),
        })
    }

    /// Issues a reset token and mails it. Delivery runs detached; its failures
    /// are logged and never reach the caller.
    #[instrument(skip_all)]
    pub async fn forget_password(&self, req: ForgetPasswordRequest) -> Result<(), AuthError> {
        let mut checks = Checks::default();
        checks.email("email", req.email.as_deref());
        checks.finish()?;
        let email = normalize_email(req.email.as_deref().unwrap_or_default());

        let user = self.users.find_by_email(&email).await?.ok_or_else(|| {
            warn!(email = %email, "reset requested for unknown email");
            AuthError::NotFound("User")
        })?;

        let token = self.resets.create(user.id).await?;
        let mail = ResetMail::new(&self.mail_from, &user.email, token, &self.reset_url_base);

        let client = Arc::clone(&self.mail);
        let user_id = user.id;
        tokio::spawn(
            async move {
                if let Err(e) = client.send(mail).await {
                    error!(error = %e, user_id = %user_id, "reset mail delivery failed");
                }
            }
            .in_current_span(),
        );
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        token: &str,
        req: ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        let mut checks = Checks::default();
        checks.required("password", req.password.as_deref());
        checks.finish()?;
        self.resets
            .redeem(token, &req.password.unwrap_or_default())
            .await
    }

    #[instrument(skip_all, fields(user_id = %claims.sub))]
    pub async fn current_user(&self, claims: &Claims) -> Result<UserPublic, AuthError> {
        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::NotFound("User"))?;
        Ok(UserPublic::from(&user))
    }
}

#[cfg(test)]
pub(crate) fn test_service(
    users: Arc<dyn UserStore>,
    mail: Arc<dyn MailClient>,
) -> CredentialService {
    CredentialService::new(&crate::config::test_config(), users, mail).expect("test service")
}
