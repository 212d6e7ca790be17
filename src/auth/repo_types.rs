use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,    // lowercase, unique
    pub username: String, // always equal to email
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email_verified: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub reset_token_digest: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_expires_at: Option<OffsetDateTime>,
    pub code_phone: Option<String>,
    pub phone: Option<String>,
    pub country_id: Option<i32>,
    pub image_url: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields of a user about to be inserted. Id and hash are computed by the caller.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

/// Outcome of an atomic reset-token redemption.
#[derive(Debug)]
pub enum Redemption {
    /// Token matched and was live; password replaced and token cleared.
    Applied(User),
    /// Token matched but had expired; token cleared, password untouched.
    Expired,
    /// No user holds this token.
    Unknown,
}
