use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRef, FromRequest, FromRequestParts, Request},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        request::Parts,
        HeaderMap,
    },
};
use serde::de::DeserializeOwned;
use serde_json::error::Category;
use tracing::warn;

use super::dto::UserPublic;
use super::jwt::{Claims, JwtKeys};
use super::services::CredentialService;
use crate::error::AuthError;
use crate::state::AppState;

/// Resolved identity of the caller: verified claims plus the live user they name.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: Claims,
    pub user: UserPublic,
}

/// Reads `Authorization: Bearer <token>`; the scheme is matched case-insensitively.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::Unauthorized("Missing Authorization header"))?;

    let (scheme, token) = auth
        .split_once(' ')
        .ok_or(AuthError::Unauthorized("Invalid auth scheme"))?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::Unauthorized("Invalid auth scheme"));
    }
    Ok(token)
}

/// Verifies `token` and loads the user it names. Every failure is `Unauthorized`,
/// including a structurally valid token for a user that no longer exists.
pub(crate) async fn authenticate(
    keys: &JwtKeys,
    credentials: &CredentialService,
    token: &str,
) -> Result<AuthUser, AuthError> {
    let claims = keys
        .verify(token)
        .map_err(|_| AuthError::Unauthorized("Invalid or expired token"))?;

    let user = match credentials.current_user(&claims).await {
        Ok(user) => user,
        Err(AuthError::NotFound(_)) => {
            warn!(user_id = %claims.sub, "token for missing user");
            return Err(AuthError::Unauthorized("User not found"));
        }
        Err(e) => return Err(e),
    };

    Ok(AuthUser { claims, user })
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let keys = JwtKeys::from_ref(state);
        authenticate(&keys, &state.credentials, token).await
    }
}

/// JSON request body whose rejections are [`AuthError`]s.
///
/// An absent or blank body reads as `T::default()`, so a bare `POST` reaches
/// the same field checks as `{}`.
#[derive(Debug, Clone, Default)]
pub struct JsonBody<T>(pub T);

fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            let mime = ct.split(';').next().unwrap_or_default().trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
        .unwrap_or(true)
}

pub(crate) fn parse_json_body<T>(headers: &HeaderMap, body: &[u8]) -> Result<T, AuthError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    if !is_json_content_type(headers) {
        return Err(AuthError::BadRequest(
            "Expected request with Content-Type: application/json".into(),
        ));
    }
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "request body rejected");
        match e.classify() {
            Category::Data => AuthError::BadRequest("Request body has fields of the wrong type".into()),
            Category::Syntax | Category::Eof | Category::Io => {
                AuthError::BadRequest("Request body is not valid JSON".into())
            }
        }
    })
}

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let headers = req.headers().clone();
        let body = Bytes::from_request(req, state).await.map_err(|e| {
            warn!(error = %e, "request body unreadable");
            AuthError::BadRequest("Request body could not be read".into())
        })?;
        parse_json_body(&headers, &body).map(JsonBody)
    }
}
