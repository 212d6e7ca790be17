use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            ChangePasswordRequest, ForgetPasswordRequest, LoginRequest, LoginResponse, Notice,
            Results, SignUpRequest, SignUpResponse, UserPublic,
        },
        extractors::{AuthUser, JsonBody},
    },
    error::AuthError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/login", post(login))
        .route("/auth/forget-password", post(forget_password))
        .route("/auth/change-password/:token", post(change_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SignUpRequest>,
) -> Result<(StatusCode, Json<SignUpResponse>), AuthError> {
    let user = state.credentials.sign_up(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            results: "Success Sign Up",
            user,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let session = state.credentials.log_in(payload).await?;
    Ok(Json(LoginResponse {
        message: "Correct Credentials",
        token: session.token,
        user: session.user,
    }))
}

#[instrument(skip(state, payload))]
pub async fn forget_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ForgetPasswordRequest>,
) -> Result<Json<Results<Notice>>, AuthError> {
    state.credentials.forget_password(payload).await?;
    Ok(Json(Results {
        results: Notice {
            message: "Email sent, check your inbox",
        },
    }))
}

#[instrument(skip(state, token, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    JsonBody(payload): JsonBody<ChangePasswordRequest>,
) -> Result<Json<Results<Notice>>, AuthError> {
    state.credentials.change_password(&token, payload).await?;
    Ok(Json(Results {
        results: Notice {
            message: "Password updated",
        },
    }))
}

#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn get_me(auth: AuthUser) -> Json<Results<UserPublic>> {
    Json(Results { results: auth.user })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::app::build_app;
    use crate::auth::memory::MemoryUserStore;
    use crate::mail::testing::channel_mailer;
    use crate::state::AppState;

    use super::*;

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn http_recovery_flow() {
        let (mailer, mut outbox) = channel_mailer();
        let state = AppState::fake(Arc::new(MemoryUserStore::default()), Arc::new(mailer));
        let app = build_app(state);

        let (status, body) = send(
            &app,
            post_json(
                "/api/v1/auth/sign-up",
                json!({"first_name": "Juan", "last_name": "Perez", "email": "JUAN@Gmail.com", "password": "12345"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["email"], "juan@gmail.com");
        assert!(body["user"].get("password_hash").is_none());

        let (status, body) = send(
            &app,
            post_json("/api/v1/auth/sign-up", json!({"first_name": "J", "last_name": "P", "email": "juan@gmail.com", "password": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "EMAIL_ALREADY_EXISTS");

        let (status, body) = send(
            &app,
            post_json("/api/v1/auth/login", json!({"email": "juan@gmail.com", "password": "12345"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        let me = Request::builder()
            .uri("/api/v1/auth/me")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, me).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"]["username"], "juan@gmail.com");

        let (status, _) = send(
            &app,
            post_json("/api/v1/auth/forget-password", json!({"email": "juan@gmail.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let mail = outbox.recv().await.unwrap();

        let uri = format!("/api/v1/auth/change-password/{}", mail.token);
        let (status, _) = send(&app, post_json(&uri, json!({"password": "54321"}))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, post_json(&uri, json!({"password": "54321"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "TOKEN_NOT_FOUND");

        let (status, _) = send(
            &app,
            post_json("/api/v1/auth/login", json!({"email": "juan@gmail.com", "password": "12345"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn http_error_statuses() {
        let (mailer, _outbox) = channel_mailer();
        let state = AppState::fake(Arc::new(MemoryUserStore::default()), Arc::new(mailer));
        let app = build_app(state);

        let (status, body) = send(&app, post_json("/api/v1/auth/sign-up", json!({"email": "juan@gmail.com"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Schema Validation Error");
        assert_eq!(body["details"].as_array().unwrap().len(), 3);

        let (status, body) = send(&app, post_json("/api/v1/auth/login", json!({"password": "12345"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Email not given");

        let (status, _) = send(
            &app,
            post_json("/api/v1/auth/login", json!({"email": "ghost@gmail.com", "password": "12345"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let me = Request::builder().uri("/api/v1/auth/me").body(Body::empty()).unwrap();
        let (status, body) = send(&app, me).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["errorName"], "Unauthorized");

        let (status, body) = send(&app, Request::builder().uri("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Up");
    }

    fn post_raw(uri: &str, content_type: Option<&str>, body: &'static str) -> Request<Body> {
        let mut req = Request::builder().method("POST").uri(uri);
        if let Some(ct) = content_type {
            req = req.header(header::CONTENT_TYPE, ct);
        }
        req.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn http_malformed_bodies_get_json_errors() {
        let (mailer, _outbox) = channel_mailer();
        let state = AppState::fake(Arc::new(MemoryUserStore::default()), Arc::new(mailer));
        let app = build_app(state);

        // no body, no content type: same path as `{}`
        let (status, body) = send(&app, post_raw("/api/v1/auth/login", None, "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "BAD_REQUEST");
        assert_eq!(body["message"], "Email not given");

        let (status, body) = send(&app, post_raw("/api/v1/auth/sign-up", None, "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "VALIDATION_ERROR");
        assert_eq!(body["details"].as_array().unwrap().len(), 4);

        let (status, body) = send(
            &app,
            post_json("/api/v1/auth/sign-up", json!({"first_name": "Juan", "last_name": "Perez", "email": 5, "password": "12345"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "BAD_REQUEST");
        assert_eq!(body["errorName"], "Bad Request");

        let (status, body) = send(
            &app,
            post_raw("/api/v1/auth/login", Some("application/json"), "{not json"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "BAD_REQUEST");
        let message = body["message"].as_str().unwrap();
        assert!(!message.contains("line") && !message.contains("column"), "{message}");

        let (status, body) = send(
            &app,
            post_raw("/api/v1/auth/forget-password", Some("text/plain"), "juan@gmail.com"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "BAD_REQUEST");
    }
}
