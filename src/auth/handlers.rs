use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::{header, HeaderMap, HeaderValue},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use super::{
    dto::{AuthResponse, LoginRequest, MeResponse, MessageResponse, PublicUser, RegisterRequest},
    jwt::{AuthUser, JwtKeys, CLEARED_SESSION_COOKIE},
    password::{hash_password, verify_password, MIN_PASSWORD_LEN},
    repo::User,
};
use crate::{error::AppError, state::AppState};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(get_me))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn validate_registration(payload: &RegisterRequest) -> Result<(), AppError> {
    if !is_valid_email(&payload.email) {
        return Err(AppError::Validation("Please provide a valid email address".into()));
    }
    let name_len = payload.username.chars().count();
    if !(2..=50).contains(&name_len) {
        return Err(AppError::Validation(
            "Username must be between 2 and 50 characters".into(),
        ));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn session(keys: &JwtKeys, user: User) -> Result<(HeaderMap, Json<AuthResponse>), AppError> {
    let token = keys.sign(user.id)?;
    let mut headers = HeaderMap::new();
    let cookie = HeaderValue::from_str(&keys.session_cookie(&token))
        .map_err(|e| AppError::Internal(e.into()))?;
    headers.insert(header::SET_COOKIE, cookie);
    Ok((
        headers,
        Json(AuthResponse {
            token,
            user: PublicUser {
                id: user.id,
                email: user.email,
                username: user.username,
            },
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(HeaderMap, Json<AuthResponse>), AppError> {
    let Json(mut payload) = payload?;
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();
    validate_registration(&payload)?;

    let hash = hash_password(&payload.password)?;
    let Some(user) = User::create(&state.db, &payload.email, &payload.username, &hash).await? else {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    };

    info!(user_id = %user.id, "user registered");
    session(&JwtKeys::from_ref(&state), user)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(HeaderMap, Json<AuthResponse>), AppError> {
    let Json(mut payload) = payload?;
    payload.email = payload.email.trim().to_lowercase();
    if !is_valid_email(&payload.email) {
        return Err(AppError::Validation("Please provide a valid email address".into()));
    }

    let invalid = || AppError::Unauthorized("Invalid credentials".into());
    let Some(user) = User::find_by_email(&state.db, &payload.email).await? else {
        warn!(email = %payload.email, "login unknown email");
        return Err(invalid());
    };
    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    info!(user_id = %user.id, "user logged in");
    session(&JwtKeys::from_ref(&state), user)
}

/// Tokens are stateless, so logging out only clears the session cookie.
pub async fn logout() -> (HeaderMap, Json<MessageResponse>) {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static(CLEARED_SESSION_COOKIE),
    );
    (
        headers,
        Json(MessageResponse {
            message: "Logged out successfully".into(),
        }),
    )
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MeResponse>, AppError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    Ok(Json(MeResponse {
        user: PublicUser {
            id: user.id,
            email: user.email,
            username: user.username,
        },
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::fake::{FakeNutritionSource, MemoryStore};

    fn app() -> Router {
        auth_routes().with_state(AppState::fake(
            Arc::new(MemoryStore::default()),
            Arc::new(FakeNutritionSource::default()),
        ))
    }

    async fn send(req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let resp = app().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, headers, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    fn req(email: &str, username: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    #[test]
    fn email_shape_is_checked() {
        assert!(is_valid_email("someone@example.com"));
        assert!(!is_valid_email("someone@example"));
        assert!(!is_valid_email("some one@example.com"));
    }

    #[test]
    fn registration_rules() {
        assert!(validate_registration(&req("a@b.co", "al", "longenough")).is_ok());
        assert!(validate_registration(&req("a@b.co", "a", "longenough")).is_err());
        assert!(validate_registration(&req("a@b.co", "al", "short")).is_err());
        assert!(validate_registration(&req("nope", "al", "longenough")).is_err());
    }

    #[test]
    fn public_user_serialization() {
        let json = serde_json::to_string(&PublicUser {
            id: uuid::Uuid::new_v4(),
            email: "test@example.com".to_string(),
            username: "tester".to_string(),
        })
        .unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("\"username\":\"tester\""));
    }

    #[tokio::test]
    async fn logout_clears_the_session_cookie() {
        let (status, headers, body) = send(
            Request::post("/auth/logout").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().to_lowercase().contains("logged out"));
        let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("token=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn me_lives_under_auth_and_needs_a_token() {
        let (status, _, body) = send(Request::get("/auth/me").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().unwrap().contains("token"));
    }

    #[tokio::test]
    async fn malformed_register_body_is_400_json() {
        let (status, _, body) = send(
            Request::post("/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email":"a@b.co","username":"al"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("password"));
    }
}
