//! Token issuance for players and HTTP Basic Auth for admin routes.
//!
//! Players register once and get an opaque bearer token; there are no
//! passwords or roles here. Admin routes are protected with Basic Auth
//! configured through ADMIN_USERNAME / ADMIN_PASSWORD.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request, Response, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Json,
};
use base64::Engine;
use rand::Rng;
use serde_json::json;
use tokio::sync::RwLock;

use crate::api::AppState;
use crate::types::{User, UserId};

/// Unambiguous character set for tokens (no 0/O, 1/I/L)
const TOKEN_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const TOKEN_LENGTH: usize = 12;

fn generate_token() -> String {
    let mut rng = rand::rng();
    (0..TOKEN_LENGTH)
        .map(|_| TOKEN_CHARS[rng.random_range(0..TOKEN_CHARS.len())] as char)
        .collect()
}

#[derive(Default)]
pub struct UserRegistry {
    users: RwLock<HashMap<UserId, User>>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a user with a fresh collision-checked token.
    pub async fn register(&self, display_name: &str) -> User {
        let mut users = self.users.write().await;
        let token = loop {
            let candidate = generate_token();
            if !users.values().any(|u| u.token == candidate) {
                break candidate;
            }
        };
        let user = User {
            id: ulid::Ulid::new().to_string(),
            token,
            display_name: display_name.to_string(),
        };
        users.insert(user.id.clone(), user.clone());
        user
    }

    pub async fn get_by_token(&self, token: &str) -> Option<User> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.token == token)
            .cloned()
    }
}

/// Extractor for the authenticated caller, resolved from
/// `Authorization: Bearer <token>`.
pub struct AuthedUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthedUser {
    type Rejection = Response<Body>;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);

        if let Some(token) = token {
            if let Some(user) = state.users.get_by_token(token).await {
                return Ok(AuthedUser(user));
            }
        }
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "missing or invalid token" })),
        )
            .into_response())
    }
}

/// Admin credentials for maintenance routes
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// None disables the admin surface entirely
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AdminConfig {
    /// ADMIN_USERNAME and ADMIN_PASSWORD must both be set to enable the
    /// admin routes.
    pub fn from_env() -> Self {
        let username = std::env::var("ADMIN_USERNAME")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let password = std::env::var("ADMIN_PASSWORD")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if username.is_some() && password.is_some() {
            tracing::info!("admin routes enabled");
        } else {
            if username.is_some() || password.is_some() {
                tracing::warn!("ADMIN_USERNAME and ADMIN_PASSWORD must both be set");
            }
            tracing::warn!("admin routes DISABLED (no credentials configured)");
        }
        Self { username, password }
    }

    pub fn is_enabled(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    pub fn validate(&self, username: &str, password: &str) -> bool {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => {
                constant_time_eq(u.as_bytes(), username.as_bytes())
                    && constant_time_eq(p.as_bytes(), password.as_bytes())
            }
            _ => false,
        }
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Middleware for HTTP Basic Authentication on admin routes.
/// With no credentials configured every request is rejected.
pub async fn admin_auth_middleware(
    State(config): State<Arc<AdminConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if config.is_enabled() {
        if let Some(auth_header) = request.headers().get(header::AUTHORIZATION) {
            if let Ok(auth_str) = auth_header.to_str() {
                if let Some(credentials) = auth_str.strip_prefix("Basic ") {
                    if let Ok(decoded) =
                        base64::engine::general_purpose::STANDARD.decode(credentials.trim())
                    {
                        if let Ok(decoded_str) = String::from_utf8(decoded) {
                            if let Some((username, password)) = decoded_str.split_once(':') {
                                if config.validate(username, password) {
                                    return next.run(request).await;
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(header::WWW_AUTHENTICATE, "Basic realm=\"Admin\"")
        .body(Body::from("Unauthorized"))
        .unwrap()
}
