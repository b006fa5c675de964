/*!
 * # Authentication and Authorization Module
 *
 * Bearer-token authentication for the bookstore API.
 *
 * - HS256 JSON Web Tokens carrying `{id, username, email, role}`
 * - `auth_middleware` validates the token and stores an [`AuthUser`] in the
 *   request extensions
 * - `role_middleware` gates admin-only routes
 *
 * A missing token is reported as 401. Any invalid, tampered or expired token
 * is reported as 403 with the same message so callers cannot tell why.
 */

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::errors::ErrorResponse;

pub mod password;

pub use crate::entities::user::UserRole as Role;

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn has_role(&self, role: Role) -> bool {
        // admins pass every role gate
        self.role == role || self.role == Role::Admin
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: Uuid::parse_str(&claims.id).map_err(|_| AuthError::InvalidToken)?,
            username: claims.username,
            email: claims.email,
            role: claims.role,
        })
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, token_expiration: Duration) -> Self {
        Self {
            jwt_secret,
            token_expiration,
        }
    }
}

/// Issues and validates bearer tokens
#[derive(Debug, Clone)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn token_lifetime(&self) -> Duration {
        self.config.token_expiration
    }

    /// Generate a signed token for an account
    pub fn generate_token(
        &self,
        user_id: Uuid,
        username: &str,
        email: &str,
        role: Role,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.token_expiration)
                .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;

        let claims = Claims {
            id: user_id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        self.encode_claims(&claims)
    }

    pub(crate) fn encode_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(reason = ?e.kind(), "token rejected");
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            }
        })
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Insufficient permissions, {0} role required")]
    InsufficientPermissions(Role),

    #[error("Authentication service not available")]
    ServiceUnavailable,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingToken => StatusCode::UNAUTHORIZED,
            Self::InvalidToken | Self::TokenExpired | Self::InsufficientPermissions(_) => {
                StatusCode::FORBIDDEN
            }
            Self::TokenCreation(_) | Self::ServiceUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn response_message(&self) -> &'static str {
        match self {
            Self::MissingToken => "Access Denied. No token provided",
            // expiry and tampering look the same from outside
            Self::InvalidToken | Self::TokenExpired => "Invalid token",
            Self::InsufficientPermissions(Role::Admin) => "Access Denied. Admins only",
            Self::InsufficientPermissions(Role::User) => "Access Denied. Valid user role required",
            Self::TokenCreation(_) | Self::ServiceUnavailable => "Internal server error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "authentication failure");
        }
        (
            status,
            Json(ErrorResponse::new(status, self.response_message())),
        )
            .into_response()
    }
}

/// Role middleware to check if a user has the required role
pub async fn role_middleware(
    State(required_role): State<Role>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingToken)?;

    if !user.has_role(required_role) {
        debug!(user_id = %user.user_id, role = %user.role, required = %required_role, "role check failed");
        return Err(AuthError::InsufficientPermissions(required_role));
    }

    Ok(next.run(request).await)
}

/// Authentication middleware that extracts and validates bearer tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => return AuthError::ServiceUnavailable.into_response(),
    };

    match extract_auth_from_headers(request.headers(), &auth_service) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)?;

    let claims = auth_service.validate_token(token)?;
    AuthUser::try_from(claims)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_role(self, role: Role) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_role(self, role: Role) -> Self {
        self.layer(axum::middleware::from_fn_with_state(role, role_middleware))
            .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Extension, Router};
    use tower::ServiceExt;

    const SECRET: &str = "unit_test_signing_secret_that_is_long_enough";

    fn service() -> Arc<AuthService> {
        Arc::new(AuthService::new(AuthConfig::new(
            SECRET.to_string(),
            Duration::from_secs(3600),
        )))
    }

    async fn whoami(user: AuthUser) -> String {
        format!("{}:{}", user.username, user.role)
    }

    fn app(role: Option<Role>) -> Router {
        let router = Router::new().route("/", get(whoami));
        let router = match role {
            Some(role) => router.with_role(role),
            None => router.with_auth(),
        };
        router.layer(Extension(service()))
    }

    async fn call(app: Router, token: Option<&str>) -> StatusCode {
        let mut builder = axum::http::Request::builder().uri("/");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[test]
    fn token_round_trips_claims() {
        let svc = service();
        let id = Uuid::new_v4();
        let token = svc
            .generate_token(id, "reader", "reader@books.io", Role::User)
            .unwrap();
        let claims = svc.validate_token(&token).unwrap();

        assert_eq!(claims.id, id.to_string());
        assert_eq!(claims.username, "reader");
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let other = AuthService::new(AuthConfig::new(
            "a_completely_different_secret_value_here".into(),
            Duration::from_secs(3600),
        ));
        let token = other
            .generate_token(Uuid::new_v4(), "x", "x@books.io", Role::Admin)
            .unwrap();
        assert!(matches!(
            service().validate_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let svc = service();
        let now = Utc::now().timestamp();
        let token = svc
            .encode_claims(&Claims {
                id: Uuid::new_v4().to_string(),
                username: "late".into(),
                email: "late@books.io".into(),
                role: Role::User,
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();
        assert!(matches!(
            svc.validate_token(&token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn missing_token_is_401_and_bad_token_is_403() {
        assert_eq!(call(app(None), None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            call(app(None), Some("not.a.jwt")).await,
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn role_gate_admits_admins_only() {
        let svc = service();
        let user = svc
            .generate_token(Uuid::new_v4(), "u", "u@books.io", Role::User)
            .unwrap();
        let admin = svc
            .generate_token(Uuid::new_v4(), "a", "a@books.io", Role::Admin)
            .unwrap();

        assert_eq!(
            call(app(Some(Role::Admin)), Some(&user)).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            call(app(Some(Role::Admin)), Some(&admin)).await,
            StatusCode::OK
        );
        assert_eq!(call(app(Some(Role::User)), Some(&admin)).await, StatusCode::OK);
    }
}
