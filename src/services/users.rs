use crate::{
    auth::{password, AuthService, Role},
    db::{is_unique_violation, DbPool},
    entities::user::{self, Entity as UserEntity},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const DUPLICATE_USER: &str = "User with this email or username already exists";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Username is required"))]
    pub username: String,
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Public view of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<user::Model> for UserView {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            role: model.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub user: UserView,
}

/// Account registration, login and profile lookup
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    auth_service: Arc<AuthService>,
    admin_emails: Vec<String>,
}

impl UserService {
    /// `admin_emails` must already be lower-cased
    pub fn new(db_pool: Arc<DbPool>, auth_service: Arc<AuthService>, admin_emails: Vec<String>) -> Self {
        Self {
            db_pool,
            auth_service,
            admin_emails,
        }
    }

    fn role_for(&self, email: &str) -> Role {
        if self.admin_emails.iter().any(|e| e == email) {
            Role::Admin
        } else {
            Role::User
        }
    }

    fn issue(&self, message: &str, model: user::Model) -> Result<AuthResponse, ServiceError> {
        let token = self
            .auth_service
            .generate_token(model.id, &model.username, &model.email, model.role)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;
        Ok(AuthResponse {
            message: message.to_string(),
            token,
            user: model.into(),
        })
    }

    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, ServiceError> {
        request.validate()?;
        let username = request.username.trim().to_string();
        let email = request.email.trim().to_lowercase();
        let db = &*self.db_pool;

        let existing = UserEntity::find()
            .filter(
                Condition::any()
                    .add(user::Column::Email.eq(email.as_str()))
                    .add(user::Column::Username.eq(username.as_str())),
            )
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::BadRequest(DUPLICATE_USER.to_string()));
        }

        let password_hash = password::hash_password(&request.password)
            .map_err(|e| ServiceError::HashError(e.to_string()))?;
        let role = self.role_for(&email);

        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username),
            email: Set(email),
            password_hash: Set(password_hash),
            role: Set(role),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return ServiceError::BadRequest(DUPLICATE_USER.to_string());
            }
            error!(error = %e, "Failed to insert user");
            ServiceError::DatabaseError(e)
        })?;

        info!(user_id = %model.id, role = %model.role, "User registered");
        self.issue("User registered successfully", model)
    }

    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, ServiceError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();

        let model = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        if !password::verify_password(&request.password, &model.password_hash) {
            warn!(user_id = %model.id, "login with wrong password");
            return Err(ServiceError::Unauthorized("Invalid password".to_string()));
        }

        info!(user_id = %model.id, "User logged in");
        self.issue("Login successful", model)
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<ProfileResponse, ServiceError> {
        let model = UserEntity::find_by_id(user_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
        Ok(ProfileResponse { user: model.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthConfig;
    use std::time::Duration;

    async fn service() -> UserService {
        let db = crate::db::establish_connection_with_config(&crate::db::DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        crate::db::run_migrations(&db).await.unwrap();
        let auth = AuthService::new(AuthConfig::new(
            "users_test_secret_value_long_enough_for_hs256".into(),
            Duration::from_secs(86400),
        ));
        UserService::new(Arc::new(db), Arc::new(auth), vec!["boss@books.io".into()])
    }

    fn register(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: "hunter22".into(),
        }
    }

    #[tokio::test]
    async fn register_assigns_role_from_allow_list() {
        let svc = service().await;
        let reader = svc.register(register("reader", "Reader@Books.io")).await.unwrap();
        let boss = svc.register(register("boss", "BOSS@books.io")).await.unwrap();

        assert_eq!(reader.user.role, Role::User);
        assert_eq!(reader.user.email, "reader@books.io");
        assert_eq!(boss.user.role, Role::Admin);
        assert_eq!(reader.message, "User registered successfully");
    }

    #[tokio::test]
    async fn duplicate_email_is_case_insensitive() {
        let svc = service().await;
        svc.register(register("one", "dup@books.io")).await.unwrap();
        let err = svc.register(register("two", "DUP@books.io")).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.response_message(), DUPLICATE_USER);

        let err = svc.register(register("one", "other@books.io")).await.unwrap_err();
        assert_eq!(err.response_message(), DUPLICATE_USER);
    }

    #[tokio::test]
    async fn login_distinguishes_unknown_user_and_bad_password() {
        let svc = service().await;
        svc.register(register("reader", "reader@books.io")).await.unwrap();

        let ok = svc
            .login(LoginRequest {
                email: "READER@books.io".into(),
                password: "hunter22".into(),
            })
            .await
            .unwrap();
        assert_eq!(ok.message, "Login successful");

        let wrong = svc
            .login(LoginRequest {
                email: "reader@books.io".into(),
                password: "nope".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(wrong.status_code(), axum::http::StatusCode::UNAUTHORIZED);

        let missing = svc
            .login(LoginRequest {
                email: "ghost@books.io".into(),
                password: "hunter22".into(),
            })
            .await
            .unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn profile_never_exposes_the_hash() {
        let svc = service().await;
        let registered = svc.register(register("reader", "reader@books.io")).await.unwrap();
        let profile = svc.profile(registered.user.id).await.unwrap();
        let json = serde_json::to_value(&profile).unwrap();

        assert_eq!(json["user"]["username"], "reader");
        assert!(json["user"].get("password_hash").is_none());
        assert!(svc.profile(Uuid::new_v4()).await.unwrap_err().is_not_found());
    }
}
