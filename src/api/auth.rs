use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use bcrypt::{hash, verify, DEFAULT_COST};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};
use utoipa::{OpenApi, ToSchema};

use crate::config::Config;
use crate::db::models::user::{NewUser, Role, User};
use crate::db::queries::users;
use crate::error::AppError;
use crate::utils::api_response::ApiResponse;
use crate::utils::br;

#[derive(OpenApi)]
#[openapi(
    paths(register, login),
    components(schemas(NewUser, LoginRequest, LoginResponse)),
    tags((name = "Authentication", description = "Account registration and login"))
)]
pub struct AuthDoc;

/// JWT Claims used for authentication.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject - User ID as String
    pub sub: String,
    /// The display name of the authenticated user.
    pub name: String,
    /// The role assigned to the user
    pub role: String,
    /// Expiration timestamp (UNIX TIME)
    pub exp: usize,
}

impl Claims {
    /// Converts `sub` (user ID) to `i32`, or returns a descriptive error.
    pub fn user_id(&self) -> Result<i32, AppError> {
        self.sub
            .parse::<i32>()
            .map_err(|_| AppError::Unauthorized("Invalid user ID format in token".into()))
    }

    /// Synthetic claims injected when `AUTH_DISABLED=true`.
    pub fn development() -> Self {
        Claims {
            sub: "1".to_string(),
            name: "dev".to_string(),
            role: "admin".to_string(),
            exp: usize::MAX,
        }
    }
}

pub fn auth_routes() -> Router<PgPool> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Represents a request to log in.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Represents a successful login response returning a JWT token.
#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
}

fn validate_registration(payload: &NewUser) -> Result<(), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::validation("Name must not be empty"));
    }
    if !payload.email.contains('@') {
        return Err(AppError::validation("Email address is malformed"));
    }
    if !br::validate_cpf(&payload.cpf) {
        return Err(AppError::validation("CPF is invalid"));
    }
    if let Some(phone) = &payload.phone {
        if !br::validate_phone(phone) {
            return Err(AppError::validation("Phone number is invalid"));
        }
    }
    if payload.password.len() < 8 {
        return Err(AppError::validation("Password must be at least 8 characters"));
    }
    if payload.role == Role::Admin {
        // Admin accounts are provisioned directly, never self-registered.
        return Err(AppError::validation("Cannot self-register an admin account"));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = NewUser,
    responses(
        (status = 201, description = "Account created", body = User),
        (status = 400, description = "Invalid registration data"),
        (status = 409, description = "Email or CPF already registered")
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(pool): State<PgPool>,
    Json(payload): Json<NewUser>,
) -> Result<ApiResponse<User>, AppError> {
    validate_registration(&payload)?;

    let cpf = br::unformat_cpf(&payload.cpf);
    if users::email_or_cpf_taken(&pool, &payload.email, &cpf).await? {
        return Err(AppError::conflict("Email or CPF is already registered"));
    }

    let password_hash = hash(&payload.password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("hashing password: {e}")))?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (name, email, cpf, phone, password_hash, role) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id, name, email, cpf, phone, password_hash, role, active, \
                   created_at, updated_at, deleted_at",
    )
    .bind(payload.name.trim())
    .bind(&payload.email)
    .bind(&cpf)
    .bind(&payload.phone)
    .bind(&password_hash)
    .bind(payload.role)
    .fetch_one(&pool)
    .await?;

    info!(user_id = user.id, role = user.role.as_str(), "account registered");
    Ok(ApiResponse::success(StatusCode::CREATED, "Account created", user))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Successful login", body = LoginResponse),
        (status = 401, description = "Invalid email or password")
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(pool): State<PgPool>,
    Json(payload): Json<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, cpf, phone, password_hash, role, active, \
                created_at, updated_at, deleted_at \
         FROM users WHERE email = $1 AND active = TRUE AND deleted_at IS NULL",
    )
    .bind(&payload.email)
    .fetch_optional(&pool)
    .await?;

    let Some(user) = user else {
        warn!(email = %payload.email, "login attempt for unknown or inactive account");
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    };

    let valid = verify(&payload.password, &user.password_hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("verifying password: {e}")))?;
    if !valid {
        warn!(user_id = user.id, "login attempt with wrong password");
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    }

    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(24))
        .map(|t| t.timestamp() as usize)
        .unwrap_or(usize::MAX);
    let claims = Claims {
        sub: user.id.to_string(),
        name: user.name.clone(),
        role: user.role.as_str().to_string(),
        exp: expiration,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(Config::get().jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("signing token: {e}")))?;

    info!(user_id = user.id, "login succeeded");
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Login successful",
        LoginResponse {
            token,
            role: user.role,
        },
    ))
}
