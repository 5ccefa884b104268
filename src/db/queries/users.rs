use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use sqlx::PgPool;
use utoipa::{OpenApi, ToSchema};

use crate::db::models::user::{Role, User};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::utils::api_response::ApiResponse;

#[derive(OpenApi)]
#[openapi(
    paths(list_users, get_user),
    components(schemas(User, Role, UserListFilter)),
    tags((name = "Users", description = "Account administration"))
)]
pub struct UserDoc;

const USER_COLUMNS: &str =
    "id, name, email, cpf, phone, password_hash, role, active, created_at, updated_at, deleted_at";

/// Looks up an account that can still authenticate: active and not
/// soft-deleted. Used by the auth-context middleware.
pub async fn find_active_user(pool: &PgPool, user_id: i32) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND active = TRUE AND deleted_at IS NULL"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Resolves an owner reference supplied by an admin: the account must exist,
/// be active, and carry the expected role.
pub async fn find_active_user_with_role(
    pool: &PgPool,
    user_id: i32,
    role: Role,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users \
         WHERE id = $1 AND role = $2 AND active = TRUE AND deleted_at IS NULL"
    ))
    .bind(user_id)
    .bind(role)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn email_or_cpf_taken(pool: &PgPool, email: &str, cpf: &str) -> Result<bool, AppError> {
    let taken: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 OR cpf = $2)")
            .bind(email)
            .bind(cpf)
            .fetch_one(pool)
            .await?;
    Ok(taken)
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct UserListFilter {
    /// One of `student`, `teacher`, `admin`
    pub role: Option<String>,
}

#[utoipa::path(
    get,
    path = "/users",
    params(("role" = Option<String>, Query, description = "Filter by role")),
    responses(
        (status = 200, description = "List of accounts", body = Vec<User>),
        (status = 403, description = "Caller is not an admin")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn list_users(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<AuthContext>,
    Query(filter): Query<UserListFilter>,
) -> Result<ApiResponse<Vec<User>>, AppError> {
    ctx.require_admin()?;

    let role = match filter.role.as_deref() {
        Some(value) => Some(
            Role::parse(value)
                .ok_or_else(|| AppError::validation(format!("Unknown role filter `{value}`")))?,
        ),
        None => None,
    };

    let mut qb = sqlx::QueryBuilder::new(format!(
        "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL"
    ));
    if let Some(role) = role {
        qb.push(" AND role = ").push_bind(role);
    }
    qb.push(" ORDER BY name");

    let users = qb.build_query_as::<User>().fetch_all(&pool).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Users retrieved", users))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}",
    params(("user_id" = i32, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Account retrieved", body = User),
        (status = 403, description = "Not visible to caller"),
        (status = 404, description = "Account not found")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn get_user(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<AuthContext>,
    Path(user_id): Path<i32>,
) -> Result<ApiResponse<User>, AppError> {
    // Owner-type callers may only fetch themselves.
    if !ctx.is_admin() && ctx.user_id != user_id {
        return Err(AppError::forbidden("You may only view your own account"));
    }

    let user = find_active_user(&pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Account not found"))?;
    Ok(ApiResponse::success(StatusCode::OK, "Account retrieved", user))
}
