use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Extension, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use moka::sync::Cache;
use serde::Serialize;
use sqlx::PgPool;
use tracing::error;

use crate::api::auth::Claims;
use crate::config::Config;
use crate::db::models::user::Role;
use crate::db::queries::users;
use crate::error::AppError;

/// ✅ Per-user auth context cache (TTL) so every request does not hit `users`
pub type AuthContextCache = Arc<Cache<i32, AuthContext>>;

pub fn create_auth_context_cache() -> AuthContextCache {
    Arc::new(
        Cache::builder()
            .time_to_live(Duration::from_secs(600)) // TTL = 10 minutes
            .build(),
    )
}

/// Identity attached to every authenticated request. The role comes from the
/// `users` table, not from the token, so demotions take effect within the
/// cache TTL rather than at token expiry.
#[derive(Debug, Clone, Serialize)]
pub struct AuthContext {
    pub user_id: i32,
    pub role: Role,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("This operation requires an admin role"))
        }
    }
}

/// ✅ **JWT Middleware** (Handles Token Authentication)
pub async fn jwt_middleware(mut req: Request<Body>, next: Next) -> Result<Response, Response> {
    // Local development escape hatch.
    if Config::auth_disabled() {
        req.extensions_mut().insert(Claims::development());
        return Ok(next.run(req).await);
    }

    let auth_header = req.headers().get("Authorization").ok_or_else(|| {
        AppError::Unauthorized("Missing Authorization header".into()).into_response()
    })?;

    let token_str = auth_header.to_str().map_err(|_| {
        AppError::Unauthorized("Invalid Authorization header format".into()).into_response()
    })?;

    let token = token_str.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Unauthorized("Invalid token format (missing 'Bearer ' prefix)".into())
            .into_response()
    })?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(Config::get().jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "JWT validation failed");
        AppError::Unauthorized("Invalid token".into()).into_response()
    })?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

/// Resolves the token's subject to an active account and attaches an
/// [`AuthContext`], going through the `moka` cache first.
pub async fn auth_context_middleware(
    State(pool): State<PgPool>,
    Extension(cache): Extension<AuthContextCache>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let claims = req.extensions().get::<Claims>().cloned().ok_or_else(|| {
        AppError::Unauthorized("Missing JWT claims in request".into()).into_response()
    })?;

    let user_id = claims.user_id().map_err(|e| e.into_response())?;

    if let Some(ctx) = cache.get(&user_id) {
        req.extensions_mut().insert(ctx);
        return Ok(next.run(req).await);
    }

    let user = users::find_active_user(&pool, user_id)
        .await
        .map_err(|e| {
            error!(user_id, error = %e, "failed to load auth context");
            e.into_response()
        })?
        .ok_or_else(|| {
            AppError::Unauthorized("Account is missing or deactivated".into()).into_response()
        })?;

    let ctx = AuthContext {
        user_id: user.id,
        role: user.role,
    };
    cache.insert(user_id, ctx.clone());
    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}
