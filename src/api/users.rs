use crate::db::queries::users::{get_user, list_users};
use axum::{routing::get, Router};
use sqlx::PgPool;

pub fn user_routes() -> Router<PgPool> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}", get(get_user))
}
