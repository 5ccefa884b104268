use crate::db::queries::requests::{
    approve_request, create_request, delete_request, get_request, list_requests, reject_request,
};
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

pub fn request_routes() -> Router<PgPool> {
    Router::new()
        .route("/requests", post(create_request).get(list_requests))
        .route("/requests/{id}", get(get_request).delete(delete_request))
        .route("/requests/{id}/approve", post(approve_request))
        .route("/requests/{id}/reject", post(reject_request))
}
