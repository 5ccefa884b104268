use crate::db::queries::types::{
    create_document_type, create_request_type, list_document_types, list_request_types,
};
use axum::{routing::get, Router};
use sqlx::PgPool;

pub fn type_routes() -> Router<PgPool> {
    Router::new()
        .route("/request-types", get(list_request_types).post(create_request_type))
        .route("/document-types", get(list_document_types).post(create_document_type))
}
