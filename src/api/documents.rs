use crate::db::queries::documents::{
    approve_document, delete_document, download_document, get_document, list_documents,
    reject_document, upload_document,
};
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

pub fn document_routes() -> Router<PgPool> {
    Router::new()
        .route("/documents", post(upload_document).get(list_documents))
        .route("/documents/{id}", get(get_document).delete(delete_document))
        .route("/documents/{id}/file", get(download_document))
        .route("/documents/{id}/approve", post(approve_document))
        .route("/documents/{id}/reject", post(reject_document))
}
