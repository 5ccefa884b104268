use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::PgPool;
use utoipa::OpenApi;

use crate::db::models::catalog::{DocumentType, NewCatalogItem, RequestType};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::utils::api_response::ApiResponse;

#[derive(OpenApi)]
#[openapi(
    paths(list_request_types, create_request_type, list_document_types, create_document_type),
    components(schemas(RequestType, DocumentType, NewCatalogItem)),
    tags((name = "Catalog", description = "Request and document type catalogs"))
)]
pub struct TypeDoc;

pub async fn request_type_exists(pool: &PgPool, id: i32) -> Result<bool, AppError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM request_types WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

pub async fn document_type_exists(pool: &PgPool, id: i32) -> Result<bool, AppError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM document_types WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

fn validate_name(item: &NewCatalogItem) -> Result<(), AppError> {
    if item.name.trim().is_empty() {
        return Err(AppError::validation("Name must not be empty"));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/request-types",
    responses((status = 200, description = "Available request types", body = Vec<RequestType>)),
    tag = "Catalog",
    security(("bearerAuth" = []))
)]
pub async fn list_request_types(
    State(pool): State<PgPool>,
) -> Result<ApiResponse<Vec<RequestType>>, AppError> {
    let types = sqlx::query_as::<_, RequestType>(
        "SELECT id, name, description, created_at FROM request_types ORDER BY name",
    )
    .fetch_all(&pool)
    .await?;
    Ok(ApiResponse::success(StatusCode::OK, "Request types retrieved", types))
}

#[utoipa::path(
    post,
    path = "/request-types",
    request_body = NewCatalogItem,
    responses(
        (status = 201, description = "Request type created", body = RequestType),
        (status = 403, description = "Caller is not an admin")
    ),
    tag = "Catalog",
    security(("bearerAuth" = []))
)]
pub async fn create_request_type(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<NewCatalogItem>,
) -> Result<ApiResponse<RequestType>, AppError> {
    ctx.require_admin()?;
    validate_name(&payload)?;

    let created = sqlx::query_as::<_, RequestType>(
        "INSERT INTO request_types (name, description) VALUES ($1, $2) \
         RETURNING id, name, description, created_at",
    )
    .bind(payload.name.trim())
    .bind(payload.description)
    .fetch_one(&pool)
    .await?;
    Ok(ApiResponse::success(StatusCode::CREATED, "Request type created", created))
}

#[utoipa::path(
    get,
    path = "/document-types",
    responses((status = 200, description = "Available document types", body = Vec<DocumentType>)),
    tag = "Catalog",
    security(("bearerAuth" = []))
)]
pub async fn list_document_types(
    State(pool): State<PgPool>,
) -> Result<ApiResponse<Vec<DocumentType>>, AppError> {
    let types = sqlx::query_as::<_, DocumentType>(
        "SELECT id, name, description, created_at FROM document_types ORDER BY name",
    )
    .fetch_all(&pool)
    .await?;
    Ok(ApiResponse::success(StatusCode::OK, "Document types retrieved", types))
}

#[utoipa::path(
    post,
    path = "/document-types",
    request_body = NewCatalogItem,
    responses(
        (status = 201, description = "Document type created", body = DocumentType),
        (status = 403, description = "Caller is not an admin")
    ),
    tag = "Catalog",
    security(("bearerAuth" = []))
)]
pub async fn create_document_type(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<NewCatalogItem>,
) -> Result<ApiResponse<DocumentType>, AppError> {
    ctx.require_admin()?;
    validate_name(&payload)?;

    let created = sqlx::query_as::<_, DocumentType>(
        "INSERT INTO document_types (name, description) VALUES ($1, $2) \
         RETURNING id, name, description, created_at",
    )
    .bind(payload.name.trim())
    .bind(payload.description)
    .fetch_one(&pool)
    .await?;
    Ok(ApiResponse::success(StatusCode::CREATED, "Document type created", created))
}
