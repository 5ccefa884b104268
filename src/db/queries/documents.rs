use std::path::{Path as FsPath, PathBuf};

use axum::body::Body;
use axum::extract::{Extension, Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use sqlx::PgPool;
use tokio_util::io::ReaderStream;
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::config::Config;
use crate::db::models::document::{Document, DocumentFilter};
use crate::db::models::review::{ReviewAction, ReviewDecision, ReviewStatus};
use crate::db::models::user::Role;
use crate::db::queries::{types, users};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::utils::api_response::ApiResponse;

#[derive(OpenApi)]
#[openapi(
    paths(upload_document, list_documents, get_document, download_document,
          approve_document, reject_document, delete_document),
    components(schemas(Document, DocumentFilter, ReviewDecision, ReviewStatus)),
    tags((name = "Documents", description = "Document uploads and their review workflow"))
)]
pub struct DocumentDoc;

const DOCUMENT_COLUMNS: &str = "id, user_id, document_type_id, file_path, original_name, \
     size_bytes, status, reviewed_by, review_notes, created_at, updated_at, deleted_at";

/// Who an upload may belong to, decided purely from the caller's role.
#[derive(Debug, PartialEq, Eq)]
enum OwnerDecision {
    Caller,
    /// An admin named an owner; the id still needs an existence check.
    LookupOwner(i32),
}

/// Students and teachers own their own uploads; admins upload on behalf of a
/// named student or teacher.
fn owner_for(
    role: Role,
    caller_id: i32,
    requested: Option<i32>,
) -> Result<OwnerDecision, AppError> {
    match role {
        Role::Student | Role::Teacher => match requested {
            None => Ok(OwnerDecision::Caller),
            Some(id) if id == caller_id => Ok(OwnerDecision::Caller),
            Some(_) => Err(AppError::forbidden(
                "You may only upload documents for yourself",
            )),
        },
        Role::Admin => requested.map(OwnerDecision::LookupOwner).ok_or_else(|| {
            AppError::validation("user_id is required when an admin uploads a document")
        }),
    }
}

async fn resolve_owner(
    pool: &PgPool,
    ctx: &AuthContext,
    requested_owner: Option<i32>,
) -> Result<i32, AppError> {
    match owner_for(ctx.role, ctx.user_id, requested_owner)? {
        OwnerDecision::Caller => Ok(ctx.user_id),
        OwnerDecision::LookupOwner(owner_id) => {
            let owner = users::find_active_user(pool, owner_id)
                .await?
                .ok_or_else(|| AppError::not_found("Document owner not found"))?;
            if owner.role == Role::Admin {
                return Err(AppError::validation("Documents belong to students or teachers"));
            }
            Ok(owner_id)
        }
    }
}

/// Maps the zero-rows outcome of the conditional review update: the record is
/// either gone (or soft-deleted) or already sits in a terminal state.
fn review_rejection(current: Option<ReviewStatus>) -> AppError {
    match current {
        None => AppError::not_found("Document not found"),
        Some(current) if !current.can_review() => AppError::conflict(format!(
            "Document is already {}, only pending documents can be reviewed",
            current.as_str()
        )),
        Some(_) => AppError::conflict("Document changed during review, try again"),
    }
}

struct UploadFields {
    document_type_id: Option<i32>,
    user_id: Option<i32>,
    original_name: Option<String>,
    bytes: Option<Vec<u8>>,
}

async fn read_multipart(mut multipart: Multipart) -> Result<UploadFields, AppError> {
    let mut fields = UploadFields {
        document_type_id: None,
        user_id: None,
        original_name: None,
        bytes: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Malformed multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "document_type_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::validation(format!("Bad document_type_id field: {e}")))?;
                fields.document_type_id = Some(text.trim().parse().map_err(|_| {
                    AppError::validation("document_type_id must be an integer")
                })?);
            }
            "user_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::validation(format!("Bad user_id field: {e}")))?;
                fields.user_id = Some(
                    text.trim()
                        .parse()
                        .map_err(|_| AppError::validation("user_id must be an integer"))?,
                );
            }
            "file" => {
                fields.original_name = field.file_name().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::validation(format!("Failed to read file field: {e}")))?;
                fields.bytes = Some(data.to_vec());
            }
            _ => {}
        }
    }
    Ok(fields)
}

/// Writes the upload into the temp directory first, then moves it into the
/// document storage root. An upload that dies halfway leaves only a staged
/// file behind, which the `temp_cleanup` job reclaims.
async fn stage_upload(
    temp_root: &FsPath,
    storage_root: &FsPath,
    stored_name: &str,
    bytes: &[u8],
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(temp_root).await?;
    tokio::fs::create_dir_all(storage_root).await?;

    let staged = temp_root.join(stored_name);
    tokio::fs::write(&staged, bytes).await?;

    let stored = storage_root.join(stored_name);
    // Rename does not work across filesystems; fall back to copy + remove.
    if tokio::fs::rename(&staged, &stored).await.is_err() {
        tokio::fs::copy(&staged, &stored).await?;
        let _ = tokio::fs::remove_file(&staged).await;
    }
    Ok(stored)
}

#[utoipa::path(
    post,
    path = "/documents",
    responses(
        (status = 201, description = "Document uploaded and pending review", body = Document),
        (status = 400, description = "Missing file or unknown document type"),
        (status = 403, description = "Caller may not upload for that owner"),
        (status = 404, description = "Named owner does not exist")
    ),
    tag = "Documents",
    security(("bearerAuth" = []))
)]
pub async fn upload_document(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<AuthContext>,
    multipart: Multipart,
) -> Result<ApiResponse<Document>, AppError> {
    let fields = read_multipart(multipart).await?;

    let document_type_id = fields
        .document_type_id
        .ok_or_else(|| AppError::validation("document_type_id is required"))?;
    if !types::document_type_exists(&pool, document_type_id).await? {
        return Err(AppError::validation(format!("Unknown document type {document_type_id}")));
    }

    let bytes = fields
        .bytes
        .ok_or_else(|| AppError::validation("A `file` part is required"))?;
    if bytes.is_empty() {
        return Err(AppError::validation("Uploaded file is empty"));
    }
    let original_name = fields
        .original_name
        .unwrap_or_else(|| "document".to_string());

    let owner_id = resolve_owner(&pool, &ctx, fields.user_id).await?;

    // Stored name is generated; the original name survives only as metadata.
    let extension = FsPath::new(&original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    let stored_name = format!("{}{}", Uuid::new_v4(), extension);

    let config = Config::get();
    stage_upload(
        &config.temp_storage_path,
        &config.document_storage_path,
        &stored_name,
        &bytes,
    )
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("storing uploaded file: {e}")))?;

    let created = sqlx::query_as::<_, Document>(&format!(
        "INSERT INTO documents (user_id, document_type_id, file_path, original_name, size_bytes) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {DOCUMENT_COLUMNS}"
    ))
    .bind(owner_id)
    .bind(document_type_id)
    .bind(&stored_name)
    .bind(&original_name)
    .bind(bytes.len() as i64)
    .fetch_one(&pool)
    .await?;

    info!(
        document_id = created.id,
        owner_id,
        actor = ctx.user_id,
        size_bytes = created.size_bytes,
        "document uploaded"
    );
    Ok(ApiResponse::success(StatusCode::CREATED, "Document uploaded", created))
}

#[utoipa::path(
    get,
    path = "/documents",
    params(
        ("user_id" = Option<i32>, Query, description = "Admin-only owner filter"),
        ("status" = Option<String>, Query, description = "pending | approved | rejected")
    ),
    responses(
        (status = 200, description = "Documents visible to the caller", body = Vec<Document>),
        (status = 400, description = "Unknown status filter")
    ),
    tag = "Documents",
    security(("bearerAuth" = []))
)]
pub async fn list_documents(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<AuthContext>,
    Query(filter): Query<DocumentFilter>,
) -> Result<ApiResponse<Vec<Document>>, AppError> {
    let status = match filter.status.as_deref() {
        Some(value) => Some(ReviewStatus::parse(value).ok_or_else(|| {
            AppError::validation(format!("Unknown status filter `{value}`"))
        })?),
        None => None,
    };

    let mut qb = sqlx::QueryBuilder::new(format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE deleted_at IS NULL"
    ));
    if ctx.is_admin() {
        if let Some(user_id) = filter.user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
    } else {
        qb.push(" AND user_id = ").push_bind(ctx.user_id);
    }
    if let Some(status) = status {
        qb.push(" AND status = ").push_bind(status);
    }
    qb.push(" ORDER BY created_at DESC");

    let documents = qb.build_query_as::<Document>().fetch_all(&pool).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Documents retrieved", documents))
}

async fn fetch_visible_document(
    pool: &PgPool,
    ctx: &AuthContext,
    document_id: i32,
) -> Result<Document, AppError> {
    let document = sqlx::query_as::<_, Document>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(document_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Document not found"))?;

    if !ctx.is_admin() && document.user_id != ctx.user_id {
        return Err(AppError::forbidden("You may only access your own documents"));
    }
    Ok(document)
}

#[utoipa::path(
    get,
    path = "/documents/{document_id}",
    params(("document_id" = i32, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document metadata", body = Document),
        (status = 403, description = "Exists but is not visible to the caller"),
        (status = 404, description = "Absent or soft-deleted")
    ),
    tag = "Documents",
    security(("bearerAuth" = []))
)]
pub async fn get_document(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<AuthContext>,
    Path(document_id): Path<i32>,
) -> Result<ApiResponse<Document>, AppError> {
    let document = fetch_visible_document(&pool, &ctx, document_id).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Document retrieved", document))
}

#[utoipa::path(
    get,
    path = "/documents/{document_id}/file",
    params(("document_id" = i32, Path, description = "Document ID")),
    responses(
        (status = 200, description = "File contents"),
        (status = 403, description = "Not visible to caller"),
        (status = 404, description = "Document or file missing")
    ),
    tag = "Documents",
    security(("bearerAuth" = []))
)]
pub async fn download_document(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<AuthContext>,
    Path(document_id): Path<i32>,
) -> Result<Response, AppError> {
    let document = fetch_visible_document(&pool, &ctx, document_id).await?;

    let path = Config::get().document_storage_path.join(&document.file_path);
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| AppError::not_found("Stored file is missing"))?;

    let stream = ReaderStream::new(file);
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", document.original_name),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("building file response: {e}")))?;
    Ok(response)
}

/// Same conditional-update pattern as the request workflow: only a row still
/// in `pending` is affected, so a double review conflicts instead of
/// silently overwriting.
pub async fn review_document(
    pool: &PgPool,
    ctx: &AuthContext,
    document_id: i32,
    action: ReviewAction,
    notes: Option<String>,
) -> Result<Document, AppError> {
    ctx.require_admin()?;

    let updated = sqlx::query_as::<_, Document>(&format!(
        "UPDATE documents SET status = $1, reviewed_by = $2, review_notes = $3, updated_at = NOW() \
         WHERE id = $4 AND status = 'pending' AND deleted_at IS NULL \
         RETURNING {DOCUMENT_COLUMNS}"
    ))
    .bind(action.target_status())
    .bind(ctx.user_id)
    .bind(notes)
    .bind(document_id)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some(document) => {
            info!(
                document_id,
                actor = ctx.user_id,
                outcome = action.target_status().as_str(),
                "document reviewed"
            );
            Ok(document)
        }
        None => {
            let status: Option<ReviewStatus> = sqlx::query_scalar(
                "SELECT status FROM documents WHERE id = $1 AND deleted_at IS NULL",
            )
            .bind(document_id)
            .fetch_optional(pool)
            .await?;
            Err(review_rejection(status))
        }
    }
}

#[utoipa::path(
    post,
    path = "/documents/{document_id}/approve",
    params(("document_id" = i32, Path, description = "Document ID")),
    request_body = ReviewDecision,
    responses(
        (status = 200, description = "Document approved", body = Document),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Document not found"),
        (status = 409, description = "Document already reviewed")
    ),
    tag = "Documents",
    security(("bearerAuth" = []))
)]
pub async fn approve_document(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<AuthContext>,
    Path(document_id): Path<i32>,
    Json(decision): Json<ReviewDecision>,
) -> Result<ApiResponse<Document>, AppError> {
    let document =
        review_document(&pool, &ctx, document_id, ReviewAction::Approve, decision.notes).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Document approved", document))
}

#[utoipa::path(
    post,
    path = "/documents/{document_id}/reject",
    params(("document_id" = i32, Path, description = "Document ID")),
    request_body = ReviewDecision,
    responses(
        (status = 200, description = "Document rejected", body = Document),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Document not found"),
        (status = 409, description = "Document already reviewed")
    ),
    tag = "Documents",
    security(("bearerAuth" = []))
)]
pub async fn reject_document(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<AuthContext>,
    Path(document_id): Path<i32>,
    Json(decision): Json<ReviewDecision>,
) -> Result<ApiResponse<Document>, AppError> {
    let document =
        review_document(&pool, &ctx, document_id, ReviewAction::Reject, decision.notes).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Document rejected", document))
}

#[utoipa::path(
    delete,
    path = "/documents/{document_id}",
    params(("document_id" = i32, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document soft-deleted"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Document not found")
    ),
    tag = "Documents",
    security(("bearerAuth" = []))
)]
pub async fn delete_document(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<AuthContext>,
    Path(document_id): Path<i32>,
) -> Result<ApiResponse<()>, AppError> {
    ctx.require_admin()?;

    // The stored file stays on disk; only the record is flagged.
    let result = sqlx::query(
        "UPDATE documents SET deleted_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(document_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Document not found"));
    }
    info!(document_id, actor = ctx.user_id, "document soft-deleted");
    Ok(ApiResponse::success(StatusCode::OK, "Document deleted", ()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owners_upload_only_for_themselves() {
        assert_eq!(owner_for(Role::Student, 4, None).unwrap(), OwnerDecision::Caller);
        assert_eq!(owner_for(Role::Teacher, 4, Some(4)).unwrap(), OwnerDecision::Caller);
        assert!(matches!(
            owner_for(Role::Student, 4, Some(5)).unwrap_err(),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            owner_for(Role::Teacher, 4, Some(5)).unwrap_err(),
            AppError::Forbidden(_)
        ));
    }

    #[test]
    fn admin_uploads_name_an_owner() {
        assert!(matches!(
            owner_for(Role::Admin, 1, None).unwrap_err(),
            AppError::Validation(_)
        ));
        assert_eq!(
            owner_for(Role::Admin, 1, Some(5)).unwrap(),
            OwnerDecision::LookupOwner(5)
        );
    }

    #[test]
    fn double_review_is_a_conflict() {
        assert!(matches!(
            review_rejection(Some(ReviewStatus::Approved)),
            AppError::Conflict(_)
        ));
        assert!(matches!(review_rejection(None), AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn upload_is_staged_through_temp_then_moved() {
        let tmp = tempfile::tempdir().unwrap();
        let temp_root = tmp.path().join("tmp");
        let storage_root = tmp.path().join("documents");

        let stored = stage_upload(&temp_root, &storage_root, "abc.pdf", b"content")
            .await
            .unwrap();

        assert_eq!(stored, storage_root.join("abc.pdf"));
        assert_eq!(std::fs::read(&stored).unwrap(), b"content");
        // Nothing is left in the temp directory on the happy path.
        assert!(!temp_root.join("abc.pdf").exists());
    }
}
