use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::PgPool;
use tracing::info;
use utoipa::OpenApi;

use crate::db::models::request::{NewRequest, Request, RequestFilter};
use crate::db::models::review::{ReviewAction, ReviewDecision, ReviewStatus};
use crate::db::models::user::Role;
use crate::db::queries::{types, users};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::utils::api_response::ApiResponse;

#[derive(OpenApi)]
#[openapi(
    paths(create_request, list_requests, get_request, approve_request, reject_request, delete_request),
    components(schemas(Request, NewRequest, RequestFilter, ReviewDecision, ReviewStatus)),
    tags((name = "Requests", description = "Administrative requests and their review workflow"))
)]
pub struct RequestDoc;

const REQUEST_COLUMNS: &str = "id, student_id, request_type_id, description, status, \
     reviewed_by, review_notes, created_at, updated_at, deleted_at";

/// Who a new request may belong to, decided purely from the caller's role.
#[derive(Debug, PartialEq, Eq)]
enum OwnerDecision {
    /// The record is owned by the caller themselves.
    Caller,
    /// An admin named a student; the id still needs an existence check.
    LookupStudent(i32),
}

/// Students always own what they create; naming anyone else is an
/// authorization error. Admins must name a student explicitly. Teachers have
/// no business raising administrative requests at all.
fn owner_for(
    role: Role,
    caller_id: i32,
    requested: Option<i32>,
) -> Result<OwnerDecision, AppError> {
    match role {
        Role::Student => match requested {
            None => Ok(OwnerDecision::Caller),
            Some(id) if id == caller_id => Ok(OwnerDecision::Caller),
            Some(_) => Err(AppError::forbidden(
                "Students may only create requests for themselves",
            )),
        },
        Role::Admin => requested.map(OwnerDecision::LookupStudent).ok_or_else(|| {
            AppError::validation("student_id is required when an admin creates a request")
        }),
        Role::Teacher => Err(AppError::forbidden(
            "Teachers cannot create administrative requests",
        )),
    }
}

async fn resolve_owner(
    pool: &PgPool,
    ctx: &AuthContext,
    requested_owner: Option<i32>,
) -> Result<i32, AppError> {
    match owner_for(ctx.role, ctx.user_id, requested_owner)? {
        OwnerDecision::Caller => Ok(ctx.user_id),
        OwnerDecision::LookupStudent(student_id) => {
            users::find_active_user_with_role(pool, student_id, Role::Student)
                .await?
                .ok_or_else(|| AppError::not_found("Student not found"))?;
            Ok(student_id)
        }
    }
}

/// Maps the zero-rows outcome of the conditional review update: the record is
/// either gone (or soft-deleted) or already sits in a terminal state.
fn review_rejection(current: Option<ReviewStatus>) -> AppError {
    match current {
        None => AppError::not_found("Request not found"),
        Some(current) if !current.can_review() => AppError::conflict(format!(
            "Request is already {}, only pending requests can be reviewed",
            current.as_str()
        )),
        Some(_) => AppError::conflict("Request changed during review, try again"),
    }
}

#[utoipa::path(
    post,
    path = "/requests",
    request_body = NewRequest,
    responses(
        (status = 201, description = "Request created", body = Request),
        (status = 400, description = "Unknown request type"),
        (status = 403, description = "Caller may not create this request"),
        (status = 404, description = "Named student does not exist")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn create_request(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<NewRequest>,
) -> Result<ApiResponse<Request>, AppError> {
    if !types::request_type_exists(&pool, payload.request_type_id).await? {
        return Err(AppError::validation(format!(
            "Unknown request type {}",
            payload.request_type_id
        )));
    }

    let student_id = resolve_owner(&pool, &ctx, payload.student_id).await?;

    let created = sqlx::query_as::<_, Request>(&format!(
        "INSERT INTO requests (student_id, request_type_id, description) \
         VALUES ($1, $2, $3) RETURNING {REQUEST_COLUMNS}"
    ))
    .bind(student_id)
    .bind(payload.request_type_id)
    .bind(payload.description)
    .fetch_one(&pool)
    .await?;

    info!(request_id = created.id, student_id, actor = ctx.user_id, "request created");
    Ok(ApiResponse::success(StatusCode::CREATED, "Request created", created))
}

#[utoipa::path(
    get,
    path = "/requests",
    params(
        ("student_id" = Option<i32>, Query, description = "Admin-only owner filter"),
        ("status" = Option<String>, Query, description = "pending | approved | rejected")
    ),
    responses(
        (status = 200, description = "Requests visible to the caller", body = Vec<Request>),
        (status = 400, description = "Unknown status filter"),
        (status = 403, description = "Role may not list requests")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn list_requests(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<AuthContext>,
    Query(filter): Query<RequestFilter>,
) -> Result<ApiResponse<Vec<Request>>, AppError> {
    let status = match filter.status.as_deref() {
        Some(value) => Some(ReviewStatus::parse(value).ok_or_else(|| {
            AppError::validation(format!("Unknown status filter `{value}`"))
        })?),
        None => None,
    };

    let mut qb = sqlx::QueryBuilder::new(format!(
        "SELECT {REQUEST_COLUMNS} FROM requests WHERE deleted_at IS NULL"
    ));

    match ctx.role {
        Role::Student => {
            // Owner-type callers see only their own records.
            qb.push(" AND student_id = ").push_bind(ctx.user_id);
        }
        Role::Admin => {
            if let Some(student_id) = filter.student_id {
                qb.push(" AND student_id = ").push_bind(student_id);
            }
        }
        Role::Teacher => {
            return Err(AppError::forbidden("Teachers cannot list administrative requests"));
        }
    }
    if let Some(status) = status {
        qb.push(" AND status = ").push_bind(status);
    }
    qb.push(" ORDER BY created_at DESC");

    let requests = qb.build_query_as::<Request>().fetch_all(&pool).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Requests retrieved", requests))
}

#[utoipa::path(
    get,
    path = "/requests/{request_id}",
    params(("request_id" = i32, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request retrieved", body = Request),
        (status = 403, description = "Exists but is not visible to the caller"),
        (status = 404, description = "Absent or soft-deleted")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn get_request(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<AuthContext>,
    Path(request_id): Path<i32>,
) -> Result<ApiResponse<Request>, AppError> {
    let request = sqlx::query_as::<_, Request>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM requests WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(request_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::not_found("Request not found"))?;

    if !ctx.is_admin() && request.student_id != ctx.user_id {
        return Err(AppError::forbidden("You may only view your own requests"));
    }
    Ok(ApiResponse::success(StatusCode::OK, "Request retrieved", request))
}

/// Applies an admin decision as a single conditional update. The
/// `status = 'pending'` guard closes the concurrent-review race: the second
/// reviewer affects zero rows and gets a conflict instead of overwriting.
pub async fn review_request(
    pool: &PgPool,
    ctx: &AuthContext,
    request_id: i32,
    action: ReviewAction,
    notes: Option<String>,
) -> Result<Request, AppError> {
    ctx.require_admin()?;

    let updated = sqlx::query_as::<_, Request>(&format!(
        "UPDATE requests SET status = $1, reviewed_by = $2, review_notes = $3, updated_at = NOW() \
         WHERE id = $4 AND status = 'pending' AND deleted_at IS NULL \
         RETURNING {REQUEST_COLUMNS}"
    ))
    .bind(action.target_status())
    .bind(ctx.user_id)
    .bind(notes)
    .bind(request_id)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some(request) => {
            info!(
                request_id,
                actor = ctx.user_id,
                outcome = action.target_status().as_str(),
                "request reviewed"
            );
            Ok(request)
        }
        None => {
            // Zero rows: either the record is gone or it already left `pending`.
            let status: Option<ReviewStatus> = sqlx::query_scalar(
                "SELECT status FROM requests WHERE id = $1 AND deleted_at IS NULL",
            )
            .bind(request_id)
            .fetch_optional(pool)
            .await?;
            Err(review_rejection(status))
        }
    }
}

#[utoipa::path(
    post,
    path = "/requests/{request_id}/approve",
    params(("request_id" = i32, Path, description = "Request ID")),
    request_body = ReviewDecision,
    responses(
        (status = 200, description = "Request approved", body = Request),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already reviewed")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn approve_request(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<AuthContext>,
    Path(request_id): Path<i32>,
    Json(decision): Json<ReviewDecision>,
) -> Result<ApiResponse<Request>, AppError> {
    let request =
        review_request(&pool, &ctx, request_id, ReviewAction::Approve, decision.notes).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Request approved", request))
}

#[utoipa::path(
    post,
    path = "/requests/{request_id}/reject",
    params(("request_id" = i32, Path, description = "Request ID")),
    request_body = ReviewDecision,
    responses(
        (status = 200, description = "Request rejected", body = Request),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already reviewed")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn reject_request(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<AuthContext>,
    Path(request_id): Path<i32>,
    Json(decision): Json<ReviewDecision>,
) -> Result<ApiResponse<Request>, AppError> {
    let request =
        review_request(&pool, &ctx, request_id, ReviewAction::Reject, decision.notes).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Request rejected", request))
}

#[utoipa::path(
    delete,
    path = "/requests/{request_id}",
    params(("request_id" = i32, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request soft-deleted"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Request not found")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn delete_request(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<AuthContext>,
    Path(request_id): Path<i32>,
) -> Result<ApiResponse<()>, AppError> {
    ctx.require_admin()?;

    // Records are never physically removed, only flagged.
    let result = sqlx::query(
        "UPDATE requests SET deleted_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(request_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Request not found"));
    }
    info!(request_id, actor = ctx.user_id, "request soft-deleted");
    Ok(ApiResponse::success(StatusCode::OK, "Request deleted", ()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn students_own_what_they_create() {
        assert_eq!(owner_for(Role::Student, 7, None).unwrap(), OwnerDecision::Caller);
        assert_eq!(owner_for(Role::Student, 7, Some(7)).unwrap(), OwnerDecision::Caller);
    }

    #[test]
    fn student_naming_another_owner_is_forbidden() {
        let err = owner_for(Role::Student, 7, Some(8)).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn teachers_cannot_create_requests() {
        assert!(matches!(
            owner_for(Role::Teacher, 3, None).unwrap_err(),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            owner_for(Role::Teacher, 3, Some(3)).unwrap_err(),
            AppError::Forbidden(_)
        ));
    }

    #[test]
    fn admins_must_name_a_student() {
        assert!(matches!(
            owner_for(Role::Admin, 1, None).unwrap_err(),
            AppError::Validation(_)
        ));
        assert_eq!(
            owner_for(Role::Admin, 1, Some(9)).unwrap(),
            OwnerDecision::LookupStudent(9)
        );
    }

    #[test]
    fn double_review_is_a_conflict_not_an_overwrite() {
        assert!(matches!(
            review_rejection(Some(ReviewStatus::Approved)),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            review_rejection(Some(ReviewStatus::Rejected)),
            AppError::Conflict(_)
        ));
        assert!(matches!(review_rejection(None), AppError::NotFound(_)));
    }
}
