use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;
use utoipa::OpenApi;

use crate::error::AppError;
use crate::jobs::registry::{JobInfo, JobRegistry, RunOutcome, RunRecord, RunTrigger};
use crate::middleware::auth::AuthContext;
use crate::utils::api_response::ApiResponse;

#[derive(OpenApi)]
#[openapi(
    paths(list_jobs, job_history, run_job, start_job, stop_job, restart_job),
    components(schemas(JobInfo, RunRecord, RunTrigger, RunOutcome)),
    tags((name = "Jobs", description = "Background job administration"))
)]
pub struct JobDoc;

pub fn job_routes() -> Router<PgPool> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/{name}/history", get(job_history))
        .route("/jobs/{name}/run", post(run_job))
        .route("/jobs/{name}/start", post(start_job))
        .route("/jobs/{name}/stop", post(stop_job))
        .route("/jobs/{name}/restart", post(restart_job))
}

#[utoipa::path(
    get,
    path = "/jobs",
    responses(
        (status = 200, description = "Registered jobs in registration order", body = Vec<JobInfo>),
        (status = 403, description = "Caller is not an admin")
    ),
    tag = "Jobs",
    security(("bearerAuth" = []))
)]
pub async fn list_jobs(
    Extension(ctx): Extension<AuthContext>,
    Extension(registry): Extension<Arc<JobRegistry>>,
) -> Result<ApiResponse<Vec<JobInfo>>, AppError> {
    ctx.require_admin()?;
    Ok(ApiResponse::success(StatusCode::OK, "Jobs retrieved", registry.list()))
}

#[utoipa::path(
    get,
    path = "/jobs/{name}/history",
    params(("name" = String, Path, description = "Job name")),
    responses(
        (status = 200, description = "Recent runs, oldest first", body = Vec<RunRecord>),
        (status = 404, description = "Unknown job")
    ),
    tag = "Jobs",
    security(("bearerAuth" = []))
)]
pub async fn job_history(
    Extension(ctx): Extension<AuthContext>,
    Extension(registry): Extension<Arc<JobRegistry>>,
    Path(name): Path<String>,
) -> Result<ApiResponse<Vec<RunRecord>>, AppError> {
    ctx.require_admin()?;
    let history = registry.history(&name)?;
    Ok(ApiResponse::success(StatusCode::OK, "Job history retrieved", history))
}

#[utoipa::path(
    post,
    path = "/jobs/{name}/run",
    params(("name" = String, Path, description = "Job name")),
    responses(
        (status = 200, description = "Run finished; outcome in body", body = RunRecord),
        (status = 404, description = "Unknown job")
    ),
    tag = "Jobs",
    security(("bearerAuth" = []))
)]
pub async fn run_job(
    Extension(ctx): Extension<AuthContext>,
    Extension(registry): Extension<Arc<JobRegistry>>,
    Path(name): Path<String>,
) -> Result<ApiResponse<RunRecord>, AppError> {
    ctx.require_admin()?;
    let record = registry.run_now(&name).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Job executed", record))
}

#[utoipa::path(
    post,
    path = "/jobs/{name}/start",
    params(("name" = String, Path, description = "Job name")),
    responses(
        (status = 200, description = "Job scheduler armed"),
        (status = 404, description = "Unknown job")
    ),
    tag = "Jobs",
    security(("bearerAuth" = []))
)]
pub async fn start_job(
    Extension(ctx): Extension<AuthContext>,
    Extension(registry): Extension<Arc<JobRegistry>>,
    Path(name): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    ctx.require_admin()?;
    registry.start(&name)?;
    Ok(ApiResponse::success(StatusCode::OK, "Job started", ()))
}

#[utoipa::path(
    post,
    path = "/jobs/{name}/stop",
    params(("name" = String, Path, description = "Job name")),
    responses(
        (status = 200, description = "Job scheduler disarmed"),
        (status = 404, description = "Unknown job")
    ),
    tag = "Jobs",
    security(("bearerAuth" = []))
)]
pub async fn stop_job(
    Extension(ctx): Extension<AuthContext>,
    Extension(registry): Extension<Arc<JobRegistry>>,
    Path(name): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    ctx.require_admin()?;
    registry.stop(&name)?;
    Ok(ApiResponse::success(StatusCode::OK, "Job stopped", ()))
}

#[utoipa::path(
    post,
    path = "/jobs/{name}/restart",
    params(("name" = String, Path, description = "Job name")),
    responses(
        (status = 200, description = "Job scheduler restarted"),
        (status = 404, description = "Unknown job")
    ),
    tag = "Jobs",
    security(("bearerAuth" = []))
)]
pub async fn restart_job(
    Extension(ctx): Extension<AuthContext>,
    Extension(registry): Extension<Arc<JobRegistry>>,
    Path(name): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    ctx.require_admin()?;
    registry.restart(&name)?;
    Ok(ApiResponse::success(StatusCode::OK, "Job restarted", ()))
}
