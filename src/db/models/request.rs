use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::review::ReviewStatus;

/// An administrative request raised by (or on behalf of) a student.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, ToSchema)]
pub struct Request {
    pub id: i32,
    pub student_id: i32,
    pub request_type_id: i32,
    pub description: Option<String>,
    pub status: ReviewStatus,
    pub reviewed_by: Option<i32>,
    pub review_notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewRequest {
    pub request_type_id: i32,
    pub description: Option<String>,
    /// Only honored for admin callers; students always own what they create.
    pub student_id: Option<i32>,
}

/// Admin-only list filters, both optional.
#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct RequestFilter {
    pub student_id: Option<i32>,
    /// One of `pending`, `approved`, `rejected`
    pub status: Option<String>,
}
