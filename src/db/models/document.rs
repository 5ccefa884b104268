use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::review::ReviewStatus;

/// An uploaded file awaiting (or past) secretarial review.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, ToSchema)]
pub struct Document {
    pub id: i32,
    pub user_id: i32,
    pub document_type_id: i32,
    /// Path of the stored file relative to the document storage root.
    #[serde(skip_serializing)]
    pub file_path: String,
    pub original_name: String,
    pub size_bytes: i64,
    pub status: ReviewStatus,
    pub reviewed_by: Option<i32>,
    pub review_notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<NaiveDateTime>,
}

/// Admin-only list filters, both optional.
#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct DocumentFilter {
    pub user_id: Option<i32>,
    /// One of `pending`, `approved`, `rejected`
    pub status: Option<String>,
}
