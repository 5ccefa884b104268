use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Three-state lifecycle shared by requests and documents. Stored as TEXT.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }

    /// Parses a caller-supplied filter value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ReviewStatus::Pending),
            "approved" => Some(ReviewStatus::Approved),
            "rejected" => Some(ReviewStatus::Rejected),
            _ => None,
        }
    }

    /// Only `pending` records may be reviewed; the terminal states never
    /// transition again.
    pub fn can_review(&self) -> bool {
        matches!(self, ReviewStatus::Pending)
    }
}

/// The two admin decisions on a pending record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approve,
    Reject,
}

impl ReviewAction {
    pub fn target_status(&self) -> ReviewStatus {
        match self {
            ReviewAction::Approve => ReviewStatus::Approved,
            ReviewAction::Reject => ReviewStatus::Rejected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewAction::Approve => "approve",
            ReviewAction::Reject => "reject",
        }
    }
}

/// Body accepted by the approve/reject endpoints.
#[derive(Debug, Deserialize, ToSchema, Default)]
pub struct ReviewDecision {
    /// Optional notes recorded alongside the reviewer id.
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_is_reviewable() {
        assert!(ReviewStatus::Pending.can_review());
        assert!(!ReviewStatus::Approved.can_review());
        assert!(!ReviewStatus::Rejected.can_review());
    }

    #[test]
    fn actions_map_to_terminal_states() {
        assert_eq!(ReviewAction::Approve.target_status(), ReviewStatus::Approved);
        assert_eq!(ReviewAction::Reject.target_status(), ReviewStatus::Rejected);
        assert!(!ReviewAction::Approve.target_status().can_review());
    }

    #[test]
    fn status_filter_parsing() {
        assert_eq!(ReviewStatus::parse("pending"), Some(ReviewStatus::Pending));
        assert_eq!(ReviewStatus::parse("approved"), Some(ReviewStatus::Approved));
        assert_eq!(ReviewStatus::parse("rejected"), Some(ReviewStatus::Rejected));
        assert_eq!(ReviewStatus::parse("archived"), None);
        assert_eq!(ReviewStatus::parse("Pending"), None);
    }
}
