//! Project model: one firmware submission's end-to-end analysis record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// -- Enums matching PostgreSQL --

/// Ordered risk scale shared by findings, CVE matches, and the project
/// aggregate. The derive order gives `low < medium < high < critical`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[sqlx(type_name = "risk_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Lifecycle state of an analysis project.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "project_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Pending,
    Uploading,
    Extracting,
    Analyzing,
    Osint,
    Completed,
    Failed,
}

impl ProjectStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Position in the forward pipeline; terminal states have no rank.
    fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Uploading => Some(1),
            Self::Extracting => Some(2),
            Self::Analyzing => Some(3),
            Self::Osint => Some(4),
            Self::Completed | Self::Failed => None,
        }
    }

    /// Whether a transition to `to` is permitted. Jobs only move forward
    /// through the pipeline; `failed` is reachable from any non-terminal
    /// state; terminal states are absorbing.
    pub fn can_transition_to(&self, to: ProjectStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match to {
            ProjectStatus::Failed | ProjectStatus::Completed => true,
            _ => match (self.rank(), to.rank()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }
}

// -- Core Project --

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub risk_level: RiskLevel,

    // File information
    pub filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub file_hash: String,

    // Device metadata (free text, optional)
    pub device_name: Option<String>,
    pub device_model: Option<String>,
    pub device_version: Option<String>,
    pub manufacturer: Option<String>,

    // Tool-specific side channels
    pub firmware_info: serde_json::Value,
    pub extraction_results: serde_json::Value,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Input for creating a project from a firmware upload.
#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct CreateProject {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub file_hash: String,
    pub device_name: Option<String>,
    pub device_model: Option<String>,
    pub device_version: Option<String>,
    pub manufacturer: Option<String>,
}

/// Lightweight listing DTO without the JSONB side channels.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProjectSummary {
    pub id: Uuid,
    pub name: String,
    pub status: ProjectStatus,
    pub risk_level: RiskLevel,
    pub filename: String,
    pub file_size: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn risk_level_serialization() {
        let json = serde_json::to_string(&RiskLevel::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let level: RiskLevel = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(level, RiskLevel::Medium);
    }

    #[test]
    fn status_serialization() {
        let json = serde_json::to_string(&ProjectStatus::Analyzing).unwrap();
        assert_eq!(json, "\"analyzing\"");
        let status: ProjectStatus = serde_json::from_str("\"osint\"").unwrap();
        assert_eq!(status, ProjectStatus::Osint);
    }

    #[test]
    fn terminal_states_are_absorbing() {
        for from in [ProjectStatus::Completed, ProjectStatus::Failed] {
            for to in [
                ProjectStatus::Pending,
                ProjectStatus::Analyzing,
                ProjectStatus::Completed,
                ProjectStatus::Failed,
            ] {
                assert!(!from.can_transition_to(to), "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn failed_reachable_from_any_non_terminal() {
        for from in [
            ProjectStatus::Pending,
            ProjectStatus::Uploading,
            ProjectStatus::Extracting,
            ProjectStatus::Analyzing,
            ProjectStatus::Osint,
        ] {
            assert!(from.can_transition_to(ProjectStatus::Failed));
        }
    }

    #[test]
    fn jobs_never_move_backwards() {
        assert!(ProjectStatus::Pending.can_transition_to(ProjectStatus::Analyzing));
        assert!(ProjectStatus::Analyzing.can_transition_to(ProjectStatus::Osint));
        assert!(!ProjectStatus::Analyzing.can_transition_to(ProjectStatus::Pending));
        assert!(!ProjectStatus::Osint.can_transition_to(ProjectStatus::Extracting));
        assert!(!ProjectStatus::Analyzing.can_transition_to(ProjectStatus::Analyzing));
    }
}
