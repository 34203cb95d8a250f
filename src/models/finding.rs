//! Finding model: one discrete security observation from analyzer output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::project::RiskLevel;

/// A persisted finding, append-only once its project completes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Finding {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Open tag: the analyzer produces new categories over time, so this
    /// stays a free string rather than a closed enum.
    pub finding_type: String,
    pub title: String,
    pub description: String,
    pub severity: RiskLevel,
    pub file_path: Option<String>,
    pub line_number: Option<i32>,
    pub content: Option<String>,
    pub context: Option<String>,
    /// Provenance and tool-specific sub-fields (source sub-parser,
    /// originating module id, port/service info, raw line).
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A normalized finding emitted by a parser, not yet persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewFinding {
    pub finding_type: String,
    pub title: String,
    pub description: String,
    pub severity: RiskLevel,
    pub file_path: Option<String>,
    pub line_number: Option<i32>,
    pub content: Option<String>,
    pub context: Option<String>,
    pub metadata: serde_json::Value,
}

impl NewFinding {
    pub fn new(finding_type: &str, title: impl Into<String>, severity: RiskLevel) -> Self {
        Self {
            finding_type: finding_type.to_string(),
            title: title.into(),
            description: String::new(),
            severity,
            file_path: None,
            line_number: None,
            content: None,
            context: None,
            metadata: serde_json::Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_finding_defaults() {
        let f = NewFinding::new("open_port", "Open Port: 23", RiskLevel::Medium);
        assert_eq!(f.finding_type, "open_port");
        assert_eq!(f.severity, RiskLevel::Medium);
        assert!(f.file_path.is_none());
        assert!(f.metadata.is_null());
    }

    #[test]
    fn finding_round_trip() {
        let f = NewFinding {
            finding_type: "credential_finding".to_string(),
            title: "Potential Credential Found".to_string(),
            description: "admin password in /etc/shadow".to_string(),
            severity: RiskLevel::Medium,
            file_path: Some("/etc/shadow".to_string()),
            line_number: Some(3),
            content: None,
            context: None,
            metadata: serde_json::json!({"module": "S50_authentication_check"}),
        };
        let json = serde_json::to_string(&f).unwrap();
        let back: NewFinding = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }
}
