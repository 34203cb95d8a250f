//! CVE finding model: a vulnerability match against a software component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::project::RiskLevel;
use crate::services::severity;

/// A persisted CVE match.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CveFinding {
    pub id: Uuid,
    pub project_id: Uuid,
    pub cve_id: String,
    pub software_name: String,
    pub software_version: String,
    pub description: String,
    /// CVSS-like score on the 0-10 scale.
    pub severity_score: f64,
    /// Always derived from `severity_score` via the fixed thresholds.
    pub severity_level: RiskLevel,
    pub references: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A CVE match emitted by a parser, not yet persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewCveFinding {
    pub cve_id: String,
    pub software_name: String,
    pub software_version: String,
    pub description: String,
    pub severity_score: f64,
    pub severity_level: RiskLevel,
    pub references: Vec<String>,
}

impl NewCveFinding {
    /// Build a CVE finding with `severity_level` derived from the score.
    pub fn from_score(cve_id: String, software_name: String, software_version: String, score: f64) -> Self {
        Self {
            cve_id,
            software_name,
            software_version,
            description: String::new(),
            severity_score: score,
            severity_level: severity::score_to_level(score),
            references: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_level_derived_from_score() {
        let cve = NewCveFinding::from_score(
            "CVE-2022-9999".to_string(),
            "busybox".to_string(),
            "1.30".to_string(),
            9.8,
        );
        assert_eq!(cve.severity_level, RiskLevel::Critical);

        let cve = NewCveFinding::from_score(
            "CVE-2021-0001".to_string(),
            "openssl".to_string(),
            String::new(),
            5.4,
        );
        assert_eq!(cve.severity_level, RiskLevel::Medium);
    }
}
