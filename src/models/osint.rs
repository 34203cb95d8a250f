//! OSINT result model. Populated by the external intelligence path; shares
//! the owning-project relationship and append-only lifecycle with findings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OsintResult {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Origin of the intelligence, e.g. "shodan" or "fcc".
    pub source: String,
    pub query: String,
    pub title: String,
    pub description: String,
    pub url: Option<String>,
    pub data: serde_json::Value,
    /// Relevance on a 0-100 scale.
    pub confidence_score: i32,
    pub created_at: DateTime<Utc>,
}

/// An OSINT entry not yet persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewOsintResult {
    pub source: String,
    pub query: String,
    pub title: String,
    pub description: String,
    pub url: Option<String>,
    pub data: serde_json::Value,
    pub confidence_score: i32,
}
