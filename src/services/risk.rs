//! Project-level risk aggregation.
//!
//! One deterministic rule set derives the overall risk from the full set of
//! finding and CVE severities. The thresholds are policy, not invariants,
//! so they live in a tunable struct with the shipped defaults.

use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::project::RiskLevel;

/// Counting thresholds for escalation.
#[derive(Debug, Clone)]
pub struct RiskPolicy {
    /// This many `high` records escalate the project to `critical`.
    pub high_escalation_count: usize,
    /// This many `medium` records escalate the project to `high`.
    pub medium_escalation_count: usize,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            high_escalation_count: 3,
            medium_escalation_count: 5,
        }
    }
}

/// Derive the overall risk level. Rules evaluated in order, first match
/// wins:
/// 1. any critical -> critical
/// 2. >= high_escalation_count highs -> critical
/// 3. any high -> high
/// 4. >= medium_escalation_count mediums -> high
/// 5. any medium -> medium
/// 6. otherwise low
pub fn overall_risk(policy: &RiskPolicy, levels: impl IntoIterator<Item = RiskLevel>) -> RiskLevel {
    let mut critical = 0usize;
    let mut high = 0usize;
    let mut medium = 0usize;

    for level in levels {
        match level {
            RiskLevel::Critical => critical += 1,
            RiskLevel::High => high += 1,
            RiskLevel::Medium => medium += 1,
            RiskLevel::Low => {}
        }
    }

    if critical > 0 || high >= policy.high_escalation_count {
        RiskLevel::Critical
    } else if high > 0 || medium >= policy.medium_escalation_count {
        RiskLevel::High
    } else if medium > 0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Re-derive a project's risk level from its persisted rows. The rule is
/// intentionally not baked into parsing so it can be recomputed at any
/// time.
pub async fn for_project(
    pool: &PgPool,
    policy: &RiskPolicy,
    project_id: Uuid,
) -> Result<RiskLevel, AppError> {
    let levels = sqlx::query_scalar::<_, RiskLevel>(
        r#"
        SELECT severity FROM findings WHERE project_id = $1
        UNION ALL
        SELECT severity_level FROM cve_findings WHERE project_id = $1
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(overall_risk(policy, levels))
}
