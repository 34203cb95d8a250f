//! Project persistence and read paths.

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::models::cve::CveFinding;
use crate::models::finding::Finding;
use crate::models::osint::OsintResult;
use crate::models::project::{CreateProject, Project, ProjectStatus, ProjectSummary, RiskLevel};
use crate::services::risk::{self, RiskPolicy};

/// Insert a new project in `pending` state.
pub async fn create(pool: &PgPool, input: CreateProject) -> Result<Project, AppError> {
    input
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let project = sqlx::query_as::<_, Project>(
        r#"
        INSERT INTO projects (
            name, description, filename, file_path, file_size, file_hash,
            device_name, device_model, device_version, manufacturer
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(&input.name)
    .bind(&input.description)
    .bind(&input.filename)
    .bind(&input.file_path)
    .bind(input.file_size)
    .bind(&input.file_hash)
    .bind(&input.device_name)
    .bind(&input.device_model)
    .bind(&input.device_version)
    .bind(&input.manufacturer)
    .fetch_one(pool)
    .await?;

    Ok(project)
}

/// List all projects, newest first, without the JSONB side channels.
pub async fn list(pool: &PgPool) -> Result<Vec<ProjectSummary>, AppError> {
    let projects = sqlx::query_as::<_, ProjectSummary>(
        r#"
        SELECT id, name, status, risk_level, filename, file_size, created_at, completed_at
        FROM projects
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(projects)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Project, AppError> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {id} not found")))
}

pub async fn findings(pool: &PgPool, project_id: Uuid) -> Result<Vec<Finding>, AppError> {
    ensure_exists(pool, project_id).await?;
    let rows = sqlx::query_as::<_, Finding>(
        "SELECT * FROM findings WHERE project_id = $1 ORDER BY severity DESC, created_at",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn cve_findings(pool: &PgPool, project_id: Uuid) -> Result<Vec<CveFinding>, AppError> {
    ensure_exists(pool, project_id).await?;
    let rows = sqlx::query_as::<_, CveFinding>(
        "SELECT * FROM cve_findings WHERE project_id = $1 ORDER BY severity_score DESC, cve_id",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn osint_results(pool: &PgPool, project_id: Uuid) -> Result<Vec<OsintResult>, AppError> {
    ensure_exists(pool, project_id).await?;
    let rows = sqlx::query_as::<_, OsintResult>(
        "SELECT * FROM osint_results WHERE project_id = $1 ORDER BY confidence_score DESC",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Per-project rollup combining stored counters with a freshly derived
/// overall risk level.
#[derive(Debug, Serialize)]
pub struct ProjectReport {
    pub id: Uuid,
    pub name: String,
    pub status: ProjectStatus,
    pub risk_level: RiskLevel,
    pub total_findings: i64,
    pub total_cves: i64,
    pub total_osint: i64,
    pub critical_count: i64,
    pub high_count: i64,
    pub medium_count: i64,
    pub low_count: i64,
    pub extraction_results: serde_json::Value,
}

pub async fn report(
    pool: &PgPool,
    policy: &RiskPolicy,
    project_id: Uuid,
) -> Result<ProjectReport, AppError> {
    let project = get(pool, project_id).await?;

    let (total_findings, total_cves, total_osint): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM findings WHERE project_id = $1),
            (SELECT COUNT(*) FROM cve_findings WHERE project_id = $1),
            (SELECT COUNT(*) FROM osint_results WHERE project_id = $1)
        "#,
    )
    .bind(project_id)
    .fetch_one(pool)
    .await?;

    let counts: Vec<(RiskLevel, i64)> = sqlx::query_as(
        r#"
        SELECT severity, COUNT(*) FROM (
            SELECT severity FROM findings WHERE project_id = $1
            UNION ALL
            SELECT severity_level FROM cve_findings WHERE project_id = $1
        ) levels
        GROUP BY severity
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    let count_of = |level: RiskLevel| {
        counts
            .iter()
            .find(|(l, _)| *l == level)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    };

    let risk_level = risk::for_project(pool, policy, project_id).await?;

    Ok(ProjectReport {
        id: project.id,
        name: project.name,
        status: project.status,
        risk_level,
        total_findings,
        total_cves,
        total_osint,
        critical_count: count_of(RiskLevel::Critical),
        high_count: count_of(RiskLevel::High),
        medium_count: count_of(RiskLevel::Medium),
        low_count: count_of(RiskLevel::Low),
        extraction_results: project.extraction_results,
    })
}

/// Delete a project and its uploaded firmware image. Child rows go with the
/// project via ON DELETE CASCADE; a missing file on disk is not an error.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    let project = get(pool, id).await?;

    sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if let Err(e) = tokio::fs::remove_file(&project.file_path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %project.file_path, error = %e, "Failed to remove firmware file");
        }
    }

    Ok(())
}

async fn ensure_exists(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await?;
    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("Project {id} not found")))
    }
}
