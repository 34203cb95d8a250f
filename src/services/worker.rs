//! Background analysis worker.
//!
//! Polls for pending projects, claims each one with a guarded status
//! update, drives it through analyzer invocation, artifact aggregation,
//! and risk derivation, and persists the outcome in a single transaction.
//! Every claimed project ends in `completed` or `failed`: any error or
//! panic after the claim marks the job `failed`, so nothing lingers in
//! `analyzing`, and the write transaction means no partial findings.

use std::time::Duration;

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::project::{Project, ProjectStatus, RiskLevel};
use crate::services::aggregator::{self, AnalysisReport};
use crate::services::invoker::AnalyzerInvoker;
use crate::services::risk::{self, RiskPolicy};
use crate::services::severity::SeverityRules;

#[derive(Clone)]
pub struct Worker {
    pool: PgPool,
    rules: SeverityRules,
    invoker: AnalyzerInvoker,
    policy: RiskPolicy,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(pool: PgPool, config: &AppConfig) -> Self {
        Self {
            pool,
            rules: SeverityRules::load_or_default(config.severity_rules_file.as_deref()),
            invoker: AnalyzerInvoker::new(config.analyzer.clone()),
            policy: RiskPolicy::default(),
            poll_interval: Duration::from_secs(config.worker.poll_interval_secs),
        }
    }

    /// Poll until the process is stopped.
    pub async fn run(self) {
        if !self.invoker.is_available() {
            tracing::warn!("Analyzer executable not found; pending projects will fail");
        }
        tracing::info!(interval = ?self.poll_interval, "Worker started");

        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.process_pending().await {
                tracing::error!(error = %e, "Polling pass failed");
            }
        }
    }

    /// One polling pass: claim and process every currently pending project.
    /// Each project runs in its own task so a panic in one analysis cannot
    /// take the loop down. Every failure outcome, error or panic, records
    /// the `failed` status here so no claimed job stays in `analyzing`.
    pub async fn process_pending(&self) -> Result<(), AppError> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM projects WHERE status = 'pending' ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;

        for id in ids {
            let worker = self.clone();
            let handle = tokio::spawn(async move { worker.process_project(id).await });
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(project_id = %id, error = %e, "Analysis failed");
                    self.mark_failed(id, &e.to_string()).await.ok();
                }
                Err(join_err) => {
                    tracing::error!(project_id = %id, error = %join_err, "Analysis task panicked");
                    self.mark_failed(id, "internal worker error").await.ok();
                }
            }
        }

        Ok(())
    }

    async fn process_project(&self, id: Uuid) -> Result<(), AppError> {
        // Guarded claim: only a still-pending project moves to analyzing,
        // so two workers never pick up the same job.
        let Some(project) = sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects
            SET status = 'analyzing', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(());
        };

        tracing::info!(project_id = %id, firmware = %project.filename, "Analysis started");
        self.set_status_message(id, "analyzer running").await?;

        let run = self
            .invoker
            .run(project.file_path.as_ref(), &id.to_string())
            .await?;

        self.set_status_message(id, "parsing results").await?;

        let rules = self.rules.clone();
        let log_dir = run.log_dir.clone();
        let report = tokio::task::spawn_blocking(move || aggregator::aggregate(&rules, &log_dir))
            .await
            .map_err(|e| AppError::Internal(format!("aggregation task failed: {e}")))?;

        let risk = risk::overall_risk(&self.policy, report.severity_levels());
        self.save_results(id, &run.log_dir, &run.output, report, risk)
            .await?;

        tracing::info!(project_id = %id, risk = risk.as_str(), "Analysis completed");
        Ok(())
    }

    /// Persist everything from one run atomically, then mark the project
    /// completed. Either all records land or none do.
    async fn save_results(
        &self,
        project_id: Uuid,
        log_dir: &std::path::Path,
        output: &str,
        report: AnalysisReport,
        risk: RiskLevel,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        for f in &report.findings {
            sqlx::query(
                r#"
                INSERT INTO findings (
                    project_id, finding_type, title, description, severity,
                    file_path, line_number, content, context, metadata
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(project_id)
            .bind(&f.finding_type)
            .bind(&f.title)
            .bind(&f.description)
            .bind(f.severity)
            .bind(&f.file_path)
            .bind(f.line_number)
            .bind(&f.content)
            .bind(&f.context)
            .bind(&f.metadata)
            .execute(&mut *tx)
            .await?;
        }

        for c in &report.cves {
            sqlx::query(
                r#"
                INSERT INTO cve_findings (
                    project_id, cve_id, software_name, software_version,
                    description, severity_score, severity_level, "references"
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(project_id)
            .bind(&c.cve_id)
            .bind(&c.software_name)
            .bind(&c.software_version)
            .bind(&c.description)
            .bind(c.severity_score)
            .bind(c.severity_level)
            .bind(json!(c.references))
            .execute(&mut *tx)
            .await?;
        }

        for o in &report.osint {
            sqlx::query(
                r#"
                INSERT INTO osint_results (
                    project_id, source, query, title, description, url, data, confidence_score
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(project_id)
            .bind(&o.source)
            .bind(&o.query)
            .bind(&o.title)
            .bind(&o.description)
            .bind(&o.url)
            .bind(&o.data)
            .bind(o.confidence_score)
            .execute(&mut *tx)
            .await?;
        }

        let results = completion_metadata(log_dir, output, &report);
        sqlx::query(
            r#"
            UPDATE projects
            SET status = 'completed',
                risk_level = $2,
                extraction_results = $3,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(project_id)
        .bind(risk)
        .bind(results)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Record a failure. Respects the state machine: a project already in a
    /// terminal state is left untouched.
    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<(), AppError> {
        let status: Option<ProjectStatus> =
            sqlx::query_scalar("SELECT status FROM projects WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        let Some(status) = status else {
            return Ok(());
        };
        if !failure_applies(status) {
            return Ok(());
        }

        sqlx::query(
            r#"
            UPDATE projects
            SET status = 'failed',
                extraction_results = extraction_results
                    || jsonb_build_object('error', $2::text, 'last_updated', NOW()),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Progress note visible to API readers while the project is in flight.
    async fn set_status_message(&self, id: Uuid, message: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE projects
            SET extraction_results = extraction_results
                    || jsonb_build_object('status_message', $2::text, 'last_updated', NOW()),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Whether a failure may be recorded for a project currently in `status`.
/// Terminal projects are left untouched.
fn failure_applies(status: ProjectStatus) -> bool {
    status.can_transition_to(ProjectStatus::Failed)
}

/// Diagnostic metadata stored on the project row at completion. Kept even
/// when no findings were produced so an empty result stays explainable.
fn completion_metadata(
    log_dir: &std::path::Path,
    output: &str,
    report: &AnalysisReport,
) -> serde_json::Value {
    json!({
        "log_directory": log_dir.display().to_string(),
        "analyzer_output": output,
        "summary": serde_json::Value::Object(report.summary.clone()),
        "parse_errors": report.parse_errors,
    })
}
