//! Project routes: firmware upload and analysis result reads.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::errors::{ApiResponse, AppError};
use crate::models::cve::CveFinding;
use crate::models::finding::Finding;
use crate::models::osint::OsintResult;
use crate::models::project::{CreateProject, Project, ProjectSummary};
use crate::services::project::{self, ProjectReport};
use crate::services::risk::RiskPolicy;
use crate::AppState;

/// POST /api/v1/projects — upload a firmware image for analysis (multipart).
///
/// The image is written under the upload directory with a generated name;
/// the project starts in `pending` and the worker picks it up from there.
pub async fn create(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<Project>>, AppError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut filename = String::from("firmware.bin");
    let mut name: Option<String> = None;
    let mut description: Option<String> = None;
    let mut device_name: Option<String> = None;
    let mut device_model: Option<String> = None;
    let mut device_version: Option<String> = None;
    let mut manufacturer: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "file" => {
                if let Some(fname) = field.file_name() {
                    filename = sanitize_filename(fname);
                }
                file_data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?
                        .to_vec(),
                );
            }
            "name" => name = Some(read_text(field, "name").await?),
            "description" => description = Some(read_text(field, "description").await?),
            "device_name" => device_name = Some(read_text(field, "device_name").await?),
            "device_model" => device_model = Some(read_text(field, "device_model").await?),
            "device_version" => device_version = Some(read_text(field, "device_version").await?),
            "manufacturer" => manufacturer = Some(read_text(field, "manufacturer").await?),
            _ => {}
        }
    }

    let data = file_data.ok_or_else(|| {
        AppError::Validation("Missing 'file' field in multipart request".to_string())
    })?;
    if data.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }

    let file_hash = hex::encode(Sha256::digest(&data));
    let stored_path = state
        .config
        .upload_dir
        .join(format!("{}_{filename}", Uuid::new_v4()));

    tokio::fs::create_dir_all(&state.config.upload_dir).await?;
    tokio::fs::write(&stored_path, &data).await?;

    let input = CreateProject {
        name: name.unwrap_or_else(|| filename.clone()),
        description,
        filename,
        file_path: stored_path.display().to_string(),
        file_size: data.len() as i64,
        file_hash,
        device_name,
        device_model,
        device_version,
        manufacturer,
    };

    let result = project::create(&state.db, input).await;
    if result.is_err() {
        tokio::fs::remove_file(&stored_path).await.ok();
    }
    let created = result?;

    tracing::info!(project_id = %created.id, filename = %created.filename, "Firmware uploaded");
    Ok(ApiResponse::success(created))
}

/// GET /api/v1/projects — list all projects.
pub async fn list(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ProjectSummary>>>, AppError> {
    let projects = project::list(&state.db).await?;
    Ok(ApiResponse::success(projects))
}

/// GET /api/v1/projects/{id} — full project record.
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Project>>, AppError> {
    let p = project::get(&state.db, id).await?;
    Ok(ApiResponse::success(p))
}

/// GET /api/v1/projects/{id}/findings
pub async fn findings(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Finding>>>, AppError> {
    let rows = project::findings(&state.db, id).await?;
    Ok(ApiResponse::success(rows))
}

/// GET /api/v1/projects/{id}/cves
pub async fn cves(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<CveFinding>>>, AppError> {
    let rows = project::cve_findings(&state.db, id).await?;
    Ok(ApiResponse::success(rows))
}

/// GET /api/v1/projects/{id}/osint
pub async fn osint(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<OsintResult>>>, AppError> {
    let rows = project::osint_results(&state.db, id).await?;
    Ok(ApiResponse::success(rows))
}

/// GET /api/v1/projects/{id}/summary — severity rollup and derived risk.
pub async fn summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProjectReport>>, AppError> {
    let report = project::report(&state.db, &RiskPolicy::default(), id).await?;
    Ok(ApiResponse::success(report))
}

/// DELETE /api/v1/projects/{id} — remove a project and its firmware image.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    project::delete(&state.db, id).await?;
    Ok(ApiResponse::success(()))
}

async fn read_text(field: axum::extract::multipart::Field<'_>, name: &str) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read '{name}': {e}")))
}

/// Keep only the final path component of a client-supplied filename.
fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    if cleaned.is_empty() {
        "firmware.bin".to_string()
    } else {
        cleaned
    }
}
