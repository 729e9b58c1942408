use axum::{
    extract::State,
    http::{HeaderName, header},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::attachment;
use crate::{
    AppState,
    auth::AdminSession,
    error::ApiError,
    extract::{ApiJson, ApiQuery},
    export::{self, ExportView, XLSX_CONTENT_TYPE},
    models::TemplateRequest,
    qr::{self, HTML_CONTENT_TYPE, SVG_CONTENT_TYPE},
};

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ExportQuery {
    pub college_id: Option<Uuid>,
    /// `marks` (default) or `students`.
    pub view: Option<ExportView>,
}

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StudentQrQuery {
    pub student_id: Option<Uuid>,
}

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CollegeQrQuery {
    pub college_id: Option<Uuid>,
}

/// Content-Type and Content-Disposition of a file download.
type DownloadHeaders = [(HeaderName, String); 2];

fn download<B: IntoResponse>(
    content_type: &str,
    filename: &str,
    body: B,
) -> (DownloadHeaders, B) {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, attachment(filename)),
        ],
        body,
    )
}

/// export_evaluations
///
/// [API Route, admin] Spreadsheet of individual marks, either one row per mark or one
/// row per student total.
#[utoipa::path(
    get,
    path = "/api/export-evaluations",
    params(ExportQuery),
    responses(
        (status = 200, description = "XLSX workbook"),
        (status = 401, description = "No admin session"),
        (status = 404, description = "College not found")
    )
)]
pub async fn export_evaluations(
    _session: AdminSession,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let college = match query.college_id {
        Some(id) => Some(
            state
                .repo
                .get_college(id)
                .await?
                .ok_or_else(|| ApiError::not_found("College not found"))?,
        ),
        None => None,
    };

    let marks = state.repo.list_mark_details(query.college_id).await?;
    let view = query.view.unwrap_or_default();
    let bytes = export::evaluations_workbook(&marks, view)
        .map_err(|e| ApiError::Internal(format!("failed to build export: {e}")))?;

    let filename = export::evaluations_filename(
        college.as_ref().map(|c| c.code.as_str()),
        Utc::now().date_naive(),
    );
    tracing::info!(rows = marks.len(), ?view, %filename, "evaluations exported");
    Ok(download(XLSX_CONTENT_TYPE, &filename, bytes))
}

/// download_template
///
/// [API Route, admin] The student upload template for one college.
#[utoipa::path(
    post,
    path = "/api/download-template",
    request_body = TemplateRequest,
    responses(
        (status = 200, description = "XLSX template"),
        (status = 400, description = "College not found"),
        (status = 401, description = "No admin session")
    )
)]
pub async fn download_template(
    _session: AdminSession,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<TemplateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let college_id = payload
        .college_id
        .ok_or_else(|| ApiError::bad_request("College ID is required"))?;
    let college = state
        .repo
        .get_college(college_id)
        .await?
        .ok_or_else(|| ApiError::bad_request("College not found"))?;

    let bytes = export::student_template(&college)
        .map_err(|e| ApiError::Internal(format!("failed to build template: {e}")))?;
    Ok(download(
        XLSX_CONTENT_TYPE,
        &export::template_filename(&college),
        bytes,
    ))
}

#[utoipa::path(
    get,
    path = "/api/download-qr",
    params(StudentQrQuery),
    responses(
        (status = 200, description = "SVG QR code", body = String),
        (status = 400, description = "Student ID is required"),
        (status = 401, description = "No admin session"),
        (status = 404, description = "Student not found")
    )
)]
pub async fn download_qr(
    _session: AdminSession,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<StudentQrQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let student_id = query
        .student_id
        .ok_or_else(|| ApiError::bad_request("Student ID is required"))?;
    let student = state
        .repo
        .get_student(student_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Student not found"))?;

    let svg = qr::student_qr_svg(&student)
        .map_err(|e| ApiError::Internal(format!("failed to render QR code: {e}")))?;
    Ok(download(
        SVG_CONTENT_TYPE,
        &qr::student_qr_filename(&student),
        svg,
    ))
}

/// download_mass_qr
///
/// [API Route, admin] Printable sheet with the QR codes of every student of a college,
/// in roll number order.
#[utoipa::path(
    get,
    path = "/api/download-mass-qr",
    params(CollegeQrQuery),
    responses(
        (status = 200, description = "Printable HTML", body = String),
        (status = 400, description = "College ID is required"),
        (status = 401, description = "No admin session"),
        (status = 404, description = "College not found or no students")
    )
)]
pub async fn download_mass_qr(
    _session: AdminSession,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CollegeQrQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let college_id = query
        .college_id
        .ok_or_else(|| ApiError::bad_request("College ID is required"))?;
    let college = state
        .repo
        .get_college(college_id)
        .await?
        .ok_or_else(|| ApiError::not_found("College not found"))?;

    let students = state.repo.list_students_by_roll(college_id).await?;
    if students.is_empty() {
        return Err(ApiError::not_found("No students found for this college"));
    }

    let html = qr::mass_qr_html(&college.name, &college.code, &students)
        .map_err(|e| ApiError::Internal(format!("failed to render QR sheet: {e}")))?;
    Ok(download(
        HTML_CONTENT_TYPE,
        &qr::mass_qr_filename(&college.code),
        html,
    ))
}
