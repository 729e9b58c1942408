use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    extract::{ApiJson, ApiPath, ApiQuery},
    export::parse_student_upload,
    models::{AssignRollRequest, MessageResponse, Student, UploadResponse},
    repository::{STUDENT_ASSIGNED_ROLL_KEY, STUDENT_ROLL_KEY},
};

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StudentFilter {
    pub college_id: Option<Uuid>,
    /// Case-insensitive match on name or roll number.
    pub search: Option<String>,
}

/// UploadForm
///
/// Documents the multipart body of POST /admin/students/upload.
#[derive(ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct UploadForm {
    pub college_id: Uuid,
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[utoipa::path(
    get,
    path = "/admin/students",
    params(StudentFilter),
    responses((status = 200, description = "Students, newest first", body = [Student]))
)]
pub async fn list_students(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<StudentFilter>,
) -> Result<Json<Vec<Student>>, ApiError> {
    let students = state
        .repo
        .list_students(filter.college_id, filter.search.as_deref())
        .await?;
    Ok(Json(students))
}

/// upload_students
///
/// [Admin Route] Bulk-registers the students listed in an uploaded workbook for one
/// college. Either every valid row is inserted or none is.
#[utoipa::path(
    post,
    path = "/admin/students/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Students created", body = UploadResponse),
        (status = 400, description = "Missing or unusable file"),
        (status = 409, description = "Some roll numbers already exist for this college")
    )
)]
pub async fn upload_students(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let mut multipart = multipart?;
    let mut college_id: Option<Uuid> = None;
    let mut file: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("Invalid upload"))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("collegeId") => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| ApiError::bad_request("Invalid upload"))?;
                college_id = Uuid::parse_str(text.trim()).ok();
            }
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::bad_request("Invalid upload"))?;
                file = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let (Some(college_id), Some(file)) = (college_id, file) else {
        return Err(ApiError::bad_request("College and file are required"));
    };
    if state.repo.get_college(college_id).await?.is_none() {
        return Err(ApiError::bad_request("College not found"));
    }

    let rows = parse_student_upload(&file, college_id, Utc::now().timestamp_millis())
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let students = state.repo.insert_students(rows).await.map_err(|e| {
        if e.is_unique_violation(Some(STUDENT_ROLL_KEY)) {
            ApiError::conflict("Some roll numbers already exist for this college")
        } else {
            e.into()
        }
    })?;
    tracing::info!(college = %college_id, count = students.len(), "students uploaded");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            success: format!("Successfully uploaded {} students", students.len()),
            students,
        }),
    ))
}

/// assign_roll_number
///
/// [Admin Route] Sets the assigned roll number judges use to find a student. A blank
/// value clears it.
#[utoipa::path(
    put,
    path = "/admin/students/{id}/assigned-roll",
    params(("id" = Uuid, Path, description = "Student id")),
    request_body = AssignRollRequest,
    responses(
        (status = 200, description = "Updated student", body = Student),
        (status = 404, description = "Student not found"),
        (status = 409, description = "Assigned roll number already in use")
    )
)]
pub async fn assign_roll_number(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<AssignRollRequest>,
) -> Result<Json<Student>, ApiError> {
    let assigned = super::required(payload.assigned_roll_no);

    let student = state
        .repo
        .set_assigned_roll_no(id, assigned)
        .await
        .map_err(|e| {
            if e.is_unique_violation(Some(STUDENT_ASSIGNED_ROLL_KEY)) {
                ApiError::conflict("Assigned roll number already in use")
            } else {
                e.into()
            }
        })?
        .ok_or_else(|| ApiError::not_found("Student not found"))?;

    Ok(Json(student))
}

#[utoipa::path(
    delete,
    path = "/admin/students/{id}",
    params(("id" = Uuid, Path, description = "Student id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Student not found")
    )
)]
pub async fn delete_student(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.repo.delete_student(id).await? {
        return Err(ApiError::not_found("Student not found"));
    }
    tracing::info!(student = %id, "student deleted");
    Ok(Json(MessageResponse::new("Student deleted successfully")))
}
