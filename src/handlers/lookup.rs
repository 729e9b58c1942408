use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;

use super::required;
use crate::{
    AppState,
    auth::JudgeSession,
    error::ApiError,
    extract::ApiQuery,
    models::{LookupResult, StudentFound},
};

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RollQuery {
    pub assigned_roll_no: Option<String>,
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QrQuery {
    /// The scanned QR payload.
    pub code: Option<String>,
}

/// find_student
///
/// [API Route] Finds a student by assigned roll number for the judge's mark form.
#[utoipa::path(
    get,
    path = "/api/find-student",
    params(RollQuery),
    responses(
        (status = 200, description = "Student", body = StudentFound),
        (status = 400, description = "Assigned roll number is required"),
        (status = 401, description = "No judge session"),
        (status = 404, description = "Student not found")
    )
)]
pub async fn find_student(
    _session: JudgeSession,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RollQuery>,
) -> Result<Json<StudentFound>, ApiError> {
    let roll = required(query.assigned_roll_no)
        .ok_or_else(|| ApiError::bad_request("Assigned roll number is required"))?;

    let student = state
        .repo
        .find_student_by_assigned_roll(&roll)
        .await?
        .ok_or_else(|| ApiError::not_found("Student not found"))?;

    Ok(Json(StudentFound {
        student: student.into(),
    }))
}

/// get_student_by_roll
///
/// [API Route] Same lookup as `find_student`, but always answers 200 and reports a miss
/// in the body.
#[utoipa::path(
    get,
    path = "/api/get-student-by-roll",
    params(RollQuery),
    responses(
        (status = 200, description = "Lookup result", body = LookupResult),
        (status = 401, description = "No judge session")
    )
)]
pub async fn get_student_by_roll(
    _session: JudgeSession,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RollQuery>,
) -> Result<Json<LookupResult>, ApiError> {
    let Some(roll) = required(query.assigned_roll_no) else {
        return Ok(Json(LookupResult::missing("Assigned roll number is required")));
    };

    let result = match state.repo.find_student_by_assigned_roll(&roll).await? {
        Some(student) => LookupResult::found(student),
        None => LookupResult::missing("Student not found"),
    };
    Ok(Json(result))
}

/// get_student_by_qr
///
/// [API Route] Resolves a scanned QR payload to its student.
#[utoipa::path(
    get,
    path = "/api/get-student-by-qr",
    params(QrQuery),
    responses(
        (status = 200, description = "Student", body = LookupResult),
        (status = 400, description = "QR code is required", body = LookupResult),
        (status = 401, description = "No judge session"),
        (status = 404, description = "Student not found", body = LookupResult)
    )
)]
pub async fn get_student_by_qr(
    _session: JudgeSession,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<QrQuery>,
) -> Result<(StatusCode, Json<LookupResult>), ApiError> {
    let Some(code) = required(query.code) else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(LookupResult::missing("QR code is required")),
        ));
    };

    Ok(match state.repo.find_student_by_qr(&code).await? {
        Some(student) => (StatusCode::OK, Json(LookupResult::found(student))),
        None => (
            StatusCode::NOT_FOUND,
            Json(LookupResult::missing("Student not found")),
        ),
    })
}
