use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use super::required;
use crate::{
    AppState,
    error::ApiError,
    extract::{ApiJson, ApiPath, ApiQuery},
    models::{
        College, CollegeResponse, CreateCollegeRequest, DashboardStats, EvaluationsOverview,
        MessageResponse,
    },
    report,
    repository::COLLEGE_CODE_KEY,
};

/// EvaluationsFilter
///
/// Query parameters of GET /admin/evaluations.
#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct EvaluationsFilter {
    /// Restrict to students (and team marks) of one college.
    pub college_id: Option<Uuid>,
    /// Matches student name, roll number or assigned roll number in the totals.
    pub search: Option<String>,
}

/// get_dashboard
///
/// [Admin Route] Headline counts for the admin dashboard.
#[utoipa::path(
    get,
    path = "/admin/dashboard",
    responses((status = 200, description = "Dashboard counts", body = DashboardStats))
)]
pub async fn get_dashboard(
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(state.repo.get_dashboard_stats().await?))
}

/// get_evaluations
///
/// [Admin Route] Every individual mark (newest first), the per-student totals derived
/// from them and the team marks. The totals are the same aggregation the spreadsheet
/// export writes for `view=students`.
#[utoipa::path(
    get,
    path = "/admin/evaluations",
    params(EvaluationsFilter),
    responses((status = 200, description = "Evaluation overview", body = EvaluationsOverview))
)]
pub async fn get_evaluations(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<EvaluationsFilter>,
) -> Result<Json<EvaluationsOverview>, ApiError> {
    let marks = state.repo.list_mark_details(filter.college_id).await?;
    let team_marks = state.repo.list_team_mark_details(filter.college_id).await?;

    let stats = report::marks_stats(&marks, team_marks.len());
    let totals = report::filter_totals(report::student_totals(&marks), filter.search.as_deref());

    Ok(Json(EvaluationsOverview {
        stats,
        marks,
        totals,
        team_marks,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/colleges",
    responses((status = 200, description = "Colleges, newest first", body = [College]))
)]
pub async fn list_colleges(State(state): State<AppState>) -> Result<Json<Vec<College>>, ApiError> {
    Ok(Json(state.repo.list_colleges().await?))
}

/// create_college
///
/// [Admin Route] Registers a college. The code is stored trimmed and upper-cased and
/// must be unique.
#[utoipa::path(
    post,
    path = "/admin/colleges",
    request_body = CreateCollegeRequest,
    responses(
        (status = 201, description = "College created", body = CollegeResponse),
        (status = 400, description = "Missing fields"),
        (status = 409, description = "College code already exists")
    )
)]
pub async fn create_college(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateCollegeRequest>,
) -> Result<(StatusCode, Json<CollegeResponse>), ApiError> {
    let (Some(name), Some(code)) = (required(payload.name), required(payload.code)) else {
        return Err(ApiError::bad_request("College name and code are required"));
    };
    let code = code.to_uppercase();

    let college = state
        .repo
        .create_college(&name, &code)
        .await
        .map_err(|e| {
            if e.is_unique_violation(Some(COLLEGE_CODE_KEY)) {
                ApiError::conflict("College code already exists")
            } else {
                e.into()
            }
        })?;
    tracing::info!(college = %college.id, code = %college.code, "college created");

    Ok((
        StatusCode::CREATED,
        Json(CollegeResponse {
            success: "College created successfully".to_string(),
            college,
        }),
    ))
}

/// delete_college
///
/// [Admin Route] Removes a college together with its students, judges and every mark
/// that refers to them.
#[utoipa::path(
    delete,
    path = "/admin/colleges/{id}",
    params(("id" = Uuid, Path, description = "College id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "College not found")
    )
)]
pub async fn delete_college(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.repo.delete_college(id).await? {
        return Err(ApiError::not_found("College not found"));
    }
    tracing::info!(college = %id, "college deleted");
    Ok(Json(MessageResponse::new("College deleted successfully")))
}
