use axum::{Json, extract::State};

use super::{check_marks, required};
use crate::{
    AppState,
    auth::JudgeSession,
    error::ApiError,
    extract::ApiJson,
    models::{
        IndividualMarkResponse, JudgeEvaluations, NewIndividualMark, NewTeamMark,
        SubmitMarksRequest, TeamMarkRequest, TeamMarkResponse,
    },
    repository::{INDIVIDUAL_MARK_KEY, TEAM_MARK_KEY},
};

/// Blank comments are stored as NULL.
fn clean_comments(comments: Option<String>) -> Option<String> {
    required(comments)
}

/// Shared by both individual mark endpoints: validates the payload, checks the student
/// exists and stores the mark under the configured conflict policy.
async fn record_individual_mark(
    state: &AppState,
    session: &JudgeSession,
    payload: SubmitMarksRequest,
) -> Result<IndividualMarkResponse, ApiError> {
    let (Some(student_id), Some(marks)) = (payload.student_id, payload.marks) else {
        return Err(ApiError::bad_request("Student and marks are required"));
    };
    let marks = check_marks(state.config.marks_bounds, marks)?;

    if state.repo.get_student(student_id).await?.is_none() {
        return Err(ApiError::not_found("Student not found"));
    }

    let new_mark = NewIndividualMark {
        student_id,
        judge_id: session.judge.id,
        marks,
        comments: clean_comments(payload.comments),
    };
    let mark = state
        .repo
        .save_individual_mark(new_mark, state.config.mark_conflict_policy)
        .await
        .map_err(|e| {
            if e.is_unique_violation(Some(INDIVIDUAL_MARK_KEY)) {
                ApiError::bad_request("You have already marked this student")
            } else {
                e.into()
            }
        })?;
    tracing::info!(
        judge = %mark.judge_id,
        student = %mark.student_id,
        marks = mark.marks,
        "individual mark saved"
    );

    Ok(IndividualMarkResponse {
        success: "Marks submitted successfully".to_string(),
        mark,
    })
}

/// submit_marks
///
/// [API Route] Records the signed-in judge's marks for one student. The judge is taken
/// from the judge session cookie, never from the body.
#[utoipa::path(
    post,
    path = "/api/submit-marks",
    request_body = SubmitMarksRequest,
    responses(
        (status = 200, description = "Mark stored", body = IndividualMarkResponse),
        (status = 400, description = "Invalid marks or already marked"),
        (status = 401, description = "No judge session"),
        (status = 404, description = "Student not found")
    )
)]
pub async fn submit_marks(
    session: JudgeSession,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SubmitMarksRequest>,
) -> Result<Json<IndividualMarkResponse>, ApiError> {
    Ok(Json(record_individual_mark(&state, &session, payload).await?))
}

#[utoipa::path(
    post,
    path = "/judge/marks/individual",
    request_body = SubmitMarksRequest,
    responses(
        (status = 200, description = "Mark stored", body = IndividualMarkResponse),
        (status = 400, description = "Invalid marks or already marked"),
        (status = 404, description = "Student not found")
    )
)]
pub async fn submit_individual_mark(
    session: JudgeSession,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SubmitMarksRequest>,
) -> Result<Json<IndividualMarkResponse>, ApiError> {
    Ok(Json(record_individual_mark(&state, &session, payload).await?))
}

/// submit_team_mark
///
/// [Judge Route] Records one mark for a whole group of a college. The group must have
/// at least one registered student.
#[utoipa::path(
    post,
    path = "/judge/marks/team",
    request_body = TeamMarkRequest,
    responses(
        (status = 200, description = "Mark stored", body = TeamMarkResponse),
        (status = 400, description = "Invalid marks or already marked"),
        (status = 404, description = "Team not found")
    )
)]
pub async fn submit_team_mark(
    session: JudgeSession,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<TeamMarkRequest>,
) -> Result<Json<TeamMarkResponse>, ApiError> {
    let (Some(college_id), Some(group_no), Some(marks)) =
        (payload.college_id, required(payload.group_no), payload.marks)
    else {
        return Err(ApiError::bad_request("College, group and marks are required"));
    };
    let marks = check_marks(state.config.marks_bounds, marks)?;

    let groups = state.repo.list_groups(college_id).await?;
    if !groups.contains(&group_no) {
        return Err(ApiError::not_found("Team not found"));
    }

    let new_mark = NewTeamMark {
        college_id,
        group_no,
        judge_id: session.judge.id,
        marks,
        comments: clean_comments(payload.comments),
    };
    let mark = state
        .repo
        .save_team_mark(new_mark, state.config.mark_conflict_policy)
        .await
        .map_err(|e| {
            if e.is_unique_violation(Some(TEAM_MARK_KEY)) {
                ApiError::bad_request("You have already marked this team")
            } else {
                e.into()
            }
        })?;
    tracing::info!(
        judge = %mark.judge_id,
        group = %mark.group_no,
        marks = mark.marks,
        "team mark saved"
    );

    Ok(Json(TeamMarkResponse {
        success: "Team marks submitted successfully".to_string(),
        mark,
    }))
}

/// list_teams
///
/// [Judge Route] Distinct group numbers of the judge's college, sorted.
#[utoipa::path(
    get,
    path = "/judge/teams",
    responses((status = 200, description = "Group numbers", body = [String]))
)]
pub async fn list_teams(
    session: JudgeSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.repo.list_groups(session.judge.college_id).await?))
}

#[utoipa::path(
    get,
    path = "/judge/evaluations",
    responses((status = 200, description = "Own marks, newest first", body = JudgeEvaluations))
)]
pub async fn judge_evaluations(
    session: JudgeSession,
    State(state): State<AppState>,
) -> Result<Json<JudgeEvaluations>, ApiError> {
    let individual = state.repo.list_judge_marks(session.judge.id).await?;
    let team = state.repo.list_judge_team_marks(session.judge.id).await?;
    Ok(Json(JudgeEvaluations { individual, team }))
}
