use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::required;
use crate::{
    AppState,
    access_code::{access_code_expiry, generate_access_code},
    error::{ApiError, RepoError},
    extract::{ApiJson, ApiPath, ApiQuery},
    models::{
        CreateJudgeRequest, Judge, JudgeResponse, MessageResponse, NewJudge, SetJudgeStatusRequest,
    },
    repository::JUDGE_ACCESS_CODE_KEY,
};

/// Fresh codes tried before giving up on a collision streak.
const CODE_ATTEMPTS: usize = 3;

const CODE_COLLISION: &str = "Access code already exists, please try again";

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct JudgeFilter {
    pub college_id: Option<Uuid>,
}

fn is_code_collision(err: &RepoError) -> bool {
    err.is_unique_violation(Some(JUDGE_ACCESS_CODE_KEY))
}

#[utoipa::path(
    get,
    path = "/admin/judges",
    params(JudgeFilter),
    responses((status = 200, description = "Judges, newest first", body = [Judge]))
)]
pub async fn list_judges(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<JudgeFilter>,
) -> Result<Json<Vec<Judge>>, ApiError> {
    Ok(Json(state.repo.list_judges(filter.college_id).await?))
}

/// create_judge
///
/// [Admin Route] Registers an active judge for a college with a fresh access code that
/// expires seven days from now.
#[utoipa::path(
    post,
    path = "/admin/judges",
    request_body = CreateJudgeRequest,
    responses(
        (status = 201, description = "Judge created", body = JudgeResponse),
        (status = 400, description = "Missing fields or unknown college"),
        (status = 409, description = "Access code collision")
    )
)]
pub async fn create_judge(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateJudgeRequest>,
) -> Result<(StatusCode, Json<JudgeResponse>), ApiError> {
    let (Some(name), Some(college_id)) = (required(payload.name), payload.college_id) else {
        return Err(ApiError::bad_request(
            "Judge name and college selection are required",
        ));
    };
    if state.repo.get_college(college_id).await?.is_none() {
        return Err(ApiError::bad_request("College not found"));
    }

    for _ in 0..CODE_ATTEMPTS {
        let new_judge = NewJudge {
            name: name.clone(),
            college_id,
            access_code: generate_access_code(),
            access_code_expires_at: access_code_expiry(Utc::now()),
        };
        match state.repo.create_judge(new_judge).await {
            Ok(judge) => {
                tracing::info!(judge = %judge.id, college = %college_id, "judge created");
                return Ok((
                    StatusCode::CREATED,
                    Json(JudgeResponse {
                        success: "Judge created successfully".to_string(),
                        judge,
                    }),
                ));
            }
            Err(e) if is_code_collision(&e) => {
                tracing::warn!("access code collision while creating judge");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(ApiError::conflict(CODE_COLLISION))
}

/// regenerate_access_code
///
/// [Admin Route] Issues a new code with a new seven-day window and re-activates the
/// judge. The previous code stops working immediately.
#[utoipa::path(
    post,
    path = "/admin/judges/{id}/regenerate",
    params(("id" = Uuid, Path, description = "Judge id")),
    responses(
        (status = 200, description = "New code issued", body = JudgeResponse),
        (status = 404, description = "Judge not found"),
        (status = 409, description = "Access code collision")
    )
)]
pub async fn regenerate_access_code(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<JudgeResponse>, ApiError> {
    for _ in 0..CODE_ATTEMPTS {
        let code = generate_access_code();
        match state
            .repo
            .update_access_code(id, &code, access_code_expiry(Utc::now()))
            .await
        {
            Ok(Some(judge)) => {
                tracing::info!(judge = %judge.id, "access code regenerated");
                return Ok(Json(JudgeResponse {
                    success: "Access code regenerated successfully".to_string(),
                    judge,
                }));
            }
            Ok(None) => return Err(ApiError::not_found("Judge not found")),
            Err(e) if is_code_collision(&e) => {
                tracing::warn!(judge = %id, "access code collision while regenerating");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(ApiError::conflict(CODE_COLLISION))
}

#[utoipa::path(
    put,
    path = "/admin/judges/{id}/status",
    params(("id" = Uuid, Path, description = "Judge id")),
    request_body = SetJudgeStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = MessageResponse),
        (status = 404, description = "Judge not found")
    )
)]
pub async fn set_judge_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<SetJudgeStatusRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.repo.set_judge_active(id, payload.is_active).await? {
        return Err(ApiError::not_found("Judge not found"));
    }

    let verb = if payload.is_active { "activated" } else { "deactivated" };
    tracing::info!(judge = %id, verb, "judge status changed");
    Ok(Json(MessageResponse::new(format!(
        "Judge {verb} successfully"
    ))))
}

/// delete_judge
///
/// [Admin Route] Removes a judge along with their marks and sessions.
#[utoipa::path(
    delete,
    path = "/admin/judges/{id}",
    params(("id" = Uuid, Path, description = "Judge id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Judge not found")
    )
)]
pub async fn delete_judge(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.repo.delete_judge(id).await? {
        return Err(ApiError::not_found("Judge not found"));
    }
    tracing::info!(judge = %id, "judge deleted");
    Ok(Json(MessageResponse::new("Judge deleted successfully")))
}
