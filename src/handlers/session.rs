use axum::{Json, extract::State};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;

use super::required;
use crate::{
    AppState,
    access_code::{days_left, normalize_access_code},
    auth::{AdminSession, JudgeSession, SessionRole, end_session, start_session},
    error::ApiError,
    extract::ApiJson,
    models::{Admin, AdminLoginRequest, JudgeLoginRequest, JudgeProfile, MessageResponse},
};

fn judge_profile(session: JudgeSession) -> JudgeProfile {
    let days_left = days_left(session.judge.access_code_expires_at, Utc::now());
    JudgeProfile {
        judge: session.judge,
        days_left,
    }
}

/// admin_login
///
/// [Public Route] Verifies the username and bcrypt password hash and opens an admin
/// session. The session cookie is set on the response.
#[utoipa::path(
    post,
    path = "/admin/login",
    request_body = AdminLoginRequest,
    responses(
        (status = 200, description = "Signed in", body = Admin),
        (status = 400, description = "Missing fields"),
        (status = 401, description = "Invalid username or password")
    )
)]
pub async fn admin_login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(payload): ApiJson<AdminLoginRequest>,
) -> Result<(CookieJar, Json<Admin>), ApiError> {
    let (Some(username), Some(password)) = (required(payload.username), payload.password) else {
        return Err(ApiError::bad_request("Username and password are required"));
    };
    if password.is_empty() {
        return Err(ApiError::bad_request("Username and password are required"));
    }

    let invalid = || ApiError::Unauthorized("Invalid username or password".to_string());
    let creds = state
        .repo
        .find_admin_credentials(&username)
        .await
        .ok_or_else(invalid)?;
    // CPU-bound; runs on the blocking pool.
    let hash = creds.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || {
        bcrypt::verify(password, &hash).unwrap_or(false)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("password check failed: {e}")))?;
    if !verified {
        tracing::warn!(%username, "admin login rejected");
        return Err(invalid());
    }

    let cookie = start_session(&state.repo, &state.config, creds.id, SessionRole::Admin).await?;
    Ok((jar.add(cookie), Json(creds.into())))
}

#[utoipa::path(
    post,
    path = "/admin/logout",
    responses((status = 200, description = "Signed out", body = MessageResponse))
)]
pub async fn admin_logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), ApiError> {
    let jar = end_session(&state.repo, &state.config, jar, SessionRole::Admin).await?;
    Ok((jar, Json(MessageResponse::new("Logged out successfully"))))
}

#[utoipa::path(
    get,
    path = "/admin/me",
    responses(
        (status = 200, description = "Current admin", body = Admin),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn admin_me(AdminSession { admin }: AdminSession) -> Json<Admin> {
    Json(admin)
}

/// judge_login
///
/// [Public Route] Signs a judge in with their access code. The code is matched
/// case-insensitively; the judge must be active and the code unexpired.
#[utoipa::path(
    post,
    path = "/judge/login",
    request_body = JudgeLoginRequest,
    responses(
        (status = 200, description = "Signed in", body = JudgeProfile),
        (status = 400, description = "Access code is required"),
        (status = 401, description = "Invalid or expired access code")
    )
)]
pub async fn judge_login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(payload): ApiJson<JudgeLoginRequest>,
) -> Result<(CookieJar, Json<JudgeProfile>), ApiError> {
    let code = required(payload.access_code)
        .map(|code| normalize_access_code(&code))
        .ok_or_else(|| ApiError::bad_request("Access code is required"))?;

    let judge = state
        .repo
        .find_judge_by_access_code(&code)
        .await
        .filter(|judge| judge.can_sign_in(Utc::now()))
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired access code".to_string()))?;

    let cookie = start_session(&state.repo, &state.config, judge.id, SessionRole::Judge).await?;
    Ok((jar.add(cookie), Json(judge_profile(JudgeSession { judge }))))
}

#[utoipa::path(
    post,
    path = "/judge/logout",
    responses((status = 200, description = "Signed out", body = MessageResponse))
)]
pub async fn judge_logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), ApiError> {
    let jar = end_session(&state.repo, &state.config, jar, SessionRole::Judge).await?;
    Ok((jar, Json(MessageResponse::new("Logged out successfully"))))
}

/// judge_me
///
/// [Judge Route] The signed-in judge and the whole days left on their access code.
#[utoipa::path(
    get,
    path = "/judge/me",
    responses(
        (status = 200, description = "Current judge", body = JudgeProfile),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn judge_me(session: JudgeSession) -> Json<JudgeProfile> {
    Json(judge_profile(session))
}
