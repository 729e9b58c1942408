use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::{Admin, Judge, Session},
    repository::RepositoryState,
};

pub const ADMIN_COOKIE: &str = "admin-session";
pub const JUDGE_COOKIE: &str = "judge-session";

/// Lifetime of a session row, its token and its cookie.
pub const SESSION_TTL_DAYS: i64 = 7;

/// SessionRole
///
/// Which of the two portals a session belongs to. Stored as `admin` / `judge` in the
/// `sessions.role` column and in the token claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    Admin,
    Judge,
}

impl SessionRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Judge => "judge",
        }
    }

    pub fn cookie_name(self) -> &'static str {
        match self {
            Self::Admin => ADMIN_COOKIE,
            Self::Judge => JUDGE_COOKIE,
        }
    }

    // Header accepted instead of a cookie in `Env::Local`.
    fn bypass_header(self) -> &'static str {
        match self {
            Self::Admin => "x-admin-id",
            Self::Judge => "x-judge-id",
        }
    }
}

/// SessionClaims
///
/// Payload of the signed session token. The token is only a pointer: the session row it
/// names (`sid`) must still exist for the token to be accepted.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Admin or judge id.
    pub sub: Uuid,
    /// Session row id.
    pub sid: Uuid,
    pub role: SessionRole,
    pub iat: usize,
    pub exp: usize,
}

/// Signs an HS256 token for `session`.
pub fn issue_token(
    secret: &str,
    session: &Session,
    role: SessionRole,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = SessionClaims {
        sub: session.subject_id,
        sid: session.id,
        role,
        iat: session.created_at.timestamp() as usize,
        exp: session.expires_at.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verifies signature and expiry. Any failure yields `None`.
pub fn decode_token(secret: &str, token: &str) -> Option<SessionClaims> {
    decode_claims(secret, token, true)
}

fn decode_claims(secret: &str, token: &str, validate_exp: bool) -> Option<SessionClaims> {
    let mut validation = Validation::default();
    validation.validate_exp = validate_exp;

    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .ok()
}

pub fn session_cookie(role: SessionRole, token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((role.cookie_name(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::days(SESSION_TTL_DAYS))
        .build()
}

/// An already-expired cookie that makes the browser drop the session cookie.
pub fn removal_cookie(role: SessionRole) -> Cookie<'static> {
    Cookie::build((role.cookie_name(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}

/// start_session
///
/// Persists a new session row for `subject_id` and returns the cookie carrying its
/// signed token. Rows whose expiry has passed are purged first.
pub async fn start_session(
    repo: &RepositoryState,
    config: &AppConfig,
    subject_id: Uuid,
    role: SessionRole,
) -> Result<Cookie<'static>, ApiError> {
    let now = Utc::now();
    let purged = repo.delete_expired_sessions(now).await?;
    if purged > 0 {
        tracing::debug!(purged, "expired sessions removed");
    }

    let session = Session {
        id: Uuid::new_v4(),
        subject_id,
        role: role.as_str().to_string(),
        created_at: now,
        expires_at: now + Duration::days(SESSION_TTL_DAYS),
    };
    repo.create_session(session.clone()).await?;

    let token = issue_token(&config.session_secret, &session, role)
        .map_err(|e| ApiError::Internal(format!("failed to sign session token: {e}")))?;
    tracing::info!(subject = %subject_id, role = role.as_str(), "session started");

    Ok(session_cookie(role, token, config.secure_cookies()))
}

/// end_session
///
/// Deletes the session row named by the request's cookie (if it carries a token signed
/// with our secret, expired or not) and returns the jar with the cookie cleared.
/// Logging out without a session is not an error.
pub async fn end_session(
    repo: &RepositoryState,
    config: &AppConfig,
    jar: CookieJar,
    role: SessionRole,
) -> Result<CookieJar, ApiError> {
    let claims = jar
        .get(role.cookie_name())
        .and_then(|cookie| decode_claims(&config.session_secret, cookie.value(), false));

    if let Some(claims) = claims {
        repo.delete_session(claims.sid).await?;
        tracing::info!(subject = %claims.sub, role = role.as_str(), "session ended");
    }

    Ok(jar.add(removal_cookie(role)))
}

/// AuthRejection
///
/// 401 with `{"error": ...}`; also clears the stale cookie of the rejected role.
#[derive(Debug)]
pub struct AuthRejection {
    pub role: SessionRole,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let jar = CookieJar::new().add(removal_cookie(self.role));
        (
            StatusCode::UNAUTHORIZED,
            jar,
            Json(json!({ "error": "Unauthorized" })),
        )
            .into_response()
    }
}

/// Resolves the subject id of the request for `role`.
///
/// In `Env::Local` a bypass header holding a subject id is accepted. Otherwise the
/// session cookie must hold a valid token whose session row still exists, is unexpired
/// and belongs to the same subject and role.
async fn authenticate(
    parts: &Parts,
    repo: &RepositoryState,
    config: &AppConfig,
    role: SessionRole,
) -> Option<Uuid> {
    if config.env == Env::Local {
        let bypass = parts
            .headers
            .get(role.bypass_header())
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok());
        if bypass.is_some() {
            return bypass;
        }
    }

    let jar = CookieJar::from_headers(&parts.headers);
    let claims = decode_token(&config.session_secret, jar.get(role.cookie_name())?.value())?;
    if claims.role != role {
        return None;
    }

    let session = repo.get_session(claims.sid).await?;
    let valid = session.subject_id == claims.sub
        && session.role == role.as_str()
        && session.expires_at > Utc::now();
    valid.then_some(claims.sub)
}

/// AdminSession Extractor
///
/// Resolves the signed-in administrator. The admin row is re-read on every request, so
/// deleting an admin ends their sessions immediately.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub admin: Admin,
}

impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Already resolved by the `/admin` gate.
        if let Some(session) = parts.extensions.get::<AdminSession>() {
            return Ok(session.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        let reject = || AuthRejection {
            role: SessionRole::Admin,
        };

        let admin_id = authenticate(parts, &repo, &config, SessionRole::Admin)
            .await
            .ok_or_else(reject)?;
        let admin = repo.get_admin(admin_id).await.ok_or_else(reject)?;

        Ok(AdminSession { admin })
    }
}

/// JudgeSession Extractor
///
/// Resolves the signed-in judge. Deactivating a judge or letting their access code
/// expire revokes every live session on the next request.
#[derive(Debug, Clone)]
pub struct JudgeSession {
    pub judge: Judge,
}

impl<S> FromRequestParts<S> for JudgeSession
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<JudgeSession>() {
            return Ok(session.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        let reject = || AuthRejection {
            role: SessionRole::Judge,
        };

        let judge_id = authenticate(parts, &repo, &config, SessionRole::Judge)
            .await
            .ok_or_else(reject)?;
        let judge = repo
            .get_judge(judge_id)
            .await
            .filter(|judge| judge.can_sign_in(Utc::now()))
            .ok_or_else(reject)?;

        Ok(JudgeSession { judge })
    }
}
