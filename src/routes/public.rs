use crate::{AppState, handlers::session};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that work without a session: the health probe and the sign-in/sign-out
/// pair of each portal. Sign-out is public so a stale cookie can always be cleared.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /admin/login, /admin/logout
        .route("/admin/login", post(session::admin_login))
        .route("/admin/logout", post(session::admin_logout))
        // POST /judge/login, /judge/logout
        // Judges sign in with their 8-character access code.
        .route("/judge/login", post(session::judge_login))
        .route("/judge/logout", post(session::judge_logout))
}
