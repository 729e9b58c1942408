use crate::{
    AppState,
    handlers::{marks, session},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Judge Router Module
///
/// The judge portal. Mounted under `/judge` behind the judge session gate; handlers
/// still take `JudgeSession` to learn which judge is acting.
pub fn judge_routes() -> Router<AppState> {
    Router::new()
        // GET /judge/me
        // Profile plus days left on the access code.
        .route("/me", get(session::judge_me))
        // GET /judge/teams
        // Group numbers of the judge's college.
        .route("/teams", get(marks::list_teams))
        // GET /judge/evaluations
        .route("/evaluations", get(marks::judge_evaluations))
        .route("/marks/individual", post(marks::submit_individual_mark))
        .route("/marks/team", post(marks::submit_team_mark))
}
