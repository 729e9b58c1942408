use crate::{
    AppState,
    handlers::{colleges, judges, session, students},
};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Admin Router Module
///
/// Registration and review of colleges, students and judges. Mounted under `/admin`
/// and wrapped by the admin session gate, so no handler here runs without a valid
/// admin session.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(session::admin_me))
        // GET /admin/dashboard
        // Counts of colleges, students, judges and marks.
        .route("/dashboard", get(colleges::get_dashboard))
        // GET /admin/evaluations?collegeId=&search=
        // Mark rows, per-student totals and team marks.
        .route("/evaluations", get(colleges::get_evaluations))
        // --- Colleges ---
        .route(
            "/colleges",
            get(colleges::list_colleges).post(colleges::create_college),
        )
        // Cascades to students, judges and their marks.
        .route("/colleges/{id}", delete(colleges::delete_college))
        // --- Students ---
        .route("/students", get(students::list_students))
        // Multipart: `collegeId` + `file` (xlsx laid out like the download template).
        .route("/students/upload", post(students::upload_students))
        .route(
            "/students/{id}/assigned-roll",
            put(students::assign_roll_number),
        )
        .route("/students/{id}", delete(students::delete_student))
        // --- Judges ---
        .route(
            "/judges",
            get(judges::list_judges).post(judges::create_judge),
        )
        // New access code, new 7-day window, re-activated.
        .route(
            "/judges/{id}/regenerate",
            post(judges::regenerate_access_code),
        )
        .route("/judges/{id}/status", put(judges::set_judge_status))
        .route("/judges/{id}", delete(judges::delete_judge))
}
