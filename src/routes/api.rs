use crate::{
    AppState,
    handlers::{exports, lookup, marks},
};
use axum::{
    Router,
    routing::{get, post},
};

/// API Router Module
///
/// Endpoints called from the portals' scripts. No router-level gate: each handler takes
/// `JudgeSession` (mark submission and student lookups) or `AdminSession` (exports and
/// QR downloads) and is rejected with 401 without one.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // --- Judge ---
        // POST /api/submit-marks
        // The judge comes from the session cookie, never from the body.
        .route("/submit-marks", post(marks::submit_marks))
        .route("/find-student", get(lookup::find_student))
        // Always 200; a miss is reported as `{success: false, error}`.
        .route("/get-student-by-roll", get(lookup::get_student_by_roll))
        .route("/get-student-by-qr", get(lookup::get_student_by_qr))
        // --- Admin ---
        // GET /api/export-evaluations?collegeId=&view=marks|students
        .route("/export-evaluations", get(exports::export_evaluations))
        .route("/download-qr", get(exports::download_qr))
        .route("/download-mass-qr", get(exports::download_mass_qr))
        .route("/download-template", post(exports::download_template))
}
