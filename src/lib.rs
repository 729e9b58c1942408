use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod access_code;
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod repository;

// Pure helpers behind the reporting and download endpoints.
pub mod export;
pub mod qr;
pub mod report;

// Routing segregation (Public, Admin, Judge, API).
pub mod routes;
use auth::{AdminSession, JudgeSession};
use routes::{admin, api, judge, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{ApiError, RepoError};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::session::admin_login, handlers::session::admin_logout,
        handlers::session::admin_me, handlers::session::judge_login,
        handlers::session::judge_logout, handlers::session::judge_me,
        handlers::colleges::get_dashboard, handlers::colleges::get_evaluations,
        handlers::colleges::list_colleges, handlers::colleges::create_college,
        handlers::colleges::delete_college,
        handlers::students::list_students, handlers::students::upload_students,
        handlers::students::assign_roll_number, handlers::students::delete_student,
        handlers::judges::list_judges, handlers::judges::create_judge,
        handlers::judges::regenerate_access_code, handlers::judges::set_judge_status,
        handlers::judges::delete_judge,
        handlers::marks::submit_marks, handlers::marks::submit_individual_mark,
        handlers::marks::submit_team_mark, handlers::marks::list_teams,
        handlers::marks::judge_evaluations,
        handlers::lookup::find_student, handlers::lookup::get_student_by_roll,
        handlers::lookup::get_student_by_qr,
        handlers::exports::export_evaluations, handlers::exports::download_template,
        handlers::exports::download_qr, handlers::exports::download_mass_qr,
    ),
    components(
        schemas(
            models::Admin, models::College, models::Student, models::Judge,
            models::IndividualMark, models::TeamMark, models::MarkDetail,
            models::TeamMarkDetail, models::StudentTotal, models::MarksStats,
            models::DashboardStats, models::EvaluationsOverview, models::JudgeEvaluations,
            models::JudgeProfile, models::StudentLookup, models::StudentFound,
            models::LookupResult, models::MessageResponse, models::CollegeResponse,
            models::JudgeResponse, models::UploadResponse, models::IndividualMarkResponse,
            models::TeamMarkResponse, models::AdminLoginRequest, models::JudgeLoginRequest,
            models::CreateCollegeRequest, models::CreateJudgeRequest,
            models::SetJudgeStatusRequest, models::AssignRollRequest,
            models::SubmitMarksRequest, models::TeamMarkRequest, models::TemplateRequest,
            export::ExportView, handlers::students::UploadForm,
        )
    ),
    tags(
        (name = "college-eval", description = "College Evaluation Portal API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single, cloneable container shared by every request: the persistence layer and
/// the immutable configuration.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: `PostgresRepository` in production, `MemoryRepository` in tests.
    pub repo: RepositoryState,
    /// Configuration loaded once at startup.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Lets the session extractors pull their dependencies out of the shared state.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// admin_gate
///
/// Route layer for the `/admin` router. Extracting `AdminSession` rejects the request
/// with 401 (and clears the cookie) before any handler runs. The resolved session is
/// stored in the request extensions, where the handler's own `AdminSession` picks it up.
async fn admin_gate(session: AdminSession, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(session);
    next.run(request).await
}

/// judge_gate
///
/// Route layer for the `/judge` router; the judge counterpart of `admin_gate`.
async fn judge_gate(session: JudgeSession, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(session);
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies the session gates and the observability
/// stack, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: health, sign-in and sign-out.
        .merge(public::public_routes())
        // Admin Routes: every handler sits behind the admin session gate.
        .nest(
            "/admin",
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), admin_gate)),
        )
        // Judge Routes: every handler sits behind the judge session gate.
        .nest(
            "/judge",
            judge::judge_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), judge_gate)),
        )
        // API Routes: sessions are checked by the extractor of each handler.
        .nest("/api", api::api_routes())
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: one span per request, tagged with the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the `http_request` span for `TraceLayer`, carrying method, URI and the
/// `x-request-id` set by `SetRequestIdLayer`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
