use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};
use college_eval::{
    AppConfig, AppState, MemoryRepository, create_router,
    models::{EvaluationsOverview, Judge, Student},
    repository::{Repository, RepositoryState},
};
use reqwest::{
    Client, StatusCode,
    header::{CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE, SET_COOKIE},
    multipart,
};
use serde_json::{Value, json};
use std::{io::Cursor, sync::Arc};
use tokio::net::TcpListener;

pub struct TestApp {
    pub address: String,
    pub repo: Arc<MemoryRepository>,
    pub client: Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

/// Serves the real router on an ephemeral port, backed by `MemoryRepository`, with
/// one admin (`admin` / `admin-password`).
async fn spawn_app() -> TestApp {
    let repo = Arc::new(MemoryRepository::new());
    let hash = bcrypt::hash("admin-password", 4).expect("hash");
    repo.create_admin("admin", &hash).await.expect("seed admin");

    let state = AppState {
        repo: repo.clone() as RepositoryState,
        config: AppConfig::default(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        repo,
        client: Client::new(),
    }
}

/// `name=value` from the response's Set-Cookie header.
fn session_cookie(response: &reqwest::Response) -> String {
    let raw = response
        .headers()
        .get(SET_COOKIE)
        .expect("login sets a cookie")
        .to_str()
        .unwrap();
    raw.split(';').next().unwrap().to_string()
}

async fn admin_login(app: &TestApp) -> String {
    let response = app
        .client
        .post(app.url("/admin/login"))
        .json(&json!({"username": "admin", "password": "admin-password"}))
        .send()
        .await
        .expect("login request");
    assert_eq!(response.status(), StatusCode::OK);
    session_cookie(&response)
}

fn sheet_rows(bytes: &[u8]) -> Vec<Vec<Data>> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes.to_vec())).unwrap();
    let range = workbook.worksheet_range_at(0).unwrap().unwrap();
    range.rows().map(|r| r.to_vec()).collect()
}

// --- Tests ---

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/health")).send().await.expect("req fail");
    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_openapi_document_lists_endpoints() {
    let app = spawn_app().await;
    let doc: Value = app
        .client
        .get(app.url("/api-docs/openapi.json"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(doc["paths"]["/api/submit-marks"].is_object());
    assert!(doc["paths"]["/admin/colleges"].is_object());
}

#[tokio::test]
async fn test_submit_marks_without_session_is_unauthorized() {
    let app = spawn_app().await;
    let response = app
        .client
        .post(app.url("/api/submit-marks"))
        .json(&json!({"studentId": uuid::Uuid::new_v4(), "marks": 50}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A forged cookie is no better.
    let response = app
        .client
        .post(app.url("/api/submit-marks"))
        .header(COOKIE, "judge-session=eyJhbGciOiJIUzI1NiJ9.e30.bogus")
        .json(&json!({"studentId": uuid::Uuid::new_v4(), "marks": 50}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.repo.individual_mark_count(), 0);
}

#[tokio::test]
async fn test_full_evaluation_flow() {
    let app = spawn_app().await;
    let admin = admin_login(&app).await;

    // 1. College
    let response = app
        .client
        .post(app.url("/admin/colleges"))
        .header(COOKIE, &admin)
        .json(&json!({"name": "Springfield Tech", "code": "spt"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    let college_id = body["college"]["id"].as_str().unwrap().to_string();

    // 2. Template download, then upload it back unchanged.
    let response = app
        .client
        .post(app.url("/api/download-template"))
        .header(COOKIE, &admin)
        .json(&json!({"collegeId": college_id}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("SPT_Student_Template.xlsx")
    );
    let template = response.bytes().await.unwrap().to_vec();

    let upload = |bytes: Vec<u8>| {
        multipart::Form::new()
            .text("collegeId", college_id.clone())
            .part("file", multipart::Part::bytes(bytes).file_name("students.xlsx"))
    };
    let response = app
        .client
        .post(app.url("/admin/students/upload"))
        .header(COOKIE, &admin)
        .multipart(upload(template.clone()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], "Successfully uploaded 3 students");
    let students: Vec<Student> = serde_json::from_value(body["students"].clone()).unwrap();
    assert_eq!(students[0].roll_no, "CS001");

    // Uploading the same rows again clashes on roll numbers.
    let response = app
        .client
        .post(app.url("/admin/students/upload"))
        .header(COOKIE, &admin)
        .multipart(upload(template))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Some roll numbers already exist for this college");

    // 3. Judge
    let response = app
        .client
        .post(app.url("/admin/judges"))
        .header(COOKIE, &admin)
        .json(&json!({"name": "Judge One", "collegeId": college_id}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    let judge: Judge = serde_json::from_value(body["judge"].clone()).unwrap();

    let response = app
        .client
        .post(app.url("/judge/login"))
        .json(&json!({"accessCode": judge.access_code.to_lowercase()}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let judge_cookie = session_cookie(&response);

    // 4. Marks
    for (student, marks) in [(&students[0], 90.0), (&students[1], 72.5)] {
        let response = app
            .client
            .post(app.url("/api/submit-marks"))
            .header(COOKIE, &judge_cookie)
            .json(&json!({"studentId": student.id, "marks": marks, "comments": "well done"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app
        .client
        .post(app.url("/api/submit-marks"))
        .header(COOKIE, &judge_cookie)
        .json(&json!({"studentId": students[0].id, "marks": 10}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // 5. Review and export agree on the totals.
    let overview: EvaluationsOverview = app
        .client
        .get(app.url("/admin/evaluations"))
        .header(COOKIE, &admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(overview.stats.individual_marks, 2);

    let response = app
        .client
        .get(app.url("/api/export-evaluations?view=students"))
        .header(COOKIE, &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("application/vnd.openxmlformats")
    );
    let rows = sheet_rows(&response.bytes().await.unwrap());
    assert_eq!(rows.len(), overview.totals.len() + 1);
    for (row, total) in rows[1..].iter().zip(&overview.totals) {
        assert_eq!(row[1], Data::String(total.roll_no.clone()));
        assert_eq!(row[6], Data::Float(total.total));
    }

    let response = app
        .client
        .get(app.url(&format!("/api/export-evaluations?collegeId={college_id}")))
        .header(COOKIE, &admin)
        .send()
        .await
        .unwrap();
    assert!(
        response.headers()[CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("SPT_Evaluations_")
    );
    let rows = sheet_rows(&response.bytes().await.unwrap());
    assert_eq!(rows.len(), overview.marks.len() + 1);

    // Judges cannot export.
    let response = app
        .client
        .get(app.url("/api/export-evaluations"))
        .header(COOKIE, &judge_cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // 6. Logout ends the judge session server-side.
    let response = app
        .client
        .post(app.url("/judge/logout"))
        .header(COOKIE, &judge_cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app
        .client
        .post(app.url("/api/submit-marks"))
        .header(COOKIE, &judge_cookie)
        .json(&json!({"studentId": students[2].id, "marks": 50}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.repo.individual_mark_count(), 2);
}
