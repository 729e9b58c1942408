use chrono::{Duration, Utc};
use college_eval::{
    config::MarkConflictPolicy,
    models::{NewIndividualMark, NewJudge, NewStudent, NewTeamMark},
    repository::{
        COLLEGE_CODE_KEY, INDIVIDUAL_MARK_KEY, PostgresRepository, Repository, STUDENT_ROLL_KEY,
    },
};
use sqlx::PgPool;
use uuid::Uuid;

// These tests need a disposable Postgres database:
//   DATABASE_URL=postgres://... cargo test --test repository_integration_tests -- --ignored

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

/// Codes must be unique across test runs sharing one database.
fn unique_code(prefix: &str) -> String {
    format!("{prefix}{}", &Uuid::new_v4().simple().to_string()[..8]).to_uppercase()
}

fn students_for(college_id: Uuid, rolls: &[&str]) -> Vec<NewStudent> {
    let stamp = Utc::now().timestamp_millis();
    rolls
        .iter()
        .map(|roll| NewStudent {
            college_id,
            roll_no: roll.to_string(),
            name: format!("Student {roll}"),
            group_no: "G1".to_string(),
            qr_code_data: format!("{college_id}-{roll}-{stamp}"),
        })
        .collect()
}

async fn new_judge(repo: &PostgresRepository, college_id: Uuid) -> college_eval::models::Judge {
    repo.create_judge(NewJudge {
        name: "Judge".to_string(),
        college_id,
        access_code: unique_code("")[..8].to_string(),
        access_code_expires_at: Utc::now() + Duration::days(7),
    })
    .await
    .expect("create judge")
}

// --- Tests ---

#[tokio::test]
#[ignore]
async fn test_duplicate_college_code_is_a_unique_violation() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let code = unique_code("DUP");

    repo.create_college("First", &code).await.unwrap();
    let err = repo.create_college("Second", &code).await.unwrap_err();
    assert!(err.is_unique_violation(Some(COLLEGE_CODE_KEY)));
}

#[tokio::test]
#[ignore]
async fn test_student_batch_is_all_or_nothing() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let college = repo.create_college("Batch", &unique_code("B")).await.unwrap();

    let inserted = repo
        .insert_students(students_for(college.id, &["R2", "R1"]))
        .await
        .unwrap();
    let rolls: Vec<&str> = inserted.iter().map(|s| s.roll_no.as_str()).collect();
    assert_eq!(rolls, ["R1", "R2"]);
    assert_eq!(inserted[0].college_code, college.code);

    let err = repo
        .insert_students(students_for(college.id, &["R3", "R1"]))
        .await
        .unwrap_err();
    assert!(err.is_unique_violation(Some(STUDENT_ROLL_KEY)));
    assert_eq!(repo.list_students_by_roll(college.id).await.unwrap().len(), 2);
}

#[tokio::test]
#[ignore]
async fn test_mark_conflict_policies() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let college = repo.create_college("Marks", &unique_code("M")).await.unwrap();
    let student = repo
        .insert_students(students_for(college.id, &["S1"]))
        .await
        .unwrap()
        .remove(0);
    let judge = new_judge(&repo, college.id).await;

    let mark = |marks: f64| NewIndividualMark {
        student_id: student.id,
        judge_id: judge.id,
        marks,
        comments: None,
    };

    repo.save_individual_mark(mark(10.0), MarkConflictPolicy::Reject)
        .await
        .unwrap();
    let err = repo
        .save_individual_mark(mark(20.0), MarkConflictPolicy::Reject)
        .await
        .unwrap_err();
    assert!(err.is_unique_violation(Some(INDIVIDUAL_MARK_KEY)));

    let updated = repo
        .save_individual_mark(mark(30.0), MarkConflictPolicy::Overwrite)
        .await
        .unwrap();
    assert_eq!(updated.marks, 30.0);
    assert_eq!(repo.list_judge_marks(judge.id).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore]
async fn test_delete_college_cascades() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let college = repo.create_college("Cascade", &unique_code("C")).await.unwrap();
    let student = repo
        .insert_students(students_for(college.id, &["S1"]))
        .await
        .unwrap()
        .remove(0);
    let judge = new_judge(&repo, college.id).await;

    repo.save_individual_mark(
        NewIndividualMark {
            student_id: student.id,
            judge_id: judge.id,
            marks: 50.0,
            comments: Some("ok".to_string()),
        },
        MarkConflictPolicy::Reject,
    )
    .await
    .unwrap();
    repo.save_team_mark(
        NewTeamMark {
            college_id: college.id,
            group_no: "G1".to_string(),
            judge_id: judge.id,
            marks: 70.0,
            comments: None,
        },
        MarkConflictPolicy::Reject,
    )
    .await
    .unwrap();
    assert_eq!(repo.list_mark_details(Some(college.id)).await.unwrap().len(), 1);

    assert!(repo.delete_college(college.id).await.unwrap());
    assert!(repo.list_mark_details(Some(college.id)).await.unwrap().is_empty());
    assert!(repo.list_team_mark_details(Some(college.id)).await.unwrap().is_empty());
    assert!(repo.get_judge(judge.id).await.is_none());
    assert!(repo.get_student(student.id).await.unwrap().is_none());
    assert!(!repo.delete_college(college.id).await.unwrap());
}
