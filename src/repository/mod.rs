use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    config::MarkConflictPolicy,
    error::RepoError,
    models::{
        Admin, AdminCredentials, College, DashboardStats, IndividualMark, Judge, MarkDetail,
        NewIndividualMark, NewJudge, NewStudent, NewTeamMark, Session, Student, TeamMark,
        TeamMarkDetail,
    },
};

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

// Constraint names shared by the schema in `migrations/` and `MemoryRepository`.
pub const COLLEGE_CODE_KEY: &str = "colleges_code_key";
pub const STUDENT_ROLL_KEY: &str = "students_college_roll_key";
pub const STUDENT_QR_KEY: &str = "students_qr_code_data_key";
pub const STUDENT_ASSIGNED_ROLL_KEY: &str = "students_assigned_roll_no_key";
pub const JUDGE_ACCESS_CODE_KEY: &str = "judges_access_code_key";
pub const INDIVIDUAL_MARK_KEY: &str = "individual_marks_student_judge_key";
pub const TEAM_MARK_KEY: &str = "team_marks_college_group_judge_key";

/// Repository Trait
///
/// The persistence contract used by every handler and by the session extractors.
///
/// Lookups used during authentication return `Option` and log their own failures, so a
/// database hiccup simply fails the session check. Everything else returns
/// `Result<_, RepoError>` so unique violations reach the handler intact.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Admins & Sessions ---
    async fn get_admin(&self, id: Uuid) -> Option<Admin>;
    async fn find_admin_credentials(&self, username: &str) -> Option<AdminCredentials>;
    async fn create_admin(&self, username: &str, password_hash: &str) -> Result<Admin, RepoError>;
    async fn create_session(&self, session: Session) -> Result<(), RepoError>;
    async fn get_session(&self, id: Uuid) -> Option<Session>;
    async fn delete_session(&self, id: Uuid) -> Result<bool, RepoError>;
    /// Deletes every session whose `expires_at` is before `now`; returns how many went.
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, RepoError>;

    // --- Colleges ---
    async fn create_college(&self, name: &str, code: &str) -> Result<College, RepoError>;
    // Newest first.
    async fn list_colleges(&self) -> Result<Vec<College>, RepoError>;
    async fn get_college(&self, id: Uuid) -> Result<Option<College>, RepoError>;
    /// Removes the college together with its students, judges, their marks and sessions.
    async fn delete_college(&self, id: Uuid) -> Result<bool, RepoError>;

    // --- Students ---
    /// All-or-nothing bulk insert; returns the inserted rows ordered by roll number.
    async fn insert_students(&self, students: Vec<NewStudent>) -> Result<Vec<Student>, RepoError>;
    /// Newest first; `search` matches name or roll number, case-insensitively.
    async fn list_students(
        &self,
        college_id: Option<Uuid>,
        search: Option<&str>,
    ) -> Result<Vec<Student>, RepoError>;
    /// One college's students ordered by roll number.
    async fn list_students_by_roll(&self, college_id: Uuid) -> Result<Vec<Student>, RepoError>;
    async fn get_student(&self, id: Uuid) -> Result<Option<Student>, RepoError>;
    async fn find_student_by_assigned_roll(
        &self,
        assigned_roll_no: &str,
    ) -> Result<Option<Student>, RepoError>;
    async fn find_student_by_qr(&self, qr_code_data: &str) -> Result<Option<Student>, RepoError>;
    async fn set_assigned_roll_no(
        &self,
        id: Uuid,
        assigned_roll_no: Option<String>,
    ) -> Result<Option<Student>, RepoError>;
    /// Removes the student's individual marks first.
    async fn delete_student(&self, id: Uuid) -> Result<bool, RepoError>;
    /// Distinct group numbers of a college, sorted.
    async fn list_groups(&self, college_id: Uuid) -> Result<Vec<String>, RepoError>;

    // --- Judges ---
    async fn create_judge(&self, judge: NewJudge) -> Result<Judge, RepoError>;
    // Newest first.
    async fn list_judges(&self, college_id: Option<Uuid>) -> Result<Vec<Judge>, RepoError>;
    async fn get_judge(&self, id: Uuid) -> Option<Judge>;
    async fn find_judge_by_access_code(&self, access_code: &str) -> Option<Judge>;
    /// Installs a new code and expiry and re-activates the judge.
    async fn update_access_code(
        &self,
        id: Uuid,
        access_code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<Judge>, RepoError>;
    async fn set_judge_active(&self, id: Uuid, is_active: bool) -> Result<bool, RepoError>;
    /// Removes the judge's marks and sessions first.
    async fn delete_judge(&self, id: Uuid) -> Result<bool, RepoError>;

    // --- Marks ---
    /// Under `Reject` a second mark for the same (student, judge) is a unique violation;
    /// under `Overwrite` it replaces marks and comments of the existing row.
    async fn save_individual_mark(
        &self,
        mark: NewIndividualMark,
        policy: MarkConflictPolicy,
    ) -> Result<IndividualMark, RepoError>;
    async fn save_team_mark(
        &self,
        mark: NewTeamMark,
        policy: MarkConflictPolicy,
    ) -> Result<TeamMark, RepoError>;
    /// Newest first, optionally restricted to students of one college.
    async fn list_mark_details(&self, college_id: Option<Uuid>)
    -> Result<Vec<MarkDetail>, RepoError>;
    async fn list_team_mark_details(
        &self,
        college_id: Option<Uuid>,
    ) -> Result<Vec<TeamMarkDetail>, RepoError>;
    async fn list_judge_marks(&self, judge_id: Uuid) -> Result<Vec<MarkDetail>, RepoError>;
    async fn list_judge_team_marks(&self, judge_id: Uuid) -> Result<Vec<TeamMarkDetail>, RepoError>;
    async fn get_dashboard_stats(&self) -> Result<DashboardStats, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
