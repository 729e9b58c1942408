use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Records (Mapped to Database) ---

/// Admin
///
/// Public view of a row in `admins`. The password hash never leaves the repository
/// except through `AdminCredentials`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Admin {
    pub id: Uuid,
    pub username: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// AdminCredentials
///
/// Internal row used only while verifying a login.
#[derive(Debug, Clone, FromRow)]
pub struct AdminCredentials {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<AdminCredentials> for Admin {
    fn from(creds: AdminCredentials) -> Self {
        Admin {
            id: creds.id,
            username: creds.username,
            created_at: creds.created_at,
        }
    }
}

/// College
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct College {
    pub id: Uuid,
    pub name: String,
    // Always stored trimmed and upper-cased; unique across colleges.
    pub code: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Student
///
/// A row of `students` joined with the owning college's name and code.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Student {
    pub id: Uuid,
    pub college_id: Uuid,
    pub roll_no: String,
    pub name: String,
    pub group_no: String,
    // Secondary identifier judges type in to find a student.
    pub assigned_roll_no: Option<String>,
    // Payload encoded into the student's QR code.
    pub qr_code_data: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub college_name: String,
    pub college_code: String,
}

/// NewStudent
///
/// A student row ready for insertion, produced by the spreadsheet upload.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStudent {
    pub college_id: Uuid,
    pub roll_no: String,
    pub name: String,
    pub group_no: String,
    pub qr_code_data: String,
}

/// Judge
///
/// A row of `judges` joined with the college the judge belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Judge {
    pub id: Uuid,
    pub name: String,
    pub college_id: Uuid,
    pub access_code: String,
    #[ts(type = "string")]
    pub access_code_expires_at: DateTime<Utc>,
    pub is_active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub college_name: String,
    pub college_code: String,
}

impl Judge {
    /// A judge may sign in (and keep a session) only while active and unexpired.
    pub fn can_sign_in(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now <= self.access_code_expires_at
    }
}

#[derive(Debug, Clone)]
pub struct NewJudge {
    pub name: String,
    pub college_id: Uuid,
    pub access_code: String,
    pub access_code_expires_at: DateTime<Utc>,
}

/// IndividualMark
///
/// One judge's score for one student.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct IndividualMark {
    pub id: Uuid,
    pub student_id: Uuid,
    pub judge_id: Uuid,
    pub marks: f64,
    pub comments: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewIndividualMark {
    pub student_id: Uuid,
    pub judge_id: Uuid,
    pub marks: f64,
    pub comments: Option<String>,
}

/// TeamMark
///
/// One judge's score for a group of students within a college.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct TeamMark {
    pub id: Uuid,
    pub college_id: Uuid,
    pub group_no: String,
    pub judge_id: Uuid,
    pub marks: f64,
    pub comments: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTeamMark {
    pub college_id: Uuid,
    pub group_no: String,
    pub judge_id: Uuid,
    pub marks: f64,
    pub comments: Option<String>,
}

/// Session
///
/// Server-side session row. The cookie token only carries its id, signed.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// --- Joined Views (Output) ---

/// MarkDetail
///
/// An individual mark enriched with the student, college and judge it refers to.
/// This is the row shape of the admin evaluations view and the spreadsheet export.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct MarkDetail {
    pub id: Uuid,
    pub student_id: Uuid,
    pub judge_id: Uuid,
    pub marks: f64,
    pub comments: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub student_name: String,
    pub roll_no: String,
    pub assigned_roll_no: Option<String>,
    pub group_no: String,
    pub college_id: Uuid,
    pub college_name: String,
    pub college_code: String,
    pub judge_name: String,
}

/// TeamMarkDetail
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct TeamMarkDetail {
    pub id: Uuid,
    pub college_id: Uuid,
    pub group_no: String,
    pub judge_id: Uuid,
    pub marks: f64,
    pub comments: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub college_name: String,
    pub college_code: String,
    pub judge_name: String,
}

/// StudentTotal
///
/// All individual marks one student received, with their running total.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct StudentTotal {
    pub student_id: Uuid,
    pub student_name: String,
    pub roll_no: String,
    pub assigned_roll_no: Option<String>,
    pub group_no: String,
    pub college_name: String,
    pub evaluations: u32,
    pub total: f64,
    pub average: f64,
    pub marks: Vec<MarkDetail>,
}

/// MarksStats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MarksStats {
    pub total_evaluations: i64,
    pub individual_marks: i64,
    pub team_marks: i64,
    pub students_evaluated: i64,
}

/// DashboardStats
///
/// Output schema for the administrative dashboard (GET /admin/dashboard).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DashboardStats {
    pub colleges: i64,
    pub students: i64,
    pub judges: i64,
    pub marks: MarksStats,
}

/// EvaluationsOverview
///
/// Output schema for GET /admin/evaluations.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct EvaluationsOverview {
    pub stats: MarksStats,
    pub marks: Vec<MarkDetail>,
    pub totals: Vec<StudentTotal>,
    pub team_marks: Vec<TeamMarkDetail>,
}

/// JudgeEvaluations
///
/// A judge's own submissions (GET /judge/evaluations).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct JudgeEvaluations {
    pub individual: Vec<MarkDetail>,
    pub team: Vec<TeamMarkDetail>,
}

/// JudgeProfile
///
/// Output of GET /judge/me: the signed-in judge plus whole days until the code expires.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct JudgeProfile {
    pub judge: Judge,
    pub days_left: i64,
}

/// StudentLookup
///
/// The slim student shape returned by the judge lookup endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct StudentLookup {
    pub id: Uuid,
    pub name: String,
    pub roll_no: String,
    pub assigned_roll_no: Option<String>,
    pub group_no: String,
    pub college_name: String,
}

impl From<Student> for StudentLookup {
    fn from(student: Student) -> Self {
        StudentLookup {
            id: student.id,
            name: student.name,
            roll_no: student.roll_no,
            assigned_roll_no: student.assigned_roll_no,
            group_no: student.group_no,
            college_name: student.college_name,
        }
    }
}

/// StudentFound
///
/// Output of GET /api/find-student.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct StudentFound {
    pub student: StudentLookup,
}

/// LookupResult
///
/// Output of the scanner-facing lookups: `{success: true, student}` or
/// `{success: false, error}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LookupResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student: Option<StudentLookup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LookupResult {
    pub fn found(student: Student) -> Self {
        Self {
            success: true,
            student: Some(student.into()),
            error: None,
        }
    }

    pub fn missing(error: impl Into<String>) -> Self {
        Self {
            success: false,
            student: None,
            error: Some(error.into()),
        }
    }
}

/// MessageResponse
///
/// `{ "success": "<message>" }` returned by actions that have nothing else to report.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub success: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CollegeResponse {
    pub success: String,
    pub college: College,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct JudgeResponse {
    pub success: String,
    pub judge: Judge,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UploadResponse {
    pub success: String,
    pub students: Vec<Student>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct IndividualMarkResponse {
    pub success: String,
    pub mark: IndividualMark,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TeamMarkResponse {
    pub success: String,
    pub mark: TeamMark,
}

// --- Request Payloads (Input Schemas) ---
//
// Required fields are modelled as `Option` so a missing field yields the portal's own
// 400 message instead of a generic deserialization rejection.

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminLoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct JudgeLoginRequest {
    pub access_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCollegeRequest {
    pub name: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateJudgeRequest {
    pub name: Option<String>,
    pub college_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SetJudgeStatusRequest {
    pub is_active: bool,
}

/// AssignRollRequest
///
/// `null` or an empty string clears the assigned roll number.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AssignRollRequest {
    pub assigned_roll_no: Option<String>,
}

/// SubmitMarksRequest
///
/// Body of POST /api/submit-marks and POST /judge/marks/individual. The judge is never
/// part of the body; it comes from the judge session.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SubmitMarksRequest {
    pub student_id: Option<Uuid>,
    pub marks: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TeamMarkRequest {
    pub college_id: Option<Uuid>,
    pub group_no: Option<String>,
    pub marks: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TemplateRequest {
    pub college_id: Option<Uuid>,
}
