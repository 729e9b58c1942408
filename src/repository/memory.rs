use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    collections::BTreeSet,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
};
use uuid::Uuid;

use super::{
    COLLEGE_CODE_KEY, INDIVIDUAL_MARK_KEY, JUDGE_ACCESS_CODE_KEY, Repository,
    STUDENT_ASSIGNED_ROLL_KEY, STUDENT_QR_KEY, STUDENT_ROLL_KEY, TEAM_MARK_KEY,
};
use crate::{
    config::MarkConflictPolicy,
    error::RepoError,
    models::{
        Admin, AdminCredentials, College, DashboardStats, IndividualMark, Judge, MarkDetail,
        MarksStats, NewIndividualMark, NewJudge, NewStudent, NewTeamMark, Session, Student,
        TeamMark, TeamMarkDetail,
    },
};

#[derive(Debug, Clone)]
struct StudentRow {
    id: Uuid,
    college_id: Uuid,
    roll_no: String,
    name: String,
    group_no: String,
    assigned_roll_no: Option<String>,
    qr_code_data: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct JudgeRow {
    id: Uuid,
    name: String,
    college_id: Uuid,
    access_code: String,
    access_code_expires_at: DateTime<Utc>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    admins: Vec<AdminCredentials>,
    sessions: Vec<Session>,
    colleges: Vec<College>,
    students: Vec<StudentRow>,
    judges: Vec<JudgeRow>,
    individual_marks: Vec<IndividualMark>,
    team_marks: Vec<TeamMark>,
}

/// MemoryRepository
///
/// In-process implementation of `Repository` used by the test-suite and for running the
/// API without a database. It enforces the same unique constraints (reported under the
/// schema's constraint names), cascades and orderings as `PostgresRepository`.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
    session_lookups: AtomicUsize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A poisoned lock only means another test thread panicked mid-call.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of individual marks currently stored.
    pub fn individual_mark_count(&self) -> usize {
        self.lock().individual_marks.len()
    }

    /// Number of team marks currently stored.
    pub fn team_mark_count(&self) -> usize {
        self.lock().team_marks.len()
    }

    /// Number of live sessions currently stored.
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// How many times `get_session` has been called.
    pub fn session_lookups(&self) -> usize {
        self.session_lookups.load(Ordering::Relaxed)
    }

    /// Forces a judge's code expiry, e.g. to simulate an expired code.
    pub fn set_judge_expiry(&self, id: Uuid, expires_at: DateTime<Utc>) -> bool {
        let mut tables = self.lock();
        match tables.judges.iter_mut().find(|j| j.id == id) {
            Some(judge) => {
                judge.access_code_expires_at = expires_at;
                true
            }
            None => false,
        }
    }
}

impl Tables {
    fn college(&self, id: Uuid) -> Option<&College> {
        self.colleges.iter().find(|c| c.id == id)
    }

    fn student_view(&self, row: &StudentRow) -> Option<Student> {
        let college = self.college(row.college_id)?;
        Some(Student {
            id: row.id,
            college_id: row.college_id,
            roll_no: row.roll_no.clone(),
            name: row.name.clone(),
            group_no: row.group_no.clone(),
            assigned_roll_no: row.assigned_roll_no.clone(),
            qr_code_data: row.qr_code_data.clone(),
            created_at: row.created_at,
            college_name: college.name.clone(),
            college_code: college.code.clone(),
        })
    }

    fn judge_view(&self, row: &JudgeRow) -> Option<Judge> {
        let college = self.college(row.college_id)?;
        Some(Judge {
            id: row.id,
            name: row.name.clone(),
            college_id: row.college_id,
            access_code: row.access_code.clone(),
            access_code_expires_at: row.access_code_expires_at,
            is_active: row.is_active,
            created_at: row.created_at,
            college_name: college.name.clone(),
            college_code: college.code.clone(),
        })
    }

    fn mark_detail(&self, mark: &IndividualMark) -> Option<MarkDetail> {
        let student = self.students.iter().find(|s| s.id == mark.student_id)?;
        let college = self.college(student.college_id)?;
        let judge = self.judges.iter().find(|j| j.id == mark.judge_id)?;
        Some(MarkDetail {
            id: mark.id,
            student_id: mark.student_id,
            judge_id: mark.judge_id,
            marks: mark.marks,
            comments: mark.comments.clone(),
            created_at: mark.created_at,
            student_name: student.name.clone(),
            roll_no: student.roll_no.clone(),
            assigned_roll_no: student.assigned_roll_no.clone(),
            group_no: student.group_no.clone(),
            college_id: college.id,
            college_name: college.name.clone(),
            college_code: college.code.clone(),
            judge_name: judge.name.clone(),
        })
    }

    fn team_mark_detail(&self, mark: &TeamMark) -> Option<TeamMarkDetail> {
        let college = self.college(mark.college_id)?;
        let judge = self.judges.iter().find(|j| j.id == mark.judge_id)?;
        Some(TeamMarkDetail {
            id: mark.id,
            college_id: mark.college_id,
            group_no: mark.group_no.clone(),
            judge_id: mark.judge_id,
            marks: mark.marks,
            comments: mark.comments.clone(),
            created_at: mark.created_at,
            college_name: college.name.clone(),
            college_code: college.code.clone(),
            judge_name: judge.name.clone(),
        })
    }

    fn students_where(&self, keep: impl Fn(&StudentRow) -> bool) -> Vec<Student> {
        self.students
            .iter()
            .filter(|s| keep(s))
            .filter_map(|s| self.student_view(s))
            .collect()
    }

    fn remove_judge_dependents(&mut self, judge_ids: &[Uuid]) {
        self.individual_marks.retain(|m| !judge_ids.contains(&m.judge_id));
        self.team_marks.retain(|m| !judge_ids.contains(&m.judge_id));
        self.sessions
            .retain(|s| !(s.role == "judge" && judge_ids.contains(&s.subject_id)));
    }
}

// Rows are appended in creation order; "newest first" is the reverse of that order.
fn newest_first<T>(mut rows: Vec<T>) -> Vec<T> {
    rows.reverse();
    rows
}

#[async_trait]
impl Repository for MemoryRepository {
    // --- ADMINS & SESSIONS ---

    async fn get_admin(&self, id: Uuid) -> Option<Admin> {
        self.lock()
            .admins
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .map(Admin::from)
    }

    async fn find_admin_credentials(&self, username: &str) -> Option<AdminCredentials> {
        self.lock()
            .admins
            .iter()
            .find(|a| a.username == username)
            .cloned()
    }

    async fn create_admin(&self, username: &str, password_hash: &str) -> Result<Admin, RepoError> {
        let mut tables = self.lock();
        if tables.admins.iter().any(|a| a.username == username) {
            return Err(RepoError::unique("admins_username_key"));
        }
        let creds = AdminCredentials {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        tables.admins.push(creds.clone());
        Ok(creds.into())
    }

    async fn create_session(&self, session: Session) -> Result<(), RepoError> {
        self.lock().sessions.push(session);
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Option<Session> {
        self.session_lookups.fetch_add(1, Ordering::Relaxed);
        self.lock().sessions.iter().find(|s| s.id == id).cloned()
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut tables = self.lock();
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.id != id);
        Ok(tables.sessions.len() < before)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, RepoError> {
        let mut tables = self.lock();
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.expires_at >= now);
        Ok((before - tables.sessions.len()) as u64)
    }

    // --- COLLEGES ---

    async fn create_college(&self, name: &str, code: &str) -> Result<College, RepoError> {
        let mut tables = self.lock();
        if tables.colleges.iter().any(|c| c.code == code) {
            return Err(RepoError::unique(COLLEGE_CODE_KEY));
        }
        let college = College {
            id: Uuid::new_v4(),
            name: name.to_string(),
            code: code.to_string(),
            created_at: Utc::now(),
        };
        tables.colleges.push(college.clone());
        Ok(college)
    }

    async fn list_colleges(&self) -> Result<Vec<College>, RepoError> {
        Ok(newest_first(self.lock().colleges.clone()))
    }

    async fn get_college(&self, id: Uuid) -> Result<Option<College>, RepoError> {
        Ok(self.lock().college(id).cloned())
    }

    async fn delete_college(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut tables = self.lock();
        let student_ids: Vec<Uuid> = tables
            .students
            .iter()
            .filter(|s| s.college_id == id)
            .map(|s| s.id)
            .collect();
        let judge_ids: Vec<Uuid> = tables
            .judges
            .iter()
            .filter(|j| j.college_id == id)
            .map(|j| j.id)
            .collect();

        tables
            .individual_marks
            .retain(|m| !student_ids.contains(&m.student_id));
        tables.team_marks.retain(|m| m.college_id != id);
        tables.remove_judge_dependents(&judge_ids);
        tables.judges.retain(|j| j.college_id != id);
        tables.students.retain(|s| s.college_id != id);

        let before = tables.colleges.len();
        tables.colleges.retain(|c| c.id != id);
        Ok(tables.colleges.len() < before)
    }

    // --- STUDENTS ---

    async fn insert_students(&self, students: Vec<NewStudent>) -> Result<Vec<Student>, RepoError> {
        let mut tables = self.lock();
        let now = Utc::now();
        let mut staged: Vec<StudentRow> = Vec::with_capacity(students.len());

        // Validate the whole batch before touching the table, like a transaction would.
        for new in students {
            let clashes =
                |row: &StudentRow| row.college_id == new.college_id && row.roll_no == new.roll_no;
            if tables.students.iter().any(clashes) || staged.iter().any(clashes) {
                return Err(RepoError::unique(STUDENT_ROLL_KEY));
            }
            let same_qr = |row: &StudentRow| row.qr_code_data == new.qr_code_data;
            if tables.students.iter().any(same_qr) || staged.iter().any(same_qr) {
                return Err(RepoError::unique(STUDENT_QR_KEY));
            }
            staged.push(StudentRow {
                id: Uuid::new_v4(),
                college_id: new.college_id,
                roll_no: new.roll_no,
                name: new.name,
                group_no: new.group_no,
                assigned_roll_no: None,
                qr_code_data: new.qr_code_data,
                created_at: now,
            });
        }

        let ids: Vec<Uuid> = staged.iter().map(|s| s.id).collect();
        tables.students.extend(staged);

        let mut inserted = tables.students_where(|s| ids.contains(&s.id));
        inserted.sort_by(|a, b| a.roll_no.cmp(&b.roll_no));
        Ok(inserted)
    }

    async fn list_students(
        &self,
        college_id: Option<Uuid>,
        search: Option<&str>,
    ) -> Result<Vec<Student>, RepoError> {
        let needle = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let tables = self.lock();
        let rows = tables.students_where(|s| {
            college_id.is_none_or(|id| s.college_id == id)
                && needle.as_deref().is_none_or(|n| {
                    s.name.to_lowercase().contains(n) || s.roll_no.to_lowercase().contains(n)
                })
        });
        Ok(newest_first(rows))
    }

    async fn list_students_by_roll(&self, college_id: Uuid) -> Result<Vec<Student>, RepoError> {
        let mut rows = self.lock().students_where(|s| s.college_id == college_id);
        rows.sort_by(|a, b| a.roll_no.cmp(&b.roll_no));
        Ok(rows)
    }

    async fn get_student(&self, id: Uuid) -> Result<Option<Student>, RepoError> {
        Ok(self.lock().students_where(|s| s.id == id).into_iter().next())
    }

    async fn find_student_by_assigned_roll(
        &self,
        assigned_roll_no: &str,
    ) -> Result<Option<Student>, RepoError> {
        Ok(self
            .lock()
            .students_where(|s| s.assigned_roll_no.as_deref() == Some(assigned_roll_no))
            .into_iter()
            .next())
    }

    async fn find_student_by_qr(&self, qr_code_data: &str) -> Result<Option<Student>, RepoError> {
        Ok(self
            .lock()
            .students_where(|s| s.qr_code_data == qr_code_data)
            .into_iter()
            .next())
    }

    async fn set_assigned_roll_no(
        &self,
        id: Uuid,
        assigned_roll_no: Option<String>,
    ) -> Result<Option<Student>, RepoError> {
        let mut tables = self.lock();
        if let Some(wanted) = assigned_roll_no.as_deref() {
            if tables
                .students
                .iter()
                .any(|s| s.id != id && s.assigned_roll_no.as_deref() == Some(wanted))
            {
                return Err(RepoError::unique(STUDENT_ASSIGNED_ROLL_KEY));
            }
        }
        let Some(row) = tables.students.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        row.assigned_roll_no = assigned_roll_no;
        let row = row.clone();
        Ok(tables.student_view(&row))
    }

    async fn delete_student(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut tables = self.lock();
        tables.individual_marks.retain(|m| m.student_id != id);
        let before = tables.students.len();
        tables.students.retain(|s| s.id != id);
        Ok(tables.students.len() < before)
    }

    async fn list_groups(&self, college_id: Uuid) -> Result<Vec<String>, RepoError> {
        let groups: BTreeSet<String> = self
            .lock()
            .students
            .iter()
            .filter(|s| s.college_id == college_id)
            .map(|s| s.group_no.clone())
            .collect();
        Ok(groups.into_iter().collect())
    }

    // --- JUDGES ---

    async fn create_judge(&self, judge: NewJudge) -> Result<Judge, RepoError> {
        let mut tables = self.lock();
        if tables.judges.iter().any(|j| j.access_code == judge.access_code) {
            return Err(RepoError::unique(JUDGE_ACCESS_CODE_KEY));
        }
        if tables.college(judge.college_id).is_none() {
            return Err(RepoError::Database(sqlx::Error::RowNotFound));
        }
        let row = JudgeRow {
            id: Uuid::new_v4(),
            name: judge.name,
            college_id: judge.college_id,
            access_code: judge.access_code,
            access_code_expires_at: judge.access_code_expires_at,
            is_active: true,
            created_at: Utc::now(),
        };
        tables.judges.push(row.clone());
        tables
            .judge_view(&row)
            .ok_or(RepoError::Database(sqlx::Error::RowNotFound))
    }

    async fn list_judges(&self, college_id: Option<Uuid>) -> Result<Vec<Judge>, RepoError> {
        let tables = self.lock();
        let rows: Vec<Judge> = tables
            .judges
            .iter()
            .filter(|j| college_id.is_none_or(|id| j.college_id == id))
            .filter_map(|j| tables.judge_view(j))
            .collect();
        Ok(newest_first(rows))
    }

    async fn get_judge(&self, id: Uuid) -> Option<Judge> {
        let tables = self.lock();
        let row = tables.judges.iter().find(|j| j.id == id)?;
        tables.judge_view(row)
    }

    async fn find_judge_by_access_code(&self, access_code: &str) -> Option<Judge> {
        let tables = self.lock();
        let row = tables.judges.iter().find(|j| j.access_code == access_code)?;
        tables.judge_view(row)
    }

    async fn update_access_code(
        &self,
        id: Uuid,
        access_code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<Judge>, RepoError> {
        let mut tables = self.lock();
        if tables
            .judges
            .iter()
            .any(|j| j.id != id && j.access_code == access_code)
        {
            return Err(RepoError::unique(JUDGE_ACCESS_CODE_KEY));
        }
        let Some(row) = tables.judges.iter_mut().find(|j| j.id == id) else {
            return Ok(None);
        };
        row.access_code = access_code.to_string();
        row.access_code_expires_at = expires_at;
        row.is_active = true;
        let row = row.clone();
        Ok(tables.judge_view(&row))
    }

    async fn set_judge_active(&self, id: Uuid, is_active: bool) -> Result<bool, RepoError> {
        let mut tables = self.lock();
        match tables.judges.iter_mut().find(|j| j.id == id) {
            Some(row) => {
                row.is_active = is_active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_judge(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut tables = self.lock();
        tables.remove_judge_dependents(&[id]);
        let before = tables.judges.len();
        tables.judges.retain(|j| j.id != id);
        Ok(tables.judges.len() < before)
    }

    // --- MARKS ---

    async fn save_individual_mark(
        &self,
        mark: NewIndividualMark,
        policy: MarkConflictPolicy,
    ) -> Result<IndividualMark, RepoError> {
        let mut tables = self.lock();
        if let Some(existing) = tables
            .individual_marks
            .iter_mut()
            .find(|m| m.student_id == mark.student_id && m.judge_id == mark.judge_id)
        {
            return match policy {
                MarkConflictPolicy::Reject => Err(RepoError::unique(INDIVIDUAL_MARK_KEY)),
                MarkConflictPolicy::Overwrite => {
                    existing.marks = mark.marks;
                    existing.comments = mark.comments;
                    Ok(existing.clone())
                }
            };
        }
        let row = IndividualMark {
            id: Uuid::new_v4(),
            student_id: mark.student_id,
            judge_id: mark.judge_id,
            marks: mark.marks,
            comments: mark.comments,
            created_at: Utc::now(),
        };
        tables.individual_marks.push(row.clone());
        Ok(row)
    }

    async fn save_team_mark(
        &self,
        mark: NewTeamMark,
        policy: MarkConflictPolicy,
    ) -> Result<TeamMark, RepoError> {
        let mut tables = self.lock();
        if let Some(existing) = tables.team_marks.iter_mut().find(|m| {
            m.college_id == mark.college_id
                && m.group_no == mark.group_no
                && m.judge_id == mark.judge_id
        }) {
            return match policy {
                MarkConflictPolicy::Reject => Err(RepoError::unique(TEAM_MARK_KEY)),
                MarkConflictPolicy::Overwrite => {
                    existing.marks = mark.marks;
                    existing.comments = mark.comments;
                    Ok(existing.clone())
                }
            };
        }
        let row = TeamMark {
            id: Uuid::new_v4(),
            college_id: mark.college_id,
            group_no: mark.group_no,
            judge_id: mark.judge_id,
            marks: mark.marks,
            comments: mark.comments,
            created_at: Utc::now(),
        };
        tables.team_marks.push(row.clone());
        Ok(row)
    }

    async fn list_mark_details(
        &self,
        college_id: Option<Uuid>,
    ) -> Result<Vec<MarkDetail>, RepoError> {
        let tables = self.lock();
        let rows: Vec<MarkDetail> = tables
            .individual_marks
            .iter()
            .filter_map(|m| tables.mark_detail(m))
            .filter(|d| college_id.is_none_or(|id| d.college_id == id))
            .collect();
        Ok(newest_first(rows))
    }

    async fn list_team_mark_details(
        &self,
        college_id: Option<Uuid>,
    ) -> Result<Vec<TeamMarkDetail>, RepoError> {
        let tables = self.lock();
        let rows: Vec<TeamMarkDetail> = tables
            .team_marks
            .iter()
            .filter(|m| college_id.is_none_or(|id| m.college_id == id))
            .filter_map(|m| tables.team_mark_detail(m))
            .collect();
        Ok(newest_first(rows))
    }

    async fn list_judge_marks(&self, judge_id: Uuid) -> Result<Vec<MarkDetail>, RepoError> {
        let tables = self.lock();
        let rows: Vec<MarkDetail> = tables
            .individual_marks
            .iter()
            .filter(|m| m.judge_id == judge_id)
            .filter_map(|m| tables.mark_detail(m))
            .collect();
        Ok(newest_first(rows))
    }

    async fn list_judge_team_marks(
        &self,
        judge_id: Uuid,
    ) -> Result<Vec<TeamMarkDetail>, RepoError> {
        let tables = self.lock();
        let rows: Vec<TeamMarkDetail> = tables
            .team_marks
            .iter()
            .filter(|m| m.judge_id == judge_id)
            .filter_map(|m| tables.team_mark_detail(m))
            .collect();
        Ok(newest_first(rows))
    }

    async fn get_dashboard_stats(&self) -> Result<DashboardStats, RepoError> {
        let tables = self.lock();
        let individual_marks = tables.individual_marks.len() as i64;
        let team_marks = tables.team_marks.len() as i64;
        let students_evaluated = tables
            .individual_marks
            .iter()
            .map(|m| m.student_id)
            .collect::<BTreeSet<_>>()
            .len() as i64;

        Ok(DashboardStats {
            colleges: tables.colleges.len() as i64,
            students: tables.students.len() as i64,
            judges: tables.judges.len() as i64,
            marks: MarksStats {
                total_evaluations: individual_marks + team_marks,
                individual_marks,
                team_marks,
                students_evaluated,
            },
        })
    }
}
