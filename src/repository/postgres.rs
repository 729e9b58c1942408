use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use uuid::Uuid;

use super::Repository;
use crate::{
    config::MarkConflictPolicy,
    error::RepoError,
    models::{
        Admin, AdminCredentials, College, DashboardStats, IndividualMark, Judge, MarkDetail,
        MarksStats, NewIndividualMark, NewJudge, NewStudent, NewTeamMark, Session, Student,
        TeamMark, TeamMarkDetail,
    },
};

const STUDENT_SELECT: &str = r#"
    SELECT s.id, s.college_id, s.roll_no, s.name, s.group_no, s.assigned_roll_no,
           s.qr_code_data, s.created_at, c.name AS college_name, c.code AS college_code
    FROM students s
    JOIN colleges c ON c.id = s.college_id
"#;

const JUDGE_SELECT: &str = r#"
    SELECT j.id, j.name, j.college_id, j.access_code, j.access_code_expires_at,
           j.is_active, j.created_at, c.name AS college_name, c.code AS college_code
    FROM judges j
    JOIN colleges c ON c.id = j.college_id
"#;

const MARK_DETAIL_SELECT: &str = r#"
    SELECT m.id, m.student_id, m.judge_id, m.marks, m.comments, m.created_at,
           s.name AS student_name, s.roll_no, s.assigned_roll_no, s.group_no,
           s.college_id, c.name AS college_name, c.code AS college_code,
           j.name AS judge_name
    FROM individual_marks m
    JOIN students s ON s.id = m.student_id
    JOIN colleges c ON c.id = s.college_id
    JOIN judges j ON j.id = m.judge_id
"#;

const TEAM_MARK_DETAIL_SELECT: &str = r#"
    SELECT t.id, t.college_id, t.group_no, t.judge_id, t.marks, t.comments, t.created_at,
           c.name AS college_name, c.code AS college_code, j.name AS judge_name
    FROM team_marks t
    JOIN colleges c ON c.id = t.college_id
    JOIN judges j ON j.id = t.judge_id
"#;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Queries are checked at runtime so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn count(&self, sql: &str) -> Result<i64, RepoError> {
        Ok(sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(&self.pool)
            .await?)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- ADMINS & SESSIONS ---

    async fn get_admin(&self, id: Uuid) -> Option<Admin> {
        sqlx::query_as::<_, Admin>("SELECT id, username, created_at FROM admins WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_admin error: {:?}", e);
                None
            })
    }

    async fn find_admin_credentials(&self, username: &str) -> Option<AdminCredentials> {
        sqlx::query_as::<_, AdminCredentials>(
            "SELECT id, username, password_hash, created_at FROM admins WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("find_admin_credentials error: {:?}", e);
            None
        })
    }

    async fn create_admin(&self, username: &str, password_hash: &str) -> Result<Admin, RepoError> {
        Ok(sqlx::query_as::<_, Admin>(
            "INSERT INTO admins (id, username, password_hash, created_at) VALUES ($1, $2, $3, NOW()) RETURNING id, username, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn create_session(&self, session: Session) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO sessions (id, subject_id, role, created_at, expires_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(session.id)
        .bind(session.subject_id)
        .bind(&session.role)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Option<Session> {
        sqlx::query_as::<_, Session>(
            "SELECT id, subject_id, role, created_at, expires_at FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_session error: {:?}", e);
            None
        })
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool, RepoError> {
        let res = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, RepoError> {
        let res = sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    // --- COLLEGES ---

    async fn create_college(&self, name: &str, code: &str) -> Result<College, RepoError> {
        Ok(sqlx::query_as::<_, College>(
            "INSERT INTO colleges (id, name, code, created_at) VALUES ($1, $2, $3, NOW()) RETURNING id, name, code, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(code)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_colleges(&self) -> Result<Vec<College>, RepoError> {
        Ok(sqlx::query_as::<_, College>(
            "SELECT id, name, code, created_at FROM colleges ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_college(&self, id: Uuid) -> Result<Option<College>, RepoError> {
        Ok(sqlx::query_as::<_, College>(
            "SELECT id, name, code, created_at FROM colleges WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// delete_college
    ///
    /// Dependents go first, inside one transaction: marks given to the college's students
    /// or by its judges, team marks, judge sessions, judges, students, then the college.
    async fn delete_college(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"DELETE FROM individual_marks
               WHERE student_id IN (SELECT id FROM students WHERE college_id = $1)
                  OR judge_id IN (SELECT id FROM judges WHERE college_id = $1)"#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            r#"DELETE FROM team_marks
               WHERE college_id = $1
                  OR judge_id IN (SELECT id FROM judges WHERE college_id = $1)"#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM sessions WHERE role = 'judge' AND subject_id IN (SELECT id FROM judges WHERE college_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM judges WHERE college_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM students WHERE college_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let res = sqlx::query("DELETE FROM colleges WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }

    // --- STUDENTS ---

    async fn insert_students(&self, students: Vec<NewStudent>) -> Result<Vec<Student>, RepoError> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(students.len());

        for student in students {
            let id = Uuid::new_v4();
            sqlx::query(
                r#"INSERT INTO students (id, college_id, roll_no, name, group_no, qr_code_data, created_at)
                   VALUES ($1, $2, $3, $4, $5, $6, NOW())"#,
            )
            .bind(id)
            .bind(student.college_id)
            .bind(&student.roll_no)
            .bind(&student.name)
            .bind(&student.group_no)
            .bind(&student.qr_code_data)
            .execute(&mut *tx)
            .await?;
            ids.push(id);
        }

        let inserted = sqlx::query_as::<_, Student>(&format!(
            "{STUDENT_SELECT} WHERE s.id = ANY($1) ORDER BY s.roll_no ASC"
        ))
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(inserted)
    }

    /// list_students
    ///
    /// Uses QueryBuilder so the optional filters stay parameterized.
    async fn list_students(
        &self,
        college_id: Option<Uuid>,
        search: Option<&str>,
    ) -> Result<Vec<Student>, RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(STUDENT_SELECT);
        builder.push(" WHERE TRUE");

        if let Some(id) = college_id {
            builder.push(" AND s.college_id = ").push_bind(id);
        }

        if let Some(s) = search.map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(s));
            builder
                .push(" AND (s.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR s.roll_no ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        builder.push(" ORDER BY s.created_at DESC");

        Ok(builder
            .build_query_as::<Student>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_students_by_roll(&self, college_id: Uuid) -> Result<Vec<Student>, RepoError> {
        Ok(sqlx::query_as::<_, Student>(&format!(
            "{STUDENT_SELECT} WHERE s.college_id = $1 ORDER BY s.roll_no ASC"
        ))
        .bind(college_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_student(&self, id: Uuid) -> Result<Option<Student>, RepoError> {
        Ok(
            sqlx::query_as::<_, Student>(&format!("{STUDENT_SELECT} WHERE s.id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_student_by_assigned_roll(
        &self,
        assigned_roll_no: &str,
    ) -> Result<Option<Student>, RepoError> {
        Ok(sqlx::query_as::<_, Student>(&format!(
            "{STUDENT_SELECT} WHERE s.assigned_roll_no = $1"
        ))
        .bind(assigned_roll_no)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_student_by_qr(&self, qr_code_data: &str) -> Result<Option<Student>, RepoError> {
        Ok(
            sqlx::query_as::<_, Student>(&format!("{STUDENT_SELECT} WHERE s.qr_code_data = $1"))
                .bind(qr_code_data)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn set_assigned_roll_no(
        &self,
        id: Uuid,
        assigned_roll_no: Option<String>,
    ) -> Result<Option<Student>, RepoError> {
        let res = sqlx::query("UPDATE students SET assigned_roll_no = $2 WHERE id = $1")
            .bind(id)
            .bind(assigned_roll_no)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_student(id).await
    }

    async fn delete_student(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM individual_marks WHERE student_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let res = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_groups(&self, college_id: Uuid) -> Result<Vec<String>, RepoError> {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT group_no FROM students WHERE college_id = $1 ORDER BY group_no",
        )
        .bind(college_id)
        .fetch_all(&self.pool)
        .await?)
    }

    // --- JUDGES ---

    /// create_judge
    ///
    /// Uses a CTE to insert and join the college in one round trip.
    async fn create_judge(&self, judge: NewJudge) -> Result<Judge, RepoError> {
        Ok(sqlx::query_as::<_, Judge>(
            r#"
            WITH inserted AS (
                INSERT INTO judges (id, name, college_id, access_code, access_code_expires_at, is_active, created_at)
                VALUES ($1, $2, $3, $4, $5, TRUE, NOW())
                RETURNING id, name, college_id, access_code, access_code_expires_at, is_active, created_at
            )
            SELECT i.id, i.name, i.college_id, i.access_code, i.access_code_expires_at,
                   i.is_active, i.created_at, c.name AS college_name, c.code AS college_code
            FROM inserted i JOIN colleges c ON c.id = i.college_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&judge.name)
        .bind(judge.college_id)
        .bind(&judge.access_code)
        .bind(judge.access_code_expires_at)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_judges(&self, college_id: Option<Uuid>) -> Result<Vec<Judge>, RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(JUDGE_SELECT);
        if let Some(id) = college_id {
            builder.push(" WHERE j.college_id = ").push_bind(id);
        }
        builder.push(" ORDER BY j.created_at DESC");

        Ok(builder
            .build_query_as::<Judge>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_judge(&self, id: Uuid) -> Option<Judge> {
        sqlx::query_as::<_, Judge>(&format!("{JUDGE_SELECT} WHERE j.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_judge error: {:?}", e);
                None
            })
    }

    async fn find_judge_by_access_code(&self, access_code: &str) -> Option<Judge> {
        sqlx::query_as::<_, Judge>(&format!("{JUDGE_SELECT} WHERE j.access_code = $1"))
            .bind(access_code)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("find_judge_by_access_code error: {:?}", e);
                None
            })
    }

    async fn update_access_code(
        &self,
        id: Uuid,
        access_code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<Judge>, RepoError> {
        let res = sqlx::query(
            "UPDATE judges SET access_code = $2, access_code_expires_at = $3, is_active = TRUE WHERE id = $1",
        )
        .bind(id)
        .bind(access_code)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(self.get_judge(id).await)
    }

    async fn set_judge_active(&self, id: Uuid, is_active: bool) -> Result<bool, RepoError> {
        let res = sqlx::query("UPDATE judges SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(is_active)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_judge(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM individual_marks WHERE judge_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM team_marks WHERE judge_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sessions WHERE role = 'judge' AND subject_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let res = sqlx::query("DELETE FROM judges WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }

    // --- MARKS ---

    async fn save_individual_mark(
        &self,
        mark: NewIndividualMark,
        policy: MarkConflictPolicy,
    ) -> Result<IndividualMark, RepoError> {
        let on_conflict = match policy {
            MarkConflictPolicy::Reject => "",
            MarkConflictPolicy::Overwrite => {
                " ON CONFLICT (student_id, judge_id) DO UPDATE SET marks = EXCLUDED.marks, comments = EXCLUDED.comments"
            }
        };
        let sql = format!(
            "INSERT INTO individual_marks (id, student_id, judge_id, marks, comments, created_at) VALUES ($1, $2, $3, $4, $5, NOW()){on_conflict} RETURNING id, student_id, judge_id, marks, comments, created_at"
        );

        Ok(sqlx::query_as::<_, IndividualMark>(&sql)
            .bind(Uuid::new_v4())
            .bind(mark.student_id)
            .bind(mark.judge_id)
            .bind(mark.marks)
            .bind(mark.comments)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn save_team_mark(
        &self,
        mark: NewTeamMark,
        policy: MarkConflictPolicy,
    ) -> Result<TeamMark, RepoError> {
        let on_conflict = match policy {
            MarkConflictPolicy::Reject => "",
            MarkConflictPolicy::Overwrite => {
                " ON CONFLICT (college_id, group_no, judge_id) DO UPDATE SET marks = EXCLUDED.marks, comments = EXCLUDED.comments"
            }
        };
        let sql = format!(
            "INSERT INTO team_marks (id, college_id, group_no, judge_id, marks, comments, created_at) VALUES ($1, $2, $3, $4, $5, $6, NOW()){on_conflict} RETURNING id, college_id, group_no, judge_id, marks, comments, created_at"
        );

        Ok(sqlx::query_as::<_, TeamMark>(&sql)
            .bind(Uuid::new_v4())
            .bind(mark.college_id)
            .bind(&mark.group_no)
            .bind(mark.judge_id)
            .bind(mark.marks)
            .bind(mark.comments)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_mark_details(
        &self,
        college_id: Option<Uuid>,
    ) -> Result<Vec<MarkDetail>, RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(MARK_DETAIL_SELECT);
        if let Some(id) = college_id {
            builder.push(" WHERE s.college_id = ").push_bind(id);
        }
        builder.push(" ORDER BY m.created_at DESC");

        Ok(builder
            .build_query_as::<MarkDetail>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_team_mark_details(
        &self,
        college_id: Option<Uuid>,
    ) -> Result<Vec<TeamMarkDetail>, RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(TEAM_MARK_DETAIL_SELECT);
        if let Some(id) = college_id {
            builder.push(" WHERE t.college_id = ").push_bind(id);
        }
        builder.push(" ORDER BY t.created_at DESC");

        Ok(builder
            .build_query_as::<TeamMarkDetail>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_judge_marks(&self, judge_id: Uuid) -> Result<Vec<MarkDetail>, RepoError> {
        Ok(sqlx::query_as::<_, MarkDetail>(&format!(
            "{MARK_DETAIL_SELECT} WHERE m.judge_id = $1 ORDER BY m.created_at DESC"
        ))
        .bind(judge_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_judge_team_marks(
        &self,
        judge_id: Uuid,
    ) -> Result<Vec<TeamMarkDetail>, RepoError> {
        Ok(sqlx::query_as::<_, TeamMarkDetail>(&format!(
            "{TEAM_MARK_DETAIL_SELECT} WHERE t.judge_id = $1 ORDER BY t.created_at DESC"
        ))
        .bind(judge_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// get_dashboard_stats
    ///
    /// Compiles all dashboard counters in one call.
    async fn get_dashboard_stats(&self) -> Result<DashboardStats, RepoError> {
        let colleges = self.count("SELECT COUNT(*) FROM colleges").await?;
        let students = self.count("SELECT COUNT(*) FROM students").await?;
        let judges = self.count("SELECT COUNT(*) FROM judges").await?;
        let individual_marks = self.count("SELECT COUNT(*) FROM individual_marks").await?;
        let team_marks = self.count("SELECT COUNT(*) FROM team_marks").await?;
        let students_evaluated = self
            .count("SELECT COUNT(DISTINCT student_id) FROM individual_marks")
            .await?;

        Ok(DashboardStats {
            colleges,
            students,
            judges,
            marks: MarksStats {
                total_evaluations: individual_marks + team_marks,
                individual_marks,
                team_marks,
                students_evaluated,
            },
        })
    }
}

/// Escapes LIKE wildcards so user search text matches literally.
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
