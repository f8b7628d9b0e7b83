use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::{Attendance, AttendanceKey, Mark, MarkKey, Student, Subject};
use crate::database::store::{
    Commit, GradebookStore, RecordFilter, RecordWrite, StoreError, StoreResult,
};

/// Schema, applied statement by statement by `PgStore::migrate`
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS subjects (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        code TEXT NOT NULL UNIQUE,
        department TEXT NOT NULL,
        semester SMALLINT NOT NULL CHECK (semester BETWEEN 1 AND 8),
        year SMALLINT NOT NULL CHECK (year BETWEEN 1 AND 4),
        credits SMALLINT NOT NULL DEFAULT 3 CHECK (credits BETWEEN 1 AND 6),
        description TEXT,
        is_active BOOLEAN NOT NULL DEFAULT TRUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS students (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        roll_no TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        department TEXT NOT NULL,
        year SMALLINT NOT NULL CHECK (year BETWEEN 1 AND 4),
        section TEXT NOT NULL,
        subjects UUID[] NOT NULL DEFAULT '{}',
        marks JSONB NOT NULL DEFAULT '[]',
        attendance JSONB NOT NULL DEFAULT '[]',
        cgpa DOUBLE PRECISION NOT NULL DEFAULT 0,
        overall_attendance DOUBLE PRECISION NOT NULL DEFAULT 0,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        version BIGINT NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS marks (
        id UUID PRIMARY KEY,
        student_id UUID NOT NULL REFERENCES students(id),
        subject_id UUID NOT NULL REFERENCES subjects(id),
        internal_marks DOUBLE PRECISION NOT NULL CHECK (internal_marks BETWEEN 0 AND 50),
        external_marks DOUBLE PRECISION NOT NULL CHECK (external_marks BETWEEN 0 AND 50),
        total DOUBLE PRECISION NOT NULL,
        grade TEXT NOT NULL,
        semester SMALLINT NOT NULL CHECK (semester BETWEEN 1 AND 8),
        academic_year TEXT NOT NULL,
        exam_type TEXT NOT NULL DEFAULT 'Final',
        remarks TEXT,
        updated_by UUID,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        UNIQUE (student_id, subject_id, semester, academic_year, exam_type)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attendance (
        id UUID PRIMARY KEY,
        student_id UUID NOT NULL REFERENCES students(id),
        subject_id UUID NOT NULL REFERENCES subjects(id),
        total_classes INTEGER NOT NULL CHECK (total_classes >= 0),
        attended_classes INTEGER NOT NULL CHECK (attended_classes >= 0),
        percentage DOUBLE PRECISION NOT NULL,
        semester SMALLINT NOT NULL CHECK (semester BETWEEN 1 AND 8),
        academic_year TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'Present',
        remarks TEXT,
        updated_by UUID,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        UNIQUE (student_id, subject_id, semester, academic_year)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS marks_student_idx ON marks (student_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS attendance_student_idx ON attendance (student_id, created_at DESC)",
];

/// Postgres-backed store. Student aggregates live in JSONB columns next to
/// a `version` column used for compare-and-swap.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &crate::config::DatabaseConfig) -> StoreResult<Self> {
        let pool = DatabaseManager::connect(config).await?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist
    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Applied {} schema statements", SCHEMA.len());
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

fn map_write_error(err: sqlx::Error, what: &str) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::DuplicateKey(what.to_string())
    } else {
        StoreError::Sqlx(err)
    }
}

fn wide(value: u32, column: &str) -> StoreResult<i32> {
    i32::try_from(value).map_err(|_| StoreError::InvalidData(format!("{} out of range: {}", column, value)))
}

async fn insert_mark(conn: &mut PgConnection, mark: &Mark) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO marks (
            id, student_id, subject_id, internal_marks, external_marks, total, grade,
            semester, academic_year, exam_type, remarks, updated_by, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(mark.id)
    .bind(mark.student_id)
    .bind(mark.subject_id)
    .bind(mark.internal_marks)
    .bind(mark.external_marks)
    .bind(mark.total)
    .bind(mark.grade.as_str())
    .bind(i16::from(mark.semester))
    .bind(&mark.academic_year)
    .bind(mark.exam_type.as_str())
    .bind(&mark.remarks)
    .bind(mark.updated_by)
    .bind(mark.created_at)
    .bind(mark.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_write_error(e, "mark already exists for this student and subject"))?;
    Ok(())
}

async fn replace_mark(conn: &mut PgConnection, mark: &Mark) -> StoreResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE marks SET
            internal_marks = $2, external_marks = $3, total = $4, grade = $5,
            semester = $6, academic_year = $7, exam_type = $8, remarks = $9,
            updated_by = $10, updated_at = $11
        WHERE id = $1
        "#,
    )
    .bind(mark.id)
    .bind(mark.internal_marks)
    .bind(mark.external_marks)
    .bind(mark.total)
    .bind(mark.grade.as_str())
    .bind(i16::from(mark.semester))
    .bind(&mark.academic_year)
    .bind(mark.exam_type.as_str())
    .bind(&mark.remarks)
    .bind(mark.updated_by)
    .bind(mark.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_write_error(e, "another mark already uses that key"))?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("mark {}", mark.id)));
    }
    Ok(())
}

async fn insert_attendance(conn: &mut PgConnection, record: &Attendance) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO attendance (
            id, student_id, subject_id, total_classes, attended_classes, percentage,
            semester, academic_year, status, remarks, updated_by, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(record.id)
    .bind(record.student_id)
    .bind(record.subject_id)
    .bind(wide(record.total_classes, "total_classes")?)
    .bind(wide(record.attended_classes, "attended_classes")?)
    .bind(record.percentage)
    .bind(i16::from(record.semester))
    .bind(&record.academic_year)
    .bind(record.status.as_str())
    .bind(&record.remarks)
    .bind(record.updated_by)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_write_error(e, "attendance already exists for this student and subject"))?;
    Ok(())
}

async fn replace_attendance(conn: &mut PgConnection, record: &Attendance) -> StoreResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE attendance SET
            total_classes = $2, attended_classes = $3, percentage = $4,
            semester = $5, academic_year = $6, status = $7, remarks = $8,
            updated_by = $9, updated_at = $10
        WHERE id = $1
        "#,
    )
    .bind(record.id)
    .bind(wide(record.total_classes, "total_classes")?)
    .bind(wide(record.attended_classes, "attended_classes")?)
    .bind(record.percentage)
    .bind(i16::from(record.semester))
    .bind(&record.academic_year)
    .bind(record.status.as_str())
    .bind(&record.remarks)
    .bind(record.updated_by)
    .bind(record.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_write_error(e, "another attendance record already uses that key"))?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("attendance {}", record.id)));
    }
    Ok(())
}

#[async_trait]
impl GradebookStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> StoreResult<()> {
        DatabaseManager::health_check(&self.pool).await?;
        Ok(())
    }

    async fn subject(&self, id: Uuid) -> StoreResult<Option<Subject>> {
        sqlx::query_as::<_, Subject>("SELECT * FROM subjects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)
    }

    async fn subjects(&self, ids: &[Uuid]) -> StoreResult<Vec<Subject>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let rows = sqlx::query_as::<_, Subject>("SELECT * FROM subjects WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn insert_subject(&self, subject: Subject) -> StoreResult<()> {
        subject.validate().map_err(StoreError::InvalidData)?;
        sqlx::query(
            r#"
            INSERT INTO subjects (id, name, code, department, semester, year, credits, description, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(subject.id)
        .bind(&subject.name)
        .bind(&subject.code)
        .bind(subject.department.as_str())
        .bind(i16::from(subject.semester))
        .bind(i16::from(subject.year))
        .bind(i16::from(subject.credits))
        .bind(&subject.description)
        .bind(subject.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &format!("subject {}", subject.code)))?;
        Ok(())
    }

    async fn student(&self, id: Uuid) -> StoreResult<Option<Student>> {
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)
    }

    async fn student_ids(&self) -> StoreResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM students ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn insert_student(&self, student: Student) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO students (
                id, name, roll_no, email, department, year, section, subjects,
                marks, attendance, cgpa, overall_attendance, is_active, version,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(student.id)
        .bind(&student.name)
        .bind(&student.roll_no)
        .bind(&student.email)
        .bind(student.department.as_str())
        .bind(i16::from(student.year))
        .bind(&student.section)
        .bind(&student.subjects)
        .bind(Json(student.marks.clone()))
        .bind(Json(student.attendance.clone()))
        .bind(student.cgpa)
        .bind(student.overall_attendance)
        .bind(student.is_active)
        .bind(student.version)
        .bind(student.created_at)
        .bind(student.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &format!("student {}", student.roll_no)))?;
        Ok(())
    }

    async fn top_students(&self, limit: usize) -> StoreResult<Vec<Student>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, Student>(
            "SELECT * FROM students WHERE is_active ORDER BY cgpa DESC, roll_no LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn mark(&self, id: Uuid) -> StoreResult<Option<Mark>> {
        sqlx::query_as::<_, Mark>("SELECT * FROM marks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)
    }

    async fn mark_by_key(&self, key: &MarkKey) -> StoreResult<Option<Mark>> {
        sqlx::query_as::<_, Mark>(
            r#"
            SELECT * FROM marks
            WHERE student_id = $1 AND subject_id = $2 AND semester = $3
              AND academic_year = $4 AND exam_type = $5
            "#,
        )
        .bind(key.student_id)
        .bind(key.subject_id)
        .bind(i16::from(key.semester))
        .bind(&key.academic_year)
        .bind(key.exam_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)
    }

    async fn marks(&self, filter: &RecordFilter) -> StoreResult<Vec<Mark>> {
        let rows = sqlx::query_as::<_, Mark>(
            r#"
            SELECT * FROM marks
            WHERE ($1::uuid IS NULL OR student_id = $1)
              AND ($2::uuid IS NULL OR subject_id = $2)
              AND ($3::smallint IS NULL OR semester = $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.student_id)
        .bind(filter.subject_id)
        .bind(filter.semester.map(i16::from))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn attendance(&self, id: Uuid) -> StoreResult<Option<Attendance>> {
        sqlx::query_as::<_, Attendance>("SELECT * FROM attendance WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)
    }

    async fn attendance_by_key(&self, key: &AttendanceKey) -> StoreResult<Option<Attendance>> {
        sqlx::query_as::<_, Attendance>(
            r#"
            SELECT * FROM attendance
            WHERE student_id = $1 AND subject_id = $2 AND semester = $3 AND academic_year = $4
            "#,
        )
        .bind(key.student_id)
        .bind(key.subject_id)
        .bind(i16::from(key.semester))
        .bind(&key.academic_year)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)
    }

    async fn attendance_records(&self, filter: &RecordFilter) -> StoreResult<Vec<Attendance>> {
        let rows = sqlx::query_as::<_, Attendance>(
            r#"
            SELECT * FROM attendance
            WHERE ($1::uuid IS NULL OR student_id = $1)
              AND ($2::uuid IS NULL OR subject_id = $2)
              AND ($3::smallint IS NULL OR semester = $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.student_id)
        .bind(filter.subject_id)
        .bind(filter.semester.map(i16::from))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn commit(&self, commit: Commit) -> StoreResult<()> {
        let student = &commit.student;
        let mut tx = self.pool.begin().await?;

        // Updating the student first takes its row lock, so concurrent commits
        // for the same student queue here and the loser sees a moved version.
        let updated = sqlx::query(
            r#"
            UPDATE students SET
                marks = $3, attendance = $4, cgpa = $5, overall_attendance = $6,
                version = $7, updated_at = $8
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(student.id)
        .bind(commit.expected_version)
        .bind(Json(student.marks.clone()))
        .bind(Json(student.attendance.clone()))
        .bind(student.cgpa)
        .bind(student.overall_attendance)
        .bind(student.version)
        .bind(student.updated_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let found: Option<(i64,)> = sqlx::query_as("SELECT version FROM students WHERE id = $1")
                .bind(student.id)
                .fetch_optional(&mut *tx)
                .await?;
            return Err(match found {
                None => StoreError::NotFound(format!("student {}", student.id)),
                Some((found,)) => StoreError::VersionConflict {
                    student_id: student.id,
                    expected: commit.expected_version,
                    found,
                },
            });
        }

        if let Some(write) = &commit.record {
            match write {
                RecordWrite::InsertMark(mark) => insert_mark(&mut *tx, mark).await?,
                RecordWrite::ReplaceMark(mark) => replace_mark(&mut *tx, mark).await?,
                RecordWrite::InsertAttendance(record) => insert_attendance(&mut *tx, record).await?,
                RecordWrite::ReplaceAttendance(record) => replace_attendance(&mut *tx, record).await?,
            }
        }

        tx.commit().await?;

        debug!(
            "postgres commit: {} student {} -> version {}",
            commit
                .record
                .as_ref()
                .map(RecordWrite::describe)
                .unwrap_or_else(|| "aggregate only".to_string()),
            student.id,
            student.version
        );
        Ok(())
    }
}
