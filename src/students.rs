use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::{info, warn};

use crate::error::{EarlyWarningError, Result};
use crate::models::{GuardianOccupation, ScholarshipStatus, StudentRecord};

pub fn validate(record: &StudentRecord) -> Result<()> {
    if record.student_id.trim().is_empty() {
        return Err(EarlyWarningError::InvalidRecord(
            "student_id must not be empty".to_string(),
        ));
    }
    if !(0.0..=100.0).contains(&record.average_grade) {
        return Err(EarlyWarningError::InvalidRecord(format!(
            "average_grade {} for {} is outside 0-100",
            record.average_grade, record.student_id
        )));
    }
    Ok(())
}

fn record_from_row(row: &SqliteRow) -> Result<StudentRecord> {
    Ok(StudentRecord {
        name: row.try_get("name")?,
        student_id: row.try_get("student_id")?,
        class_label: row.try_get("class_label")?,
        average_grade: row.try_get("average_grade")?,
        absence_count: row.try_get("absence_count")?,
        scholarship_status: ScholarshipStatus::from(
            row.try_get::<String, _>("scholarship_status")?,
        ),
        guardian_occupation: GuardianOccupation::from(
            row.try_get::<String, _>("guardian_occupation")?,
        ),
        violation_points: row.try_get("violation_points")?,
    })
}

async fn insert_row<'e, E>(
    executor: E,
    record: &StudentRecord,
) -> std::result::Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO students
        (student_id, name, class_label, average_grade, absence_count,
         scholarship_status, guardian_occupation, violation_points)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(&record.student_id)
    .bind(&record.name)
    .bind(&record.class_label)
    .bind(record.average_grade)
    .bind(record.absence_count)
    .bind(record.scholarship_status.as_str())
    .bind(record.guardian_occupation.as_str())
    .bind(record.violation_points)
    .execute(executor)
    .await?;
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<StudentRecord>> {
    let rows = sqlx::query(
        "SELECT student_id, name, class_label, average_grade, absence_count, \
         scholarship_status, guardian_occupation, violation_points \
         FROM students ORDER BY rowid",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(record_from_row).collect()
}

pub async fn find(pool: &SqlitePool, student_id: &str) -> Result<Option<StudentRecord>> {
    let row = sqlx::query(
        "SELECT student_id, name, class_label, average_grade, absence_count, \
         scholarship_status, guardian_occupation, violation_points \
         FROM students WHERE student_id = $1",
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(record_from_row).transpose()
}

pub async fn insert(pool: &SqlitePool, record: &StudentRecord) -> Result<()> {
    validate(record)?;
    match insert_row(pool, record).await {
        Ok(()) => {
            info!(student_id = %record.student_id, "student inserted");
            Ok(())
        }
        Err(err) if is_unique_violation(&err) => {
            Err(EarlyWarningError::DuplicateKey(record.student_id.clone()))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn insert_new(pool: &SqlitePool, records: &[StudentRecord]) -> Result<usize> {
    for record in records {
        validate(record)?;
    }

    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;
    for record in records {
        match insert_row(&mut *tx, record).await {
            Ok(()) => inserted += 1,
            Err(err) if is_unique_violation(&err) => {
                warn!(student_id = %record.student_id, "student already exists, skipping row");
            }
            Err(err) => return Err(err.into()),
        }
    }
    tx.commit().await?;

    info!(inserted, skipped = records.len() - inserted, "students imported");
    Ok(inserted)
}

/// Makes `records` the entire contents of the table in one transaction.
///
/// There is no check against what the caller read earlier: replacing a stale
/// snapshot silently discards writes made in between. Callers that edit a
/// listing and write it back must serialise those edits themselves.
pub async fn bulk_replace(pool: &SqlitePool, records: &[StudentRecord]) -> Result<()> {
    for record in records {
        validate(record)?;
    }

    let mut tx = pool.begin().await?;
    let discarded = sqlx::query("DELETE FROM students")
        .execute(&mut *tx)
        .await?
        .rows_affected();

    for record in records {
        if let Err(err) = insert_row(&mut *tx, record).await {
            // Dropping the transaction rolls back the delete as well.
            if is_unique_violation(&err) {
                return Err(EarlyWarningError::DuplicateKey(record.student_id.clone()));
            }
            return Err(err.into());
        }
    }
    tx.commit().await?;

    info!(discarded, stored = records.len(), "student table replaced");
    Ok(())
}

pub async fn delete(pool: &SqlitePool, student_ids: &[String]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut removed = 0u64;
    for student_id in student_ids {
        removed += sqlx::query("DELETE FROM students WHERE student_id = $1")
            .bind(student_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }
    tx.commit().await?;

    info!(requested = student_ids.len(), removed, "students deleted");
    Ok(removed)
}
