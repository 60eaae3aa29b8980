use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::info;

use crate::error::{EarlyWarningError, Result};
use crate::models::{InterventionLogEntry, NewInterventionEntry};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

fn validate(entry: &NewInterventionEntry) -> Result<()> {
    if entry.student_id.trim().is_empty() {
        return Err(EarlyWarningError::InvalidEntry(
            "student_id must not be empty".to_string(),
        ));
    }
    if entry.notes.trim().is_empty() || entry.recorded_by.trim().is_empty() {
        return Err(EarlyWarningError::InvalidEntry(
            "notes and recorded_by are required".to_string(),
        ));
    }
    Ok(())
}

fn entry_from_row(row: &SqliteRow) -> Result<InterventionLogEntry> {
    let action: String = row.try_get("action_type")?;
    Ok(InterventionLogEntry {
        id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        timestamp: row.try_get("timestamp")?,
        action_type: action.parse().map_err(EarlyWarningError::InvalidEntry)?,
        notes: row.try_get("notes")?,
        recorded_by: row.try_get("recorded_by")?,
    })
}

/// Ids come from AUTOINCREMENT and are never handed out twice.
pub async fn append(pool: &SqlitePool, entry: &NewInterventionEntry) -> Result<i64> {
    validate(entry)?;
    let id: i64 = sqlx::query(
        r#"
        INSERT INTO intervention_log (student_id, timestamp, action_type, notes, recorded_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(&entry.student_id)
    .bind(&entry.timestamp)
    .bind(entry.action_type.as_str())
    .bind(&entry.notes)
    .bind(&entry.recorded_by)
    .fetch_one(pool)
    .await?
    .try_get("id")?;

    info!(
        id,
        student_id = %entry.student_id,
        action = entry.action_type.as_str(),
        "intervention logged"
    );
    Ok(id)
}

pub async fn list_for(pool: &SqlitePool, student_id: &str) -> Result<Vec<InterventionLogEntry>> {
    let rows = sqlx::query(
        "SELECT id, student_id, timestamp, action_type, notes, recorded_by \
         FROM intervention_log WHERE student_id = $1 \
         ORDER BY timestamp DESC, id DESC",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(entry_from_row).collect()
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let removed = sqlx::query("DELETE FROM intervention_log WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();

    info!(id, removed, "intervention log entry deleted");
    Ok(removed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::models::{ActionType, GuardianOccupation, ScholarshipStatus, StudentRecord};
    use crate::students;

    fn entry(student_id: &str, timestamp: &str, notes: &str) -> NewInterventionEntry {
        NewInterventionEntry {
            student_id: student_id.to_string(),
            timestamp: timestamp.to_string(),
            action_type: ActionType::IndividualCounseling,
            notes: notes.to_string(),
            recorded_by: "Ibu Nur".to_string(),
        }
    }

    fn timestamps(entries: &[InterventionLogEntry]) -> Vec<&str> {
        entries.iter().map(|entry| entry.timestamp.as_str()).collect()
    }

    #[tokio::test]
    async fn lists_newest_first_and_deletes_by_id() {
        let pool = memory_pool().await;
        append(&pool, &entry("100", "2026-01-05 09:00", "first")).await.unwrap();
        let middle = append(&pool, &entry("100", "2026-02-10 10:30", "second")).await.unwrap();
        append(&pool, &entry("100", "2026-03-01 08:15", "third")).await.unwrap();

        let listed = list_for(&pool, "100").await.unwrap();
        assert_eq!(
            timestamps(&listed),
            vec!["2026-03-01 08:15", "2026-02-10 10:30", "2026-01-05 09:00"]
        );

        assert!(delete(&pool, middle).await.unwrap());
        let listed = list_for(&pool, "100").await.unwrap();
        assert_eq!(timestamps(&listed), vec!["2026-03-01 08:15", "2026-01-05 09:00"]);
    }

    #[tokio::test]
    async fn equal_timestamps_list_latest_insert_first() {
        let pool = memory_pool().await;
        let first = append(&pool, &entry("100", "2026-01-05 09:00", "a")).await.unwrap();
        let second = append(&pool, &entry("100", "2026-01-05 09:00", "b")).await.unwrap();

        let ids: Vec<i64> = list_for(&pool, "100")
            .await
            .unwrap()
            .iter()
            .map(|entry| entry.id)
            .collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn ids_are_never_reused() {
        let pool = memory_pool().await;
        let first = append(&pool, &entry("100", "2026-01-05 09:00", "a")).await.unwrap();
        let second = append(&pool, &entry("100", "2026-01-06 09:00", "b")).await.unwrap();
        assert!(second > first);

        delete(&pool, second).await.unwrap();
        let third = append(&pool, &entry("100", "2026-01-07 09:00", "c")).await.unwrap();
        assert!(third > second);
    }

    #[tokio::test]
    async fn deleting_unknown_id_is_noop() {
        let pool = memory_pool().await;
        append(&pool, &entry("100", "2026-01-05 09:00", "a")).await.unwrap();
        assert!(!delete(&pool, 4242).await.unwrap());
        assert_eq!(list_for(&pool, "100").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn entries_are_scoped_to_student() {
        let pool = memory_pool().await;
        append(&pool, &entry("100", "2026-01-05 09:00", "a")).await.unwrap();
        append(&pool, &entry("200", "2026-01-06 09:00", "b")).await.unwrap();

        let listed = list_for(&pool, "200").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].notes, "b");
        assert_eq!(listed[0].action_type, ActionType::IndividualCounseling);
        assert!(list_for(&pool, "300").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_notes_or_author_are_rejected() {
        let pool = memory_pool().await;
        let mut missing_notes = entry("100", "2026-01-05 09:00", "  ");
        assert!(matches!(
            append(&pool, &missing_notes).await,
            Err(EarlyWarningError::InvalidEntry(_))
        ));

        missing_notes.notes = "called parents".to_string();
        missing_notes.recorded_by = String::new();
        assert!(matches!(
            append(&pool, &missing_notes).await,
            Err(EarlyWarningError::InvalidEntry(_))
        ));
        assert!(list_for(&pool, "100").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_student_keeps_orphaned_entries() {
        let pool = memory_pool().await;
        students::insert(
            &pool,
            &StudentRecord {
                name: "Andi".to_string(),
                student_id: "100".to_string(),
                class_label: "X IPA 1".to_string(),
                average_grade: 80.0,
                absence_count: 1,
                scholarship_status: ScholarshipStatus::Yes,
                guardian_occupation: GuardianOccupation::CivilServant,
                violation_points: 0,
            },
        )
        .await
        .unwrap();
        append(&pool, &entry("100", "2026-01-05 09:00", "a")).await.unwrap();

        students::delete(&pool, &["100".to_string()]).await.unwrap();
        assert_eq!(list_for(&pool, "100").await.unwrap().len(), 1);
    }
}
