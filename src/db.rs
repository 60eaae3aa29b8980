use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::{EarlyWarningError, Result};
use crate::models::{GuardianOccupation, ScholarshipStatus, StudentRecord};
use crate::students;

pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    info!(database_url, "connected to student database");
    Ok(pool)
}

pub async fn init_db(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn close(pool: SqlitePool) {
    pool.close().await;
    info!("student database closed");
}

pub async fn seed(pool: &SqlitePool) -> Result<usize> {
    let students = vec![
        ("Rina Sari", "0061234501", "X IPA 1", 88.5, 2, "Yes", "CivilServant", 0),
        ("Budi Santoso", "0061234502", "X IPA 1", 64.0, 16, "No", "Farmer", 40),
        ("Dewi Lestari", "0061234503", "XI IPS 2", 71.0, 9, "No", "Laborer", 15),
        ("Ahmad Fauzi", "0061234504", "XI IPS 2", 58.5, 22, "No", "Laborer", 55),
        ("Siti Rahma", "0061234505", "XII IPA 3", 79.0, 5, "Yes", "Entrepreneur", 5),
        ("Joko Prasetyo", "0061234506", "XII IPA 3", 68.0, 13, "No", "Other", 20),
    ];

    let mut inserted = 0usize;
    for student in students {
        let (name, student_id, class_label, grade, absences, scholarship, occupation, violations) =
            student;
        let record = StudentRecord {
            name: name.to_string(),
            student_id: student_id.to_string(),
            class_label: class_label.to_string(),
            average_grade: grade,
            absence_count: absences,
            scholarship_status: ScholarshipStatus::from(scholarship.to_string()),
            guardian_occupation: GuardianOccupation::from(occupation.to_string()),
            violation_points: violations,
        };
        match students::insert(pool, &record).await {
            Ok(()) => inserted += 1,
            Err(EarlyWarningError::DuplicateKey(_)) => {}
            Err(err) => return Err(err),
        }
    }

    Ok(inserted)
}

fn read_csv(csv_path: &Path) -> Result<Vec<StudentRecord>> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut records = Vec::new();
    for result in reader.deserialize::<StudentRecord>() {
        records.push(result?);
    }
    Ok(records)
}

pub async fn import_csv(pool: &SqlitePool, csv_path: &Path) -> Result<usize> {
    let records = read_csv(csv_path)?;
    students::insert_new(pool, &records).await
}

pub async fn replace_from_csv(pool: &SqlitePool, csv_path: &Path) -> Result<usize> {
    let records = read_csv(csv_path)?;
    students::bulk_replace(pool, &records).await?;
    Ok(records.len())
}

pub async fn export_csv(pool: &SqlitePool, csv_path: &Path) -> Result<usize> {
    let records = students::list_all(pool).await?;
    let mut writer = csv::Writer::from_path(csv_path)?;
    for record in &records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(records.len())
}

#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    // A single connection keeps the in-memory database alive for the test.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    init_db(&pool).await.expect("migrations");
    pool
}
