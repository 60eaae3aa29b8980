use std::collections::HashMap;

use ndarray::Array1;
use tracing::{debug, warn};

use crate::models::{GuardianOccupation, ScholarshipStatus, StudentRecord};

pub const AVERAGE_GRADE: &str = "average_grade";
pub const ABSENCE_COUNT: &str = "absence_count";
pub const SCHOLARSHIP_STATUS: &str = "scholarship_status";
pub const VIOLATION_POINTS: &str = "violation_points";
pub const SCHOLARSHIP_UNKNOWN: &str = "scholarship_status_unknown";
pub const OCCUPATION_UNKNOWN: &str = "guardian_occupation_unknown";

pub fn occupation_column(category: &str) -> String {
    format!("guardian_occupation_{category}")
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Array1<f64>,
}

impl FeatureVector {
    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

fn produce_columns(record: &StudentRecord) -> HashMap<String, f64> {
    let mut columns = HashMap::new();
    columns.insert(AVERAGE_GRADE.to_string(), record.average_grade);
    columns.insert(ABSENCE_COUNT.to_string(), f64::from(record.absence_count));
    columns.insert(VIOLATION_POINTS.to_string(), f64::from(record.violation_points));

    let scholarship = match &record.scholarship_status {
        ScholarshipStatus::Yes => 1.0,
        ScholarshipStatus::No => 0.0,
        ScholarshipStatus::Unrecognized(value) => {
            warn!(
                student_id = %record.student_id,
                value = %value,
                "unrecognized scholarship status, scoring as No"
            );
            columns.insert(SCHOLARSHIP_UNKNOWN.to_string(), 1.0);
            0.0
        }
    };
    columns.insert(SCHOLARSHIP_STATUS.to_string(), scholarship);

    for category in GuardianOccupation::KNOWN {
        let hit = record.guardian_occupation.as_str() == category;
        columns.insert(occupation_column(category), if hit { 1.0 } else { 0.0 });
    }
    if let GuardianOccupation::Unrecognized(value) = &record.guardian_occupation {
        warn!(
            student_id = %record.student_id,
            value = %value,
            "unrecognized guardian occupation, all occupation indicators are zero"
        );
        columns.insert(OCCUPATION_UNKNOWN.to_string(), 1.0);
    }

    columns
}

pub fn reconcile(record: &StudentRecord, expected_columns: &[String]) -> FeatureVector {
    let produced = produce_columns(record);

    let dropped = produced
        .keys()
        .filter(|name| !expected_columns.contains(name))
        .count();
    if dropped > 0 {
        debug!(
            student_id = %record.student_id,
            dropped,
            "dropped columns the model does not expect"
        );
    }

    let values: Array1<f64> = expected_columns
        .iter()
        .map(|name| produced.get(name).copied().unwrap_or(0.0))
        .collect();

    FeatureVector { values }
}
