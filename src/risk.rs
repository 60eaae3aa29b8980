use tracing::debug;

use crate::artifact::ModelArtifact;
use crate::error::Result;
use crate::features;
use crate::models::{KeyFactor, RiskAssessment, RiskTier, StudentRecord};
use crate::students;

pub const ABSENCE_FACTOR_THRESHOLD: u32 = 12;
pub const ACADEMIC_FACTOR_THRESHOLD: f64 = 70.0;
pub const DISCIPLINE_FACTOR_THRESHOLD: u32 = 30;

impl RiskTier {
    /// Lower bounds are inclusive: exactly 75.0 is High, 74.99 is Elevated.
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 75.0 {
            RiskTier::High
        } else if percentage >= 50.0 {
            RiskTier::Elevated
        } else if percentage >= 25.0 {
            RiskTier::Watch
        } else {
            RiskTier::Safe
        }
    }

    pub fn from_probability(probability: f64) -> Self {
        Self::from_percentage(probability * 100.0)
    }
}

pub fn identify_key_factors(record: &StudentRecord) -> Vec<KeyFactor> {
    let mut factors = Vec::new();
    if record.absence_count > ABSENCE_FACTOR_THRESHOLD {
        factors.push(KeyFactor::AbsenceHigh);
    }
    if record.average_grade < ACADEMIC_FACTOR_THRESHOLD {
        factors.push(KeyFactor::AcademicLow);
    }
    if record.violation_points > DISCIPLINE_FACTOR_THRESHOLD {
        factors.push(KeyFactor::DisciplineIssue);
    }
    if factors.is_empty() {
        factors.push(KeyFactor::NoSalientFactor);
    }
    factors
}

pub fn assess(artifact: &ModelArtifact, record: &StudentRecord) -> Result<RiskAssessment> {
    let vector = features::reconcile(record, artifact.expected_columns());
    let probability = artifact.score(&vector)?;
    debug!(student_id = %record.student_id, probability, "scored student");

    Ok(RiskAssessment {
        student_id: record.student_id.clone(),
        student_name: record.name.clone(),
        class_label: record.class_label.clone(),
        probability,
        tier: RiskTier::from_probability(probability),
    })
}

pub fn simulate(artifact: &ModelArtifact, record: &StudentRecord) -> Result<RiskAssessment> {
    students::validate(record)?;
    assess(artifact, record)
}

pub fn assess_all(
    artifact: &ModelArtifact,
    records: &[StudentRecord],
) -> Result<Vec<RiskAssessment>> {
    let vectors: Vec<_> = records
        .iter()
        .map(|record| features::reconcile(record, artifact.expected_columns()))
        .collect();
    let probabilities = artifact.score_batch(&vectors)?;

    let mut assessments: Vec<RiskAssessment> = records
        .iter()
        .zip(probabilities)
        .map(|(record, probability)| RiskAssessment {
            student_id: record.student_id.clone(),
            student_name: record.name.clone(),
            class_label: record.class_label.clone(),
            probability,
            tier: RiskTier::from_probability(probability),
        })
        .collect();

    assessments.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(assessments)
}
